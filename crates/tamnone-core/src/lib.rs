//! Tamnone core library.
//! Dialogue transcript, emotion Space client and response normalization for the relay gateway.

pub mod config;
pub mod dialogue;
pub mod history;
pub mod literal;
pub mod normalizer;
pub mod prediction;
pub mod session;
pub mod space_client;

pub use config::RelayConfig;
pub use dialogue::{DialogueError, SnapshotLine, Transcript, Utterance, DEFAULT_SNAPSHOT_SPEAKER};
pub use history::{HistoryError, HistoryStore};
pub use normalizer::parse_struct;
pub use prediction::{
    predict, PredictionBackend, PredictionOutcome, RemoteError, TuningError, TuningParameters,
};
pub use session::{AppendCommit, DialogueSession, StagedAppend};
pub use space_client::{space_url, SpaceClient};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
