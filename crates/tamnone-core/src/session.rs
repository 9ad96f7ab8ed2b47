//! Dialogue session: the shared transcript behind one async mutex, mirrored to the
//! history store on every commit.
//!
//! Appends are two-phase so the remote prediction never runs under the lock:
//! [`DialogueSession::stage_append`] snapshots the transcript plus the new utterance,
//! and [`DialogueSession::commit_append`] publishes it only once the prediction succeeded.
//! Dropping a staged append is the rollback.

use tokio::sync::Mutex;

use crate::dialogue::{DialogueError, Transcript, Utterance};
use crate::history::{HistoryError, HistoryStore};

struct SessionState {
    transcript: Transcript,
    revision: u64,
}

/// Transcript with the new utterance appended, not yet visible to other requests.
#[derive(Debug, Clone)]
pub struct StagedAppend {
    transcript: Transcript,
    base_revision: u64,
}

impl StagedAppend {
    /// Model input: the whole staged transcript.
    pub fn text(&self) -> String {
        self.transcript.render()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    fn utterance(&self) -> Option<&Utterance> {
        self.transcript.last()
    }
}

/// How a staged append landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendCommit {
    /// Nothing changed in between; the staged transcript became current.
    Committed,
    /// Another request committed first; the utterance was appended to the newer transcript.
    Rebased,
}

pub struct DialogueSession {
    state: Mutex<SessionState>,
    store: HistoryStore,
}

impl DialogueSession {
    /// Open a session seeded from whatever the store holds.
    pub fn open(store: HistoryStore) -> Result<Self, HistoryError> {
        let transcript = store.load()?;
        if !transcript.is_empty() {
            tracing::info!(utterances = transcript.len(), "Restored dialogue history");
        }
        Ok(Self {
            state: Mutex::new(SessionState {
                transcript,
                revision: 0,
            }),
            store,
        })
    }

    pub fn ephemeral() -> Self {
        Self {
            state: Mutex::new(SessionState {
                transcript: Transcript::new(),
                revision: 0,
            }),
            store: HistoryStore::ephemeral(),
        }
    }

    pub async fn stage_append(&self, speaker: &str, text: &str) -> Result<StagedAppend, DialogueError> {
        let state = self.state.lock().await;
        let transcript = state.transcript.append(speaker, text)?;
        Ok(StagedAppend {
            transcript,
            base_revision: state.revision,
        })
    }

    pub async fn commit_append(&self, staged: StagedAppend) -> AppendCommit {
        let mut state = self.state.lock().await;
        let outcome = if state.revision == staged.base_revision {
            state.transcript = staged.transcript;
            AppendCommit::Committed
        } else {
            tracing::warn!(
                base = staged.base_revision,
                current = state.revision,
                "Transcript changed during analysis; appending onto the newer transcript"
            );
            let rebased = staged
                .utterance()
                .and_then(|u| state.transcript.append(u.speaker(), u.text()).ok());
            if let Some(next) = rebased {
                state.transcript = next;
            }
            AppendCommit::Rebased
        };
        state.revision += 1;
        self.persist(&state.transcript);
        outcome
    }

    /// Replace the whole transcript (last write wins).
    pub async fn replace(&self, transcript: Transcript) {
        let mut state = self.state.lock().await;
        state.transcript = transcript;
        state.revision += 1;
        self.persist(&state.transcript);
    }

    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.transcript.clear();
        state.revision += 1;
        self.persist(&state.transcript);
    }

    /// Current transcript, rendered line by line.
    pub async fn lines(&self) -> Vec<String> {
        self.state.lock().await.transcript.lines()
    }

    pub async fn transcript(&self) -> Transcript {
        self.state.lock().await.transcript.clone()
    }

    /// Push pending history writes to disk (no-op for ephemeral history).
    pub fn flush(&self) -> Result<(), HistoryError> {
        self.store.flush()
    }

    // In-memory state stays authoritative when the mirror write fails.
    fn persist(&self, transcript: &Transcript) {
        if let Err(e) = self.store.save(transcript) {
            tracing::error!("Failed to persist dialogue history: {}", e);
        }
    }
}
