//! History store: optional sled-backed mirror of the committed transcript.
//! Without a path the store is ephemeral: loads are empty and saves are no-ops, so the
//! transcript lives only as long as the process.

use std::path::Path;

use thiserror::Error;

use crate::dialogue::Transcript;

const TRANSCRIPT_KEY: &[u8] = b"transcript";

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history db: {0}")]
    Sled(#[from] sled::Error),
    #[error("history record: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct HistoryStore {
    db: Option<sled::Db>,
}

impl HistoryStore {
    /// Process-local history; nothing survives a restart.
    pub fn ephemeral() -> Self {
        Self { db: None }
    }

    /// Durable history at `path` (direct host filesystem).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let db = sled::open(path.as_ref())?;
        Ok(Self { db: Some(db) })
    }

    pub fn is_durable(&self) -> bool {
        self.db.is_some()
    }

    /// Last committed transcript, or an empty one.
    pub fn load(&self) -> Result<Transcript, HistoryError> {
        let Some(db) = &self.db else {
            return Ok(Transcript::new());
        };
        match db.get(TRANSCRIPT_KEY)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Transcript::new()),
        }
    }

    /// Overwrite the stored transcript.
    pub fn save(&self, transcript: &Transcript) -> Result<(), HistoryError> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(transcript)?;
        db.insert(TRANSCRIPT_KEY, bytes)?;
        Ok(())
    }

    /// Block until pending writes reach disk.
    pub fn flush(&self) -> Result<(), HistoryError> {
        if let Some(db) = &self.db {
            db.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_store_is_a_no_op() {
        let store = HistoryStore::ephemeral();
        let t = Transcript::new().append("A", "hello").unwrap();
        store.save(&t).unwrap();
        assert!(store.load().unwrap().is_empty());
        assert!(!store.is_durable());
    }

    #[test]
    fn durable_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history");
        let t = Transcript::new()
            .append("Alice", "I am happy")
            .unwrap()
            .append("Bob", "why?")
            .unwrap();
        {
            let store = HistoryStore::open(&path).unwrap();
            assert!(store.load().unwrap().is_empty());
            store.save(&t).unwrap();
            store.flush().unwrap();
        }
        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), t);
        store.save(&Transcript::new()).unwrap();
        assert!(store.load().unwrap().is_empty());
    }
}
