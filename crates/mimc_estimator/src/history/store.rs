//! Storage collaborators for the history.

use super::History;
use crate::error::HistoryError;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persists a history; invoked after every completed tolerance when
/// configured.
pub trait HistoryStore: Send + Sync {
    /// Writes the whole history, replacing any earlier copy.
    fn persist(&self, history: &History) -> Result<(), HistoryError>;
}

/// Writes the history as pretty-printed JSON to `<folder>/<name>.json`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store for the run `name` inside `folder`.
    pub fn new(folder: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: folder.as_ref().join(format!("{}.json", name)),
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for JsonFileStore {
    fn persist(&self, history: &History) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(history)?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), records = history.len(), "history saved");
        Ok(())
    }
}
