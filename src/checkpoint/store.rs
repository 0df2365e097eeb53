//! Durable checkpoint persistence

use super::Checkpoint;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("checkpoint io failure at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("checkpoint serialization failure: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reads and writes the checkpoint file.
///
/// Writes go through a sibling temp file followed by a rename so a crash
/// mid-write never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted checkpoint, or a fresh one if none exists yet.
    pub fn load(&self) -> Result<Checkpoint, StoreError> {
        if !self.path.exists() {
            return Ok(Checkpoint::default());
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persist the checkpoint atomically.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let raw = serde_json::to_string_pretty(checkpoint)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, raw).map_err(|source| StoreError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
