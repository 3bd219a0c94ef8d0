//! File-backed checkpoint store
//!
//! The checkpoint is a small JSON document replaced atomically through a
//! temporary file in the same directory. Older checkpoints that hold only a
//! bare integer are still accepted.

use crate::state::WorkUnit;
use crate::storage::traits::{CheckpointStore, StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// On-disk checkpoint document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job: String,
    pub last_completed: WorkUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCheckpoint {
    Full(Checkpoint),
    Bare(u64),
}

/// Checkpoint store backed by a single file
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    job: String,
    config_hash: Option<String>,
}

impl FileCheckpointStore {
    /// Creates a store for `job` at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Checkpoint file location
    /// * `job` - Job name recorded in, and required of, the checkpoint
    /// * `config_hash` - Hash of the configuration that produced the run
    pub fn new(path: impl Into<PathBuf>, job: impl Into<String>, config_hash: Option<String>) -> Self {
        Self {
            path: path.into(),
            job: job.into(),
            config_hash,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the full checkpoint document, if one for this job exists
    pub fn read(&self) -> StorageResult<Option<Checkpoint>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored = match serde_json::from_slice::<StoredCheckpoint>(&content) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                return Ok(None);
            }
        };

        let checkpoint = match stored {
            StoredCheckpoint::Full(checkpoint) => checkpoint,
            StoredCheckpoint::Bare(unit) => Checkpoint {
                job: self.job.clone(),
                last_completed: WorkUnit(unit),
                config_hash: None,
                updated_at: fs::metadata(&self.path)?
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now()),
            },
        };

        if checkpoint.job != self.job {
            warn!(
                "Ignoring checkpoint {} written by job '{}' (expected '{}')",
                self.path.display(),
                checkpoint.job,
                self.job
            );
            return Ok(None);
        }

        if let (Some(stored), Some(current)) = (&checkpoint.config_hash, &self.config_hash) {
            if stored != current {
                warn!(
                    "Configuration changed since checkpoint {} was written",
                    self.path.display()
                );
            }
        }

        Ok(Some(checkpoint))
    }

    fn write_atomic(&self, content: &str) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&self.path).map_err(|e| StorageError::Persist {
            path: self.path.display().to_string(),
            source: e.error,
        })?;

        // Make the rename itself durable.
        if let Ok(handle) = fs::File::open(&dir) {
            let _ = handle.sync_all();
        }

        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> StorageResult<Option<WorkUnit>> {
        Ok(self.read()?.map(|checkpoint| checkpoint.last_completed))
    }

    fn save(&mut self, unit: WorkUnit) -> StorageResult<()> {
        let checkpoint = Checkpoint {
            job: self.job.clone(),
            last_completed: unit,
            config_hash: self.config_hash.clone(),
            updated_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&checkpoint)?;
        self.write_atomic(&content)?;

        debug!("Checkpoint {} -> {}", self.path.display(), unit);
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
