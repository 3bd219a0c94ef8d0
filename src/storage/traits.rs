//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint stores and
//! associated error types.

use crate::state::WorkUnit;
use thiserror::Error;

/// Errors that can occur during checkpoint operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to replace checkpoint {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable record of the last fully completed unit of one job
///
/// A successful `save` must survive process termination immediately after it
/// returns. Readers never observe a partially written checkpoint.
pub trait CheckpointStore: Send {
    /// Loads the last completed unit
    ///
    /// # Returns
    ///
    /// * `Ok(Some(unit))` - A checkpoint for this job exists
    /// * `Ok(None)` - Nothing usable was found; start from the beginning
    /// * `Err(StorageError)` - The checkpoint could not be read at all
    fn load(&self) -> StorageResult<Option<WorkUnit>>;

    /// Durably records `unit` as the last completed unit
    fn save(&mut self, unit: WorkUnit) -> StorageResult<()>;

    /// Removes the checkpoint so the next load returns `None`
    fn clear(&mut self) -> StorageResult<()>;

    /// Whether anything is stored at all, usable or not
    fn exists(&self) -> bool;

    /// Human-readable location used in logs
    fn location(&self) -> String;
}
