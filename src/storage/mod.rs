//! Storage module for persisting crawl progress
//!
//! This module handles the durable checkpoint that lets an interrupted crawl
//! resume at the first unfinished unit.

mod checkpoint;
mod traits;

pub use checkpoint::{Checkpoint, FileCheckpointStore};
pub use traits::{CheckpointStore, StorageError, StorageResult};
