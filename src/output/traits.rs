//! Output sink traits and types
//!
//! This module defines the trait interface for tabular output sinks and the
//! record types that flow into them.

use crate::state::WorkUnit;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Output schema mismatch: expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Output {0} is not open for writing")]
    NotOpen(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// A fixed-shape row type that can be stored in a tabular sink
///
/// Every field is explicitly nullable: `None` is written as an empty CSV cell
/// or SQL `NULL`, and read back as `None`.
pub trait TabularRow: Sized + Send + Sync + 'static {
    /// Name of the column holding the unit ordinal (always the first column)
    const UNIT_COLUMN: &'static str;

    /// Data columns, in storage order
    const COLUMNS: &'static [&'static str];

    /// Field values in `COLUMNS` order
    fn to_fields(&self) -> Vec<Option<String>>;

    /// Rebuilds a row from stored values in `COLUMNS` order
    fn from_fields(fields: &[Option<String>]) -> Option<Self>;

    /// Per-row status used for statistics, if the row type carries one
    fn status(&self) -> Option<&str> {
        None
    }
}

/// Full column list of a row type, unit column first
pub fn header<T: TabularRow>() -> Vec<&'static str> {
    std::iter::once(T::UNIT_COLUMN)
        .chain(T::COLUMNS.iter().copied())
        .collect()
}

/// One extracted item tagged with the unit it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<T> {
    pub unit: WorkUnit,
    pub data: T,
}

impl<T> Record<T> {
    pub fn new(unit: WorkUnit, data: T) -> Self {
        Self { unit, data }
    }
}

/// How a sink should be opened for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Create (or recreate) the output with a fresh header
    Fresh,

    /// Keep existing rows and add after them
    Append,
}

/// What a sink currently holds on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// No output exists yet
    Missing,

    /// Output exists with a valid header
    Present {
        rows: u64,
        last_unit: Option<WorkUnit>,
    },
}

impl SinkStatus {
    pub fn rows(&self) -> u64 {
        match self {
            Self::Missing => 0,
            Self::Present { rows, .. } => *rows,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// Append-only tabular writer for one crawl job
///
/// A sink is owned by exactly one crawl loop. `append` must leave every record
/// of the call durably written before it returns.
pub trait OutputSink<T: TabularRow>: Send {
    /// Human-readable location used in logs and errors
    fn location(&self) -> String;

    /// Reports whether output exists, how many rows it holds and the last unit
    fn inspect(&self) -> OutputResult<SinkStatus>;

    /// Opens the sink for writing
    fn open(&mut self, mode: SinkMode) -> OutputResult<()>;

    /// Appends all records of one unit and flushes them
    fn append(&mut self, records: &[Record<T>]) -> OutputResult<()>;

    /// Drops every row whose unit is after `last_kept` (all rows for `None`)
    ///
    /// Returns the number of rows removed.
    fn truncate_after(&mut self, last_kept: Option<WorkUnit>) -> OutputResult<u64>;

    /// Reads back every stored record in unit order
    fn read_records(&self) -> OutputResult<Vec<Record<T>>>;

    /// Deletes the output entirely
    fn remove(&mut self) -> OutputResult<()>;
}
