//! Output module for harvested rows
//!
//! This module handles:
//! - The row types each job produces
//! - Append-only CSV and SQLite sinks
//! - Statistics over what has been harvested so far

mod csv_output;
mod records;
mod sqlite_output;
pub mod stats;
mod traits;

pub use csv_output::CsvSink;
pub use records::{OrganizationDetail, OrganizationSummary};
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, HarvestStatistics};
pub use traits::{
    header, OutputError, OutputResult, OutputSink, Record, SinkMode, SinkStatus, TabularRow,
};

use crate::config::OutputFormat;
use std::path::Path;

/// Builds the sink for one job in the configured format
///
/// # Arguments
///
/// * `format` - CSV or SQLite
/// * `path` - Output file (CSV file or SQLite database)
/// * `table` - Table name used when the format is SQLite
///
/// # Returns
///
/// A boxed sink; nothing is created on disk until it is opened
pub fn open_sink<T: TabularRow>(
    format: OutputFormat,
    path: &Path,
    table: &str,
) -> Box<dyn OutputSink<T>> {
    match format {
        OutputFormat::Csv => Box::new(CsvSink::<T>::new(path)),
        OutputFormat::Sqlite => Box::new(SqliteSink::<T>::new(path, table)),
    }
}
