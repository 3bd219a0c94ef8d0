//! Statistics generation from harvested output
//!
//! This module summarizes what a job has written so far and how far its
//! checkpoint has advanced.

use crate::output::traits::{OutputSink, TabularRow};
use crate::storage::CheckpointStore;
use crate::SweepError;
use std::collections::{BTreeMap, BTreeSet};

/// Harvest statistics for one job
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Job name ("listing" or "details")
    pub job: String,

    /// Where the rows live
    pub output: String,

    /// Where the checkpoint lives
    pub checkpoint_location: String,

    /// Last fully completed unit, if any
    pub checkpoint: Option<u64>,

    /// Total rows in the output
    pub total_rows: u64,

    /// Number of distinct units that produced at least one row
    pub units_with_rows: u64,

    /// Highest unit present in the output
    pub last_unit: Option<u64>,

    /// Row counts by status, for row types that carry one
    pub rows_by_status: BTreeMap<String, u64>,
}

/// Loads statistics for one job
///
/// # Arguments
///
/// * `job` - The job name
/// * `sink` - The job's output sink
/// * `checkpoint` - The job's checkpoint store
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(SweepError)` - Failed to read output or checkpoint
pub fn load_statistics<T: TabularRow>(
    job: &str,
    sink: &dyn OutputSink<T>,
    checkpoint: &dyn CheckpointStore,
) -> Result<HarvestStatistics, SweepError> {
    let records = sink.read_records()?;
    let last_completed = checkpoint.load()?;

    let units: BTreeSet<u64> = records.iter().map(|r| r.unit.index()).collect();

    let mut rows_by_status = BTreeMap::new();
    for record in &records {
        if let Some(status) = record.data.status() {
            *rows_by_status.entry(status.to_string()).or_insert(0) += 1;
        }
    }

    Ok(HarvestStatistics {
        job: job.to_string(),
        output: sink.location(),
        checkpoint_location: checkpoint.location(),
        checkpoint: last_completed.map(|u| u.index()),
        total_rows: records.len() as u64,
        units_with_rows: units.len() as u64,
        last_unit: units.iter().next_back().copied(),
        rows_by_status,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== {} ===\n", stats.job);

    println!("Overview:");
    println!("  Output: {}", stats.output);
    println!("  Checkpoint file: {}", stats.checkpoint_location);
    match stats.checkpoint {
        Some(unit) => println!("  Last completed unit: {}", unit),
        None => println!("  Last completed unit: none"),
    }
    println!("  Total rows: {}", stats.total_rows);
    println!("  Units with rows: {}", stats.units_with_rows);
    if let Some(last) = stats.last_unit {
        println!("  Highest unit in output: {}", last);
    }
    println!();

    if !stats.rows_by_status.is_empty() {
        println!("Rows by Status:");
        let mut status_counts: Vec<_> = stats.rows_by_status.iter().collect();
        status_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (status, count) in status_counts {
            let percentage = if stats.total_rows > 0 {
                (*count as f64 / stats.total_rows as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", status, count, percentage);
        }
        println!();
    }
}
