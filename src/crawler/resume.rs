//! Progress/resume controller
//!
//! Reconciles the checkpoint with whatever output already exists and decides
//! where the next run starts and how the sink is opened. The checkpoint is
//! authoritative: output rows beyond it belong to a unit that never finished
//! and are removed before the run continues.

use crate::output::{OutputSink, SinkMode, SinkStatus, TabularRow};
use crate::state::{WorkSequence, WorkUnit};
use crate::storage::CheckpointStore;
use crate::{Result, SweepError};
use tracing::{info, warn};

/// Operator overrides for one invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResumeOptions {
    /// Start at this ordinal instead of the checkpoint
    pub start: Option<u64>,

    /// Stop after this ordinal instead of the sequence end
    pub end: Option<u64>,

    /// Discard checkpoint and output before starting
    pub reset: bool,
}

/// Where a run starts and ends, and how its output is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePlan {
    pub first: WorkUnit,
    pub last: Option<WorkUnit>,
    pub mode: SinkMode,
    /// Rows of unfinished or overridden units removed from the output
    pub discarded_rows: u64,
}

impl ResumePlan {
    /// True when there is no unit left to process
    pub fn is_empty(&self) -> bool {
        self.last.map_or(true, |last| self.first > last)
    }

    /// Number of units the plan covers
    pub fn len(&self) -> u64 {
        match self.last {
            Some(last) if last >= self.first => last.index() - self.first.index() + 1,
            _ => 0,
        }
    }
}

/// Computes the resume plan, repairing output and checkpoint as needed
///
/// # Arguments
///
/// * `sequence` - The job's unit sequence
/// * `sink` - The job's output sink (not yet opened)
/// * `checkpoint` - The job's checkpoint store
/// * `options` - Operator overrides
///
/// # Returns
///
/// * `Ok(ResumePlan)` - The run can start
/// * `Err(SweepError::OutputConflict)` - Rows exist but no checkpoint does
/// * `Err(SweepError::OutputMissing)` - A checkpoint exists but the output is gone
pub fn prepare<T: TabularRow>(
    sequence: &dyn WorkSequence,
    sink: &mut dyn OutputSink<T>,
    checkpoint: &mut dyn CheckpointStore,
    options: &ResumeOptions,
) -> Result<ResumePlan> {
    if options.reset {
        checkpoint.clear()?;
        sink.remove()?;
        info!(
            "Reset: removed checkpoint {} and output {}",
            checkpoint.location(),
            sink.location()
        );
    }

    let sequence_first = sequence.first();
    let last = match (sequence.last(), options.end) {
        (Some(last), Some(end)) => Some(last.min(WorkUnit(end))),
        (last, _) => last,
    };

    let saved = checkpoint.load()?;
    let status = sink.inspect()?;

    let (first, mode, discarded_rows) = match options.start {
        Some(start) => {
            let start = WorkUnit(start).max(sequence_first);
            let kept = start.prev().filter(|unit| *unit >= sequence_first);

            let discarded = if status.exists() {
                sink.truncate_after(kept)?
            } else {
                0
            };

            if saved.map_or(false, |unit| unit >= start) {
                match kept {
                    Some(unit) => checkpoint.save(unit)?,
                    None => checkpoint.clear()?,
                }
                warn!("Checkpoint rewound to start at unit {}", start);
            }

            let mode = if status.exists() {
                SinkMode::Append
            } else {
                SinkMode::Fresh
            };
            (start, mode, discarded)
        }
        None => match (saved, status) {
            (Some(unit), SinkStatus::Missing) => {
                return Err(SweepError::OutputMissing {
                    path: sink.location(),
                    checkpoint: unit.index(),
                });
            }
            (Some(unit), SinkStatus::Present { .. }) => {
                let discarded = sink.truncate_after(Some(unit))?;
                info!("Resuming after checkpoint {} at unit {}", unit, unit.next());
                (unit.next(), SinkMode::Append, discarded)
            }
            (None, SinkStatus::Missing) => (sequence_first, SinkMode::Fresh, 0),
            (None, SinkStatus::Present { rows: 0, .. }) => (sequence_first, SinkMode::Append, 0),
            (None, SinkStatus::Present { rows, .. }) if checkpoint.exists() => {
                warn!(
                    "Checkpoint {} is unusable; restarting at unit {} and appending after the {} row(s) in {}",
                    checkpoint.location(),
                    sequence_first,
                    rows,
                    sink.location()
                );
                (sequence_first, SinkMode::Append, 0)
            }
            (None, SinkStatus::Present { rows, .. }) => {
                return Err(SweepError::OutputConflict {
                    path: sink.location(),
                    rows,
                });
            }
        },
    };

    if discarded_rows > 0 {
        warn!(
            "Discarded {} row(s) from {} beyond unit {}",
            discarded_rows,
            sink.location(),
            first
        );
    }

    Ok(ResumePlan {
        first,
        last,
        mode,
        discarded_rows,
    })
}
