//! Crawler coordinator - the checkpointed crawl loop
//!
//! This module drives one job through its resume plan, strictly one unit at a
//! time:
//! - Processing each unit through the fetch step
//! - Appending the unit's rows and flushing them
//! - Advancing the checkpoint only after the rows are durable
//! - Pausing between units and honoring cancellation
//!
//! Everything the loop shares with the fetch step lives in a `CrawlContext`
//! created once per run and dropped when the run ends.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::resume::ResumePlan;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::step::FetchStep;
use crate::output::{OutputSink, TabularRow};
use crate::state::{CrawlState, UnitOutcome, WorkUnit};
use crate::storage::CheckpointStore;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

/// Inter-unit pacing and progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Pause after every completed unit except the last
    pub politeness_delay: Duration,

    /// Log a progress line every N completed units
    pub progress_interval: u64,
}

impl Pacing {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            politeness_delay: config.politeness_delay(),
            progress_interval: config.progress_interval.max(1),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_config(&CrawlerConfig::default())
    }
}

/// Per-run collaborators shared by the loop and the fetch step
pub struct CrawlContext {
    job: String,
    fetcher: Arc<dyn PageFetcher>,
    policy: RetryPolicy,
    pacing: Pacing,
    cancel: CancellationToken,
    span: Span,
}

impl CrawlContext {
    /// Creates the context for one run
    ///
    /// # Arguments
    ///
    /// * `job` - Job name, used for the tracing span
    /// * `fetcher` - Page fetcher (one HTTP GET per call)
    /// * `policy` - Retry/backoff policy
    /// * `pacing` - Politeness delay and progress interval
    /// * `cancel` - Token observed between and during units
    pub fn new(
        job: impl Into<String>,
        fetcher: Arc<dyn PageFetcher>,
        policy: RetryPolicy,
        pacing: Pacing,
        cancel: CancellationToken,
    ) -> Self {
        let job = job.into();
        let span = info_span!("crawl", job = %job);
        Self {
            job,
            fetcher,
            policy,
            pacing,
            cancel,
            span,
        }
    }

    /// Context using the retry and pacing settings of `config`
    pub fn from_config(
        job: impl Into<String>,
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self::new(
            job,
            fetcher,
            RetryPolicy::from_config(&config.retry),
            Pacing::from_config(&config.crawler),
            cancel,
        )
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    pub fn fetcher(&self) -> &dyn PageFetcher {
        self.fetcher.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }
}

/// Why a run stopped before the end of its plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// A unit exhausted its retries in a job that halts on failure
    FetchGaveUp { unit: WorkUnit, reason: String },

    /// Cancellation was requested; `unit` is the next unit to process
    Interrupted { unit: WorkUnit },
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FetchGaveUp { unit, reason } => {
                write!(f, "unit {} failed after retries: {}", unit, reason)
            }
            Self::Interrupted { unit } => write!(f, "interrupted before unit {}", unit),
        }
    }
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub state: CrawlState,
    pub first_unit: WorkUnit,
    pub last_completed: Option<WorkUnit>,
    pub units_completed: u64,
    pub records_written: u64,
    pub soft_failures: u64,
    pub halt: Option<HaltReason>,
}

impl RunReport {
    fn new(first_unit: WorkUnit) -> Self {
        Self {
            state: CrawlState::Idle,
            first_unit,
            last_completed: None,
            units_completed: 0,
            records_written: 0,
            soft_failures: 0,
            halt: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == CrawlState::Completed
    }
}

/// Main crawl loop for one job
pub struct Coordinator<T: TabularRow> {
    context: CrawlContext,
    step: FetchStep<T>,
    sink: Box<dyn OutputSink<T>>,
    checkpoint: Box<dyn CheckpointStore>,
    state: CrawlState,
}

impl<T: TabularRow> Coordinator<T> {
    pub fn new(
        context: CrawlContext,
        step: FetchStep<T>,
        sink: Box<dyn OutputSink<T>>,
        checkpoint: Box<dyn CheckpointStore>,
    ) -> Self {
        Self {
            context,
            step,
            sink,
            checkpoint,
            state: CrawlState::Idle,
        }
    }

    fn transition(&mut self, next: CrawlState) {
        debug_assert!(self.state.can_transition_to(next));
        debug!("{} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs the plan to completion, halt or cancellation
    ///
    /// Consumes the coordinator: the context and its collaborators live for
    /// exactly one run.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run completed or halted with consistent state
    /// * `Err(SweepError)` - Output or checkpoint persistence failed
    pub async fn run(mut self, plan: &ResumePlan) -> Result<RunReport> {
        let span = self.context.span.clone();
        async move {
            self.transition(CrawlState::Running);

            let mut report = RunReport::new(plan.first);
            let result = self.drive(plan, &mut report).await;

            if result.is_err() {
                self.transition(CrawlState::Halted);
            }
            report.state = self.state;
            info!(
                "Run {}: {} unit(s), {} record(s), {} soft failure(s)",
                self.state, report.units_completed, report.records_written, report.soft_failures
            );
            result.map(|()| report)
        }
        .instrument(span)
        .await
    }

    async fn drive(&mut self, plan: &ResumePlan, report: &mut RunReport) -> Result<()> {
        let last = match plan.last {
            Some(last) if !plan.is_empty() => last,
            _ => {
                info!("Nothing to do; all units are complete");
                self.transition(CrawlState::Completed);
                return Ok(());
            }
        };

        self.sink.open(plan.mode)?;
        info!(
            "Crawling units {}..={} into {}",
            plan.first,
            last,
            self.sink.location()
        );

        let cancel = self.context.cancel.clone();
        let pacing = self.context.pacing;
        let started = Instant::now();
        let mut unit = plan.first;

        loop {
            if cancel.is_cancelled() {
                return Ok(self.interrupt(report, unit));
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                outcome = self.step.process(&self.context, unit) => Some(outcome),
            };
            let Some(outcome) = outcome else {
                return Ok(self.interrupt(report, unit));
            };

            match outcome {
                UnitOutcome::Success(records) => {
                    self.sink.append(&records)?;
                    report.records_written += records.len() as u64;
                }
                UnitOutcome::SoftFailure { reason } => {
                    let rows = self.step.failure_records(unit, &reason);
                    self.sink.append(&rows)?;
                    report.records_written += rows.len() as u64;
                    report.soft_failures += 1;
                    warn!("Unit {} skipped: {}", unit, reason);
                }
                UnitOutcome::FatalFailure { reason } => {
                    error!("Halting at unit {}: {}", unit, reason);
                    report.halt = Some(HaltReason::FetchGaveUp { unit, reason });
                    self.transition(CrawlState::Halted);
                    return Ok(());
                }
            }

            self.checkpoint.save(unit)?;
            report.last_completed = Some(unit);
            report.units_completed += 1;

            if report.units_completed % pacing.progress_interval.max(1) == 0 {
                let rate = report.units_completed as f64 / started.elapsed().as_secs_f64();
                info!(
                    "Progress: unit {}/{}, {} record(s) written, {:.2} units/sec",
                    unit, last, report.records_written, rate
                );
            }

            if unit >= last {
                self.transition(CrawlState::Completed);
                return Ok(());
            }
            unit = unit.next();

            let interrupted = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(pacing.politeness_delay) => false,
            };
            if interrupted {
                return Ok(self.interrupt(report, unit));
            }
        }
    }

    fn interrupt(&mut self, report: &mut RunReport, unit: WorkUnit) {
        warn!("Interrupted; next run resumes at unit {}", unit);
        report.halt = Some(HaltReason::Interrupted { unit });
        self.transition(CrawlState::Halted);
    }
}
