//! Job wiring: builds the listing and details crawls from `Config`
//!
//! The listing job walks the catalog pages and halts when a page cannot be
//! fetched. The details job walks the rows of the listing output, one detail
//! page per row, and records a failure row instead of halting.

use crate::config::{Config, DetailsConfig};
use crate::crawler::coordinator::{CrawlContext, Coordinator, RunReport};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::parser::{OrganizationDetailExtractor, OrganizationListExtractor};
use crate::crawler::resume::{prepare, ResumeOptions, ResumePlan};
use crate::crawler::step::{FetchStep, GiveUpAction};
use crate::output::{
    load_statistics, open_sink, HarvestStatistics, OrganizationDetail, OrganizationSummary,
    OutputSink, TabularRow,
};
use crate::state::{PageSequence, RowSequence, WorkSequence, WorkTarget};
use crate::storage::{CheckpointStore, FileCheckpointStore};
use crate::{ConfigError, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

pub const LISTING_JOB: &str = "listing";
pub const DETAILS_JOB: &str = "details";

/// SQLite table names; both jobs may share one database file
pub const LISTING_TABLE: &str = "organizations";
pub const DETAILS_TABLE: &str = "organization_details";

/// Everything one job needs besides the fetcher
pub struct JobParts<T: TabularRow> {
    pub name: &'static str,
    pub step: FetchStep<T>,
    pub sink: Box<dyn OutputSink<T>>,
    pub checkpoint: Box<dyn CheckpointStore>,
}

impl<T: TabularRow> JobParts<T> {
    /// Reconciles output and checkpoint and computes where the run starts
    pub fn plan(&mut self, options: &ResumeOptions) -> Result<ResumePlan> {
        prepare(
            self.step.sequence(),
            &mut *self.sink,
            &mut *self.checkpoint,
            options,
        )
    }

    pub fn statistics(&self) -> Result<HarvestStatistics> {
        load_statistics(self.name, &*self.sink, &*self.checkpoint)
    }

    /// Plans and runs the job to completion, halt or cancellation
    pub async fn run(
        mut self,
        config: &Config,
        fetcher: Arc<dyn PageFetcher>,
        options: &ResumeOptions,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let plan = self.plan(options)?;
        info!(
            "{}: {} unit(s) to process starting at {}",
            self.name,
            plan.len(),
            plan.first
        );

        let context = CrawlContext::from_config(self.name, config, fetcher, cancel);
        Coordinator::new(context, self.step, self.sink, self.checkpoint)
            .run(&plan)
            .await
    }
}

fn listing_base(config: &Config) -> Result<Url> {
    Url::parse(&config.listing.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.listing.base_url, e)).into())
}

fn details_section(config: &Config) -> Result<&DetailsConfig> {
    config
        .details
        .as_ref()
        .ok_or_else(|| ConfigError::Validation("missing [details] section".to_string()).into())
}

fn checkpoint_store(path: &str, job: &str, config_hash: Option<&str>) -> Box<dyn CheckpointStore> {
    Box::new(FileCheckpointStore::new(
        path,
        job,
        config_hash.map(str::to_string),
    ))
}

/// Output sink of the listing job
pub fn listing_sink(config: &Config) -> Box<dyn OutputSink<OrganizationSummary>> {
    open_sink(
        config.output.format,
        Path::new(&config.listing.output),
        LISTING_TABLE,
    )
}

/// Builds the listing job: one unit per catalog page
pub fn listing_job(config: &Config, config_hash: Option<&str>) -> Result<JobParts<OrganizationSummary>> {
    let base = listing_base(config)?;
    let sequence = PageSequence::new(
        base.clone(),
        config.listing.page_param.clone(),
        config.listing.first_page,
        config.listing.last_page,
    );
    let extractor = OrganizationListExtractor::new(&base)?;

    Ok(JobParts {
        name: LISTING_JOB,
        step: FetchStep::new(Box::new(sequence), Box::new(extractor), GiveUpAction::Halt),
        sink: listing_sink(config),
        checkpoint: checkpoint_store(&config.listing.checkpoint, LISTING_JOB, config_hash),
    })
}

/// Builds the details job: one unit per row of the listing output
///
/// Row indices stay stable across runs because the listing output is only
/// ever appended to (or truncated at a unit boundary).
pub fn details_job(config: &Config, config_hash: Option<&str>) -> Result<JobParts<OrganizationDetail>> {
    let details = details_section(config)?;
    let base = listing_base(config)?;

    let targets: Vec<WorkTarget> = listing_sink(config)
        .read_records()?
        .into_iter()
        .map(|record| {
            WorkTarget::new(record.data.organization_url).with_label(record.data.organization_name)
        })
        .collect();
    let sequence = RowSequence::new(targets);
    info!("Details input: {} listing row(s)", sequence.len());

    let extractor = OrganizationDetailExtractor::new(&base)?;
    Ok(JobParts {
        name: DETAILS_JOB,
        step: FetchStep::new(
            Box::new(sequence),
            Box::new(extractor),
            GiveUpAction::Skip {
                status: OrganizationDetail::STATUS_FAILED_AFTER_RETRIES.to_string(),
            },
        ),
        sink: open_sink(config.output.format, Path::new(&details.output), DETAILS_TABLE),
        checkpoint: checkpoint_store(&details.checkpoint, DETAILS_JOB, config_hash),
    })
}

/// Fetcher built from the `[user-agent]` and `[crawler]` sections
pub fn http_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    let fetcher = HttpFetcher::new(&config.user_agent, config.crawler.request_timeout())?;
    Ok(Arc::new(fetcher))
}

/// Runs the listing crawl
///
/// # Arguments
///
/// * `config` - Loaded and validated configuration
/// * `config_hash` - Fingerprint recorded in the checkpoint
/// * `options` - Start/end/reset overrides
/// * `cancel` - Cancelled on Ctrl-C
pub async fn run_listing(
    config: &Config,
    config_hash: Option<&str>,
    options: &ResumeOptions,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let job = listing_job(config, config_hash)?;
    job.run(config, http_fetcher(config)?, options, cancel).await
}

/// Runs the details crawl over the current listing output
pub async fn run_details(
    config: &Config,
    config_hash: Option<&str>,
    options: &ResumeOptions,
    cancel: CancellationToken,
) -> Result<RunReport> {
    let job = details_job(config, config_hash)?;
    job.run(config, http_fetcher(config)?, options, cancel).await
}

/// Number of units a job's sequence covers
pub fn sequence_len(sequence: &dyn WorkSequence) -> u64 {
    match (sequence.first(), sequence.last()) {
        (first, Some(last)) if last >= first => last.index() - first.index() + 1,
        _ => 0,
    }
}
