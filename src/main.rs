//! Orgsweep main entry point
//!
//! This is the command-line interface for the Orgsweep catalog harvester.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use orgsweep::config::{load_config_with_hash, Config};
use orgsweep::crawler::jobs::{details_job, listing_job, sequence_len, JobParts};
use orgsweep::crawler::{run_details, run_listing, ResumeOptions, RunReport};
use orgsweep::output::{print_statistics, TabularRow};
use orgsweep::CrawlState;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Orgsweep: a resumable catalog harvester
///
/// Orgsweep walks a paginated organization catalog one page at a time, then
/// visits the detail page of every harvested organization. Every completed
/// unit is checkpointed, so an interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "orgsweep")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest the catalog listing pages
    Listing(RunArgs),

    /// Harvest the detail page of every listed organization
    Details(RunArgs),

    /// Validate config and show what would be crawled without crawling
    Check,

    /// Show checkpoint and output statistics for both jobs
    Status,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Start at this unit instead of resuming from the checkpoint
    #[arg(long)]
    start: Option<u64>,

    /// Stop after this unit
    #[arg(long)]
    end: Option<u64>,

    /// Delete the checkpoint and output and start over
    #[arg(long, conflicts_with = "start")]
    reset: bool,
}

impl From<&RunArgs> for ResumeOptions {
    fn from(args: &RunArgs) -> Self {
        Self {
            start: args.start,
            end: args.end,
            reset: args.reset,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command; `Ok(false)` means a crawl halted
async fn run(cli: Cli) -> anyhow::Result<bool> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match &cli.command {
        Command::Listing(args) => {
            let cancel = cancel_on_ctrl_c();
            let report = run_listing(&config, Some(&config_hash), &args.into(), cancel)
                .await
                .context("listing crawl failed")?;
            Ok(finish("listing", &report))
        }
        Command::Details(args) => {
            let cancel = cancel_on_ctrl_c();
            let report = run_details(&config, Some(&config_hash), &args.into(), cancel)
                .await
                .context("details crawl failed")?;
            Ok(finish("details", &report))
        }
        Command::Check => {
            handle_check(&config, &config_hash)?;
            Ok(true)
        }
        Command::Status => {
            handle_status(&config, &config_hash)?;
            Ok(true)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("orgsweep=info,warn"),
            1 => EnvFilter::new("orgsweep=debug,info"),
            2 => EnvFilter::new("orgsweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received; abandoning the current unit and stopping");
            token.cancel();
        }
    });
    cancel
}

/// Logs the outcome of a run; returns false when it halted
fn finish(job: &str, report: &RunReport) -> bool {
    match (&report.state, &report.halt) {
        (CrawlState::Completed, _) => {
            tracing::info!(
                "{} completed: {} unit(s), {} row(s), {} skipped",
                job,
                report.units_completed,
                report.records_written,
                report.soft_failures
            );
            true
        }
        (_, Some(reason)) => {
            tracing::error!("{} halted: {}", job, reason);
            false
        }
        (state, None) => {
            tracing::error!("{} stopped in state {}", job, state);
            false
        }
    }
}

/// Handles `check`: validates config and shows what each job would do
fn handle_check(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    println!("=== Orgsweep Check ===\n");

    println!("Crawler Configuration:");
    println!("  Politeness delay: {}ms", config.crawler.politeness_delay_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!("  Progress interval: {} units", config.crawler.progress_interval);

    println!("\nRetry Policy:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Backoff: {:?} ms", config.retry.backoff_ms);
    println!("  Rate-limit wait: {}ms", config.retry.rate_limit_wait_ms);

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nOutput format: {:?}", config.output.format);

    let listing = listing_job(config, Some(config_hash))?;
    describe_job(&listing)?;

    match details_job(config, Some(config_hash)) {
        Ok(details) => describe_job(&details)?,
        Err(e) => println!("\ndetails: not available ({})", e),
    }

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
    Ok(())
}

fn describe_job<T: TabularRow>(job: &JobParts<T>) -> anyhow::Result<()> {
    let sequence = job.step.sequence();
    let checkpoint = job.checkpoint.load()?;
    let status = job.sink.inspect()?;

    println!("\n{}:", job.name);
    println!("  Units: {} (from {})", sequence_len(sequence), sequence.first());
    println!("  Output: {} ({} rows)", job.sink.location(), status.rows());
    println!("  Checkpoint: {}", job.checkpoint.location());
    match checkpoint {
        Some(unit) => println!("  Would resume at unit {}", unit.next()),
        None => println!("  Would start at unit {}", sequence.first()),
    }
    Ok(())
}

/// Handles `status`: prints statistics for both jobs
fn handle_status(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    let listing = listing_job(config, Some(config_hash))?;
    print_statistics(&listing.statistics()?);

    if config.details.is_some() {
        let details = details_job(config, Some(config_hash))?;
        print_statistics(&details.statistics()?);
    }
    Ok(())
}
