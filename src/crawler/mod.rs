//! Crawler module for resumable, one-unit-at-a-time harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching (one GET per call)
//! - Failure classification and the retry/backoff policy
//! - Record extraction from listing and detail pages
//! - The fetch-and-extract step and the checkpointed crawl loop
//! - Resume planning and job wiring

mod coordinator;
mod fetcher;
pub mod jobs;
mod parser;
mod resume;
mod retry;
mod step;

pub use coordinator::{CrawlContext, Coordinator, HaltReason, Pacing, RunReport};
pub use fetcher::{
    build_http_client, FetchError, FetchErrorKind, FetchResponse, HttpFetcher, PageFetcher,
};
pub use jobs::{run_details, run_listing, JobParts};
pub use parser::{OrganizationDetailExtractor, OrganizationListExtractor, RecordExtractor};
pub use resume::{prepare, ResumeOptions, ResumePlan};
pub use retry::{classify_status, FailureClass, RetryDecision, RetryPolicy, RetryState};
pub use step::{FetchStep, GiveUpAction};
