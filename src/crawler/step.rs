//! Fetch-and-extract step: turns one work unit into a `UnitOutcome`
//!
//! All per-unit failures are absorbed here. The only suspension points are
//! the fetch itself and the retry sleeps.

use crate::crawler::coordinator::CrawlContext;
use crate::crawler::parser::RecordExtractor;
use crate::crawler::retry::{classify_status, FailureClass, RetryDecision, RetryState};
use crate::output::{Record, TabularRow};
use crate::state::{UnitOutcome, WorkSequence, WorkTarget, WorkUnit};
use tracing::{debug, error, warn};

/// What a give-up after exhausted retries means for the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveUpAction {
    /// Stop the whole run at this unit
    Halt,

    /// Mark the unit done with the given status and carry on
    Skip { status: String },
}

/// Processes single units of one job
pub struct FetchStep<T> {
    sequence: Box<dyn WorkSequence>,
    extractor: Box<dyn RecordExtractor<T>>,
    on_give_up: GiveUpAction,
}

impl<T: TabularRow> FetchStep<T> {
    pub fn new(
        sequence: Box<dyn WorkSequence>,
        extractor: Box<dyn RecordExtractor<T>>,
        on_give_up: GiveUpAction,
    ) -> Self {
        Self {
            sequence,
            extractor,
            on_give_up,
        }
    }

    pub fn sequence(&self) -> &dyn WorkSequence {
        self.sequence.as_ref()
    }

    pub fn target(&self, unit: WorkUnit) -> WorkTarget {
        self.sequence.resolve(unit)
    }

    /// Fetches, retries and extracts one unit
    ///
    /// # Returns
    ///
    /// * `Success` - The page was fetched; zero records is still a success
    /// * `SoftFailure` - Retries ran out and the job skips failed units
    /// * `FatalFailure` - Retries ran out and the job halts on failure
    pub async fn process(&self, context: &CrawlContext, unit: WorkUnit) -> UnitOutcome<T> {
        let target = self.sequence.resolve(unit);
        let policy = context.policy();
        let mut retry = RetryState::new();

        loop {
            debug!("Fetching unit {}: {}", unit, target.url);

            let (class, reason) = match context.fetcher().fetch(&target.url).await {
                Ok(response) => match classify_status(response.status) {
                    None => {
                        let records = self
                            .extractor
                            .extract(&target, &response.body)
                            .into_iter()
                            .map(|data| Record::new(unit, data))
                            .collect::<Vec<_>>();
                        debug!("Unit {}: {} record(s)", unit, records.len());
                        return UnitOutcome::Success(records);
                    }
                    Some(class) => (class, format!("HTTP {}", response.status)),
                },
                Err(e) => (FailureClass::Transient, e.to_string()),
            };

            match policy.on_failure(&mut retry, class) {
                RetryDecision::RetryAfter(delay) => {
                    if class == FailureClass::RateLimited {
                        warn!(
                            "Rate limited on unit {} ({} so far); waiting {:?} before retrying",
                            unit,
                            retry.rate_limited(),
                            delay
                        );
                    } else {
                        warn!(
                            "Attempt {}/{} failed for unit {}: {}; retrying in {:?}",
                            retry.counted_failures(),
                            policy.max_attempts(),
                            unit,
                            reason,
                            delay
                        );
                    }
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { cooldown } => {
                    error!(
                        "All {} attempts failed for unit {} ({}): {}",
                        policy.max_attempts(),
                        unit,
                        target.url,
                        reason
                    );
                    tokio::time::sleep(cooldown).await;

                    return match &self.on_give_up {
                        GiveUpAction::Halt => UnitOutcome::FatalFailure { reason },
                        GiveUpAction::Skip { status } => UnitOutcome::SoftFailure {
                            reason: status.clone(),
                        },
                    };
                }
            }
        }
    }

    /// Rows recorded for a unit that ended in a soft failure
    pub fn failure_records(&self, unit: WorkUnit, reason: &str) -> Vec<Record<T>> {
        let target = self.sequence.resolve(unit);
        self.extractor
            .failure_record(&target, reason)
            .map(|data| vec![Record::new(unit, data)])
            .unwrap_or_default()
    }
}
