//! Retry and backoff policy
//!
//! Failures fall into three classes. `RateLimited` waits a fixed time and is
//! retried forever without touching the attempt budget. `Transient` and
//! `PermanentHttp` share a bounded budget with an escalating delay schedule.
//!
//! Every counted failure waits its scheduled delay, including the one that
//! exhausts the budget: that last wait is returned as the give-up cooldown so
//! a run that moves on after giving up still leaves the server the full
//! schedule of quiet time.

use crate::config::RetryConfig;
use std::fmt;
use std::time::Duration;

/// Classification of one failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The server is throttling us (HTTP 429)
    RateLimited,

    /// Network trouble, timeouts, 408 and 5xx responses
    Transient,

    /// Any other non-success status
    PermanentHttp,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::PermanentHttp => "permanent_http",
        }
    }

    /// Whether a failure of this class uses up one attempt of the budget
    pub fn is_counted(&self) -> bool {
        !matches!(self, Self::RateLimited)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an HTTP status code
///
/// Returns `None` for 2xx responses.
pub fn classify_status(status: u16) -> Option<FailureClass> {
    match status {
        200..=299 => None,
        429 => Some(FailureClass::RateLimited),
        408 | 500..=599 => Some(FailureClass::Transient),
        _ => Some(FailureClass::PermanentHttp),
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the duration, then try the same unit again
    RetryAfter(Duration),

    /// The budget is spent; sleep for the cooldown, then stop retrying
    GiveUp { cooldown: Duration },
}

/// Per-unit retry bookkeeping, discarded once the unit has an outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    counted_failures: u32,
    rate_limited: u32,
    last_class: Option<FailureClass>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failures charged against the bounded budget
    pub fn counted_failures(&self) -> u32 {
        self.counted_failures
    }

    /// Rate-limit responses seen (never charged)
    pub fn rate_limited(&self) -> u32 {
        self.rate_limited
    }

    /// Total requests issued so far for this unit
    pub fn attempts(&self) -> u32 {
        self.counted_failures + self.rate_limited
    }

    pub fn last_class(&self) -> Option<FailureClass> {
        self.last_class
    }
}

/// Decides between retrying and giving up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Vec<Duration>,
    rate_limit_wait: Duration,
}

impl RetryPolicy {
    /// Creates a policy
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Counted attempts allowed per unit (at least 1)
    /// * `backoff` - Delay after the 1st, 2nd, ... counted failure; the last
    ///   entry repeats once the schedule runs out
    /// * `rate_limit_wait` - Fixed wait after every rate-limit response
    pub fn new(max_attempts: u32, backoff: Vec<Duration>, rate_limit_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            rate_limit_wait,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config
                .backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            Duration::from_millis(config.rate_limit_wait_ms),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn rate_limit_wait(&self) -> Duration {
        self.rate_limit_wait
    }

    /// Delay after the `n`th counted failure (1-based), clamped to the schedule
    pub fn backoff_for(&self, n: u32) -> Duration {
        let index = (n.max(1) - 1) as usize;
        self.backoff
            .get(index)
            .or_else(|| self.backoff.last())
            .copied()
            .unwrap_or_default()
    }

    /// Sum of the delays a unit that never succeeds will wait in total
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_attempts).map(|n| self.backoff_for(n)).sum()
    }

    /// Records a failure and decides what happens next
    pub fn on_failure(&self, state: &mut RetryState, class: FailureClass) -> RetryDecision {
        state.last_class = Some(class);

        if !class.is_counted() {
            state.rate_limited += 1;
            return RetryDecision::RetryAfter(self.rate_limit_wait);
        }

        state.counted_failures += 1;
        let delay = self.backoff_for(state.counted_failures);

        if state.counted_failures >= self.max_attempts {
            RetryDecision::GiveUp { cooldown: delay }
        } else {
            RetryDecision::RetryAfter(delay)
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
