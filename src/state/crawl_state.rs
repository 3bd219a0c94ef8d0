/// Crawl lifecycle and per-unit outcome definitions
///
/// A single invocation of the crawl loop moves `Idle -> Running` and ends in
/// either `Completed` or `Halted`. Both terminal states are resumable from the
/// checkpoint by starting a new invocation.
use crate::output::Record;
use std::fmt;

/// Represents the lifecycle state of one crawl invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Constructed, no unit processed yet
    Idle,

    /// Processing units in order
    Running,

    /// The unit sequence was exhausted
    Completed,

    /// Stopped before the end of the sequence (fetch gave up or interrupted)
    Halted,
}

impl CrawlState {
    /// Returns true if this state ends the current invocation
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Halted)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Halted)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Halted => "halted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of processing one work unit
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome<T> {
    /// The page was fetched; zero records is still a success
    Success(Vec<Record<T>>),

    /// Nothing usable, but the crawl moves on past this unit
    SoftFailure { reason: String },

    /// The crawl must stop at this unit
    FatalFailure { reason: String },
}

impl<T> UnitOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// True for outcomes after which the checkpoint advances past the unit
    pub fn completes_unit(&self) -> bool {
        !matches!(self, Self::FatalFailure { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::SoftFailure { .. } => "soft_failure",
            Self::FatalFailure { .. } => "fatal_failure",
        }
    }
}
