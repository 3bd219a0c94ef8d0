//! Work units and the ordered sequences they come from
//!
//! The orchestrator only ever sees an ordinal; a [`WorkSequence`] knows how to
//! turn that ordinal into something fetchable.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Ordinal position of one unit of work in a finite ordered sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnit(pub u64);

impl WorkUnit {
    pub fn index(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The unit before this one, or `None` for ordinal zero
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a unit resolves to: the URL to request plus an optional human label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkTarget {
    pub url: String,
    pub label: Option<String>,
}

impl WorkTarget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A finite, ordered sequence of work units
pub trait WorkSequence: Send + Sync {
    /// First ordinal of the sequence
    fn first(&self) -> WorkUnit;

    /// Last ordinal (inclusive), or `None` when the sequence is empty
    fn last(&self) -> Option<WorkUnit>;

    /// Resolves a unit to its request target
    fn resolve(&self, unit: WorkUnit) -> WorkTarget;
}

/// Catalog pages `first..=last`, addressed through a query parameter
#[derive(Debug, Clone)]
pub struct PageSequence {
    base_url: Url,
    page_param: String,
    first: u64,
    last: u64,
}

impl PageSequence {
    pub fn new(base_url: Url, page_param: impl Into<String>, first: u64, last: u64) -> Self {
        Self {
            base_url,
            page_param: page_param.into(),
            first,
            last,
        }
    }
}

impl WorkSequence for PageSequence {
    fn first(&self) -> WorkUnit {
        WorkUnit(self.first)
    }

    fn last(&self) -> Option<WorkUnit> {
        (self.last >= self.first).then_some(WorkUnit(self.last))
    }

    fn resolve(&self, unit: WorkUnit) -> WorkTarget {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair(&self.page_param, &unit.to_string());
        WorkTarget::new(url.to_string())
    }
}

/// Rows `0..len` of a previously harvested list
#[derive(Debug, Clone, Default)]
pub struct RowSequence {
    targets: Vec<WorkTarget>,
}

impl RowSequence {
    pub fn new(targets: Vec<WorkTarget>) -> Self {
        Self { targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl WorkSequence for RowSequence {
    fn first(&self) -> WorkUnit {
        WorkUnit(0)
    }

    fn last(&self) -> Option<WorkUnit> {
        (self.targets.len() as u64).checked_sub(1).map(WorkUnit)
    }

    fn resolve(&self, unit: WorkUnit) -> WorkTarget {
        // Units come from first()..=last(), so the index is always in range.
        self.targets
            .get(unit.index() as usize)
            .cloned()
            .unwrap_or_else(|| WorkTarget::new(String::new()))
    }
}
