//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `WorkUnit`, `WorkTarget`, `WorkSequence`: what the crawl iterates over
//! - `CrawlState`: lifecycle of one crawl invocation
//! - `UnitOutcome`: the three-way result of processing one unit

mod crawl_state;
mod work;

// Re-export main types
pub use crawl_state::{CrawlState, UnitOutcome};
pub use work::{PageSequence, RowSequence, WorkSequence, WorkTarget, WorkUnit};
