//! Configuration module for Orgsweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use orgsweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("orgsweep.toml")).unwrap();
//! println!("Listing pages {}..={}", config.listing.first_page, config.listing.last_page);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DetailsConfig, ListingConfig, OutputConfig, OutputFormat, RetryConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
