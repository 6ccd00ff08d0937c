//! Configuration module for Forge-Census
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use forge_census::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("census.toml")).unwrap();
//! println!("Each job targets {} repositories", config.crawler.target_repos);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, DimensionConfig, GithubConfig, OutputConfig, PartitionConfig,
    RateLimitConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, resolve_token,
};
