//! Output module for reporting and exporting census data
//!
//! This module handles:
//! - Exporting stored repositories as CSV, JSON or JSON Lines
//! - Printing database-wide census statistics
//! - Logging the summary of a finished job

mod export;
pub mod stats;

pub use export::{export_repositories, export_to_writer, ExportFormat};
pub use stats::{load_statistics, print_statistics, CensusStatistics};

use crate::model::CrawlResult;
use crate::storage::StorageError;
use thiserror::Error;
use tracing::{info, warn};

/// Errors raised while producing output files
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Unknown export format '{0}' (expected csv, json or jsonl)")]
    UnknownFormat(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to read stored repositories: {0}")]
    Storage(#[from] StorageError),
}

/// Logs the outcome of one job
pub fn log_job_summary(result: &CrawlResult) {
    info!(
        job_index = result.job_index,
        job_count = result.job_count,
        collected = result.repositories.len(),
        target = result.target,
        total_seen = result.total_seen,
        unique_owners = result.unique_owners(),
        average_stars = result.average_stars(),
        queries = result.queries.len(),
        duration_secs = result.duration.as_secs(),
        "Job finished"
    );

    for error in &result.errors {
        warn!("Recorded query error: {}", error);
    }
}
