//! Statistics generation from the census database
//!
//! This module provides functionality for extracting and displaying
//! census statistics from the storage layer.

use crate::storage::{RunRecord, Storage};
use crate::CensusError;

const TOP_LANGUAGES: usize = 10;

/// Census statistics summary
#[derive(Debug, Clone)]
pub struct CensusStatistics {
    /// Total number of stored repositories
    pub total_repositories: u64,

    /// Sum of the latest star count of every repository
    pub total_stars: u64,

    /// Number of distinct owners
    pub unique_owners: u64,

    /// Most common primary languages
    pub top_languages: Vec<(String, u64)>,

    /// Logged queries per terminal state
    pub queries_by_state: Vec<(String, u64)>,

    pub total_runs: u64,

    pub latest_run: Option<RunRecord>,
}

impl CensusStatistics {
    pub fn average_stars(&self) -> f64 {
        if self.total_repositories == 0 {
            return 0.0;
        }
        self.total_stars as f64 / self.total_repositories as f64
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CensusStatistics)` - Successfully loaded statistics
/// * `Err(CensusError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<CensusStatistics, CensusError> {
    Ok(CensusStatistics {
        total_repositories: storage.count_repositories()?,
        total_stars: storage.total_stars()?,
        unique_owners: storage.count_unique_owners()?,
        top_languages: storage.top_languages(TOP_LANGUAGES)?,
        queries_by_state: storage.count_queries_by_state()?,
        total_runs: storage.count_runs()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &CensusStatistics) {
    println!("=== Census Statistics ===\n");

    println!("Overview:");
    println!("  Repositories: {}", stats.total_repositories);
    println!("  Unique owners: {}", stats.unique_owners);
    println!("  Total stars: {}", stats.total_stars);
    println!("  Average stars: {:.1}", stats.average_stars());
    println!();

    if !stats.top_languages.is_empty() {
        println!("Top Languages:");
        for (language, count) in &stats.top_languages {
            let percentage = if stats.total_repositories > 0 {
                (*count as f64 / stats.total_repositories as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", language, count, percentage);
        }
        println!();
    }

    if !stats.queries_by_state.is_empty() {
        println!("Queries by State:");
        for (state, count) in &stats.queries_by_state {
            println!("  {}: {}", state, count);
        }
        println!();
    }

    println!("Runs: {}", stats.total_runs);
    if let Some(run) = &stats.latest_run {
        println!(
            "  Latest: #{} job {}/{} {} ({} of {} collected)",
            run.id,
            run.matrix_index,
            run.matrix_total,
            run.status.to_db_string(),
            run.collected.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
            run.target
        );
        if let Some(message) = &run.error_message {
            println!("  Error: {}", message);
        }
    }
}
