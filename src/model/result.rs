//! Final, immutable outcome of one crawl job

use crate::model::Repository;
use crate::state::QueryState;
use std::collections::HashSet;
use std::time::Duration;

/// What happened to one query descriptor during a job
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    /// The platform search string
    pub query: String,

    /// Human readable label
    pub description: String,

    /// Terminal state reached by the query
    pub state: QueryState,

    /// Pages successfully fetched
    pub pages: u32,

    /// Repositories this query added to the job
    pub added: usize,

    /// Error text when the query ended in [`QueryState::Errored`]
    pub error: Option<String>,
}

/// Result of a crawl job
///
/// `repositories` never holds more than the job target and never repeats an id.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub job_index: u64,
    pub job_count: u64,
    pub target: usize,

    /// Deduplicated repositories in first-found order
    pub repositories: Vec<Repository>,

    /// Distinct repositories observed, including any beyond the target
    pub total_seen: usize,

    /// Query-level errors that were recorded and skipped
    pub errors: Vec<String>,

    /// Per-query reports in execution order
    pub queries: Vec<QueryReport>,

    pub duration: Duration,
}

impl CrawlResult {
    /// Fraction of distinct repositories seen that were kept
    pub fn success_rate(&self) -> f64 {
        if self.total_seen == 0 {
            return 0.0;
        }
        self.repositories.len() as f64 / self.total_seen as f64
    }

    /// Number of distinct owners among kept repositories
    pub fn unique_owners(&self) -> usize {
        self.repositories
            .iter()
            .map(|r| r.owner.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Sum of stars across kept repositories
    pub fn total_stars(&self) -> u64 {
        self.repositories.iter().map(|r| r.stars as u64).sum()
    }

    pub fn average_stars(&self) -> f64 {
        if self.repositories.is_empty() {
            return 0.0;
        }
        self.total_stars() as f64 / self.repositories.len() as f64
    }

    /// How many repositories the job is short of its target
    pub fn shortfall(&self) -> usize {
        self.target.saturating_sub(self.repositories.len())
    }
}
