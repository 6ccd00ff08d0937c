//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::model::{QueryReport, Repository};
use crate::storage::{NewRun, RunRecord, StoredRepository};
use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: u64 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Handing over the same batch twice must leave the store unchanged apart
/// from `last_seen_at` timestamps.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new census run in the `running` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, run: &NewRun<'_>) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as completed with its collected count
    fn complete_run(&mut self, run_id: i64, collected: usize) -> StorageResult<()>;

    /// Marks a run as failed with a reason
    fn fail_run(&mut self, run_id: i64, reason: &str) -> StorageResult<()>;

    fn count_runs(&self) -> StorageResult<u64>;

    // ===== Repositories =====

    /// Upserts a batch of repositories and their star counts in one transaction
    ///
    /// # Arguments
    ///
    /// * `repositories` - Batch to store
    /// * `partition` - Partition label; an existing label is kept when `None`
    /// * `fetched_date` - Day the star counts were observed
    ///
    /// # Returns
    ///
    /// Number of repositories written
    fn upsert_repositories(
        &mut self,
        repositories: &[Repository],
        partition: Option<&str>,
        fetched_date: NaiveDate,
    ) -> StorageResult<usize>;

    /// Loads every stored repository with its latest star count, ordered by id
    fn load_repositories(&self) -> StorageResult<Vec<StoredRepository>>;

    fn count_repositories(&self) -> StorageResult<u64>;

    /// Sum of the latest star count of every repository
    fn total_stars(&self) -> StorageResult<u64>;

    fn count_unique_owners(&self) -> StorageResult<u64>;

    /// Most common primary languages with their repository counts
    fn top_languages(&self, limit: usize) -> StorageResult<Vec<(String, u64)>>;

    // ===== Query Log =====

    /// Records the outcome of every query of a run
    fn record_queries(&mut self, run_id: i64, reports: &[QueryReport]) -> StorageResult<()>;

    /// Counts logged queries per terminal state
    fn count_queries_by_state(&self) -> StorageResult<Vec<(String, u64)>>;
}
