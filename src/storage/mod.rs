//! Storage module for persisting census data
//!
//! This module handles all database operations for the census, including:
//! - SQLite database initialization and schema management
//! - Run tracking per matrix job
//! - Idempotent repository and daily star-count upserts
//! - Per-query outcome logging

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use serde::Serialize;

/// Parameters of a run about to start
#[derive(Debug, Clone)]
pub struct NewRun<'a> {
    pub config_hash: &'a str,
    pub matrix_index: u64,
    pub matrix_total: u64,
    pub target: usize,
}

/// Represents a census run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub matrix_index: u64,
    pub matrix_total: u64,
    pub target: usize,
    pub collected: Option<usize>,
    pub status: RunStatus,
    pub error_message: Option<String>,
}

/// Status of a census run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A repository row joined with its most recent star count
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRepository {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub name_with_owner: String,
    pub url: String,
    pub stars: Option<u32>,
    pub primary_language: Option<String>,
    pub fork_count: Option<u32>,
    pub license_name: Option<String>,
    pub created_at: Option<String>,
    pub pushed_at: Option<String>,
    pub updated_at: Option<String>,
    pub partition: Option<String>,
    pub fetched_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }
}
