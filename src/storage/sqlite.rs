//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::model::{QueryReport, Repository};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{NewRun, RunRecord, RunStatus, StoredRepository};
use crate::CensusError;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const RUN_COLUMNS: &str = "id, started_at, finished_at, config_hash, matrix_index, matrix_total, \
                           target, collected, status, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CensusError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, CensusError> {
        let conn = Connection::open(path)?;

        // Matrix jobs may share one database file
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, CensusError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        matrix_index: row.get::<_, i64>(4)? as u64,
        matrix_total: row.get::<_, i64>(5)? as u64,
        target: row.get::<_, i64>(6)? as usize,
        collected: row.get::<_, Option<i64>>(7)?.map(|c| c as usize),
        status: RunStatus::from_db_string(&row.get::<_, String>(8)?).unwrap_or(RunStatus::Running),
        error_message: row.get(9)?,
    })
}

fn to_sql_int(column: &'static str, value: u64) -> StorageResult<i64> {
    i64::try_from(value).map_err(|_| StorageError::OutOfRange { column, value })
}

fn timestamp(value: &Option<DateTime<Utc>>) -> Option<String> {
    value.as_ref().map(DateTime::to_rfc3339)
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, run: &NewRun<'_>) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, matrix_index, matrix_total, target, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                now,
                run.config_hash,
                to_sql_int("matrix_index", run.matrix_index)?,
                to_sql_int("matrix_total", run.matrix_total)?,
                to_sql_int("target", run.target as u64)?,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS);
        let run = self.conn.query_row(&sql, [], run_from_row).optional()?;
        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, collected: usize) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, collected = ?3 WHERE id = ?4",
            params![
                RunStatus::Completed.to_db_string(),
                now,
                to_sql_int("collected", collected as u64)?,
                run_id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn fail_run(&mut self, run_id: i64, reason: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, error_message = ?3 WHERE id = ?4",
            params![RunStatus::Failed.to_db_string(), now, reason, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn count_runs(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Repositories =====

    fn upsert_repositories(
        &mut self,
        repositories: &[Repository],
        partition: Option<&str>,
        fetched_date: NaiveDate,
    ) -> StorageResult<usize> {
        let now = Utc::now().to_rfc3339();
        let day = fetched_date.format("%Y-%m-%d").to_string();
        let tx = self.conn.transaction()?;

        {
            let mut repo_stmt = tx.prepare(
                "INSERT INTO repo (id, name, owner, url, name_with_owner, created_at,
                                   primary_language, fork_count, license_name, pushed_at,
                                   updated_at, alphabet_partition, first_seen_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    owner = excluded.owner,
                    url = excluded.url,
                    name_with_owner = excluded.name_with_owner,
                    created_at = COALESCE(excluded.created_at, repo.created_at),
                    primary_language = COALESCE(excluded.primary_language, repo.primary_language),
                    fork_count = COALESCE(excluded.fork_count, repo.fork_count),
                    license_name = COALESCE(excluded.license_name, repo.license_name),
                    pushed_at = COALESCE(excluded.pushed_at, repo.pushed_at),
                    updated_at = COALESCE(excluded.updated_at, repo.updated_at),
                    alphabet_partition = COALESCE(excluded.alphabet_partition, repo.alphabet_partition),
                    last_seen_at = excluded.last_seen_at",
            )?;
            let mut stats_stmt = tx.prepare(
                "INSERT INTO repo_stats (repo_id, fetched_date, stars) VALUES (?1, ?2, ?3)
                 ON CONFLICT(repo_id, fetched_date) DO UPDATE SET stars = excluded.stars",
            )?;

            for repo in repositories {
                repo_stmt.execute(params![
                    repo.id,
                    repo.name,
                    repo.owner,
                    repo.url,
                    repo.name_with_owner(),
                    timestamp(&repo.created_at),
                    repo.primary_language,
                    repo.fork_count,
                    repo.license_name,
                    timestamp(&repo.pushed_at),
                    timestamp(&repo.updated_at),
                    partition,
                    now,
                ])?;
                stats_stmt.execute(params![repo.id, day, repo.stars])?;
            }
        }

        tx.commit()?;
        Ok(repositories.len())
    }

    fn load_repositories(&self) -> StorageResult<Vec<StoredRepository>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.name, r.owner, r.name_with_owner, r.url, s.stars,
                    r.primary_language, r.fork_count, r.license_name, r.created_at,
                    r.pushed_at, r.updated_at, r.alphabet_partition, s.fetched_date
             FROM repo r
             LEFT JOIN repo_stats s ON s.repo_id = r.id
                AND s.fetched_date = (SELECT MAX(fetched_date) FROM repo_stats WHERE repo_id = r.id)
             ORDER BY r.id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StoredRepository {
                id: row.get(0)?,
                name: row.get(1)?,
                owner: row.get(2)?,
                name_with_owner: row.get(3)?,
                url: row.get(4)?,
                stars: row.get(5)?,
                primary_language: row.get(6)?,
                fork_count: row.get(7)?,
                license_name: row.get(8)?,
                created_at: row.get(9)?,
                pushed_at: row.get(10)?,
                updated_at: row.get(11)?,
                partition: row.get(12)?,
                fetched_date: row.get(13)?,
            })
        })?;

        let mut repositories = Vec::new();
        for row in rows {
            repositories.push(row?);
        }
        Ok(repositories)
    }

    fn count_repositories(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM repo", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn total_stars(&self) -> StorageResult<u64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(s.stars), 0) FROM repo_stats s
             WHERE s.fetched_date = (SELECT MAX(fetched_date) FROM repo_stats WHERE repo_id = s.repo_id)",
            [],
            |row| row.get(0),
        )?;
        Ok(total as u64)
    }

    fn count_unique_owners(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(DISTINCT owner) FROM repo", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn top_languages(&self, limit: usize) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT primary_language, COUNT(*) AS n FROM repo
             WHERE primary_language IS NOT NULL
             GROUP BY primary_language
             ORDER BY n DESC, primary_language ASC
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![to_sql_int("limit", limit as u64)?], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut languages = Vec::new();
        for row in rows {
            languages.push(row?);
        }
        Ok(languages)
    }

    // ===== Query Log =====

    fn record_queries(&mut self, run_id: i64, reports: &[QueryReport]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO query_log (run_id, position, query, description, state, pages, added, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;

            for (position, report) in reports.iter().enumerate() {
                stmt.execute(params![
                    run_id,
                    position as i64,
                    report.query,
                    report.description,
                    report.state.to_db_string(),
                    report.pages,
                    to_sql_int("added", report.added as u64)?,
                    report.error,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn count_queries_by_state(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT state, COUNT(*) FROM query_log GROUP BY state ORDER BY state",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}
