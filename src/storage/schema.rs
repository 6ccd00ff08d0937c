//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Forge-Census database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track census runs, one per matrix job invocation
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    matrix_index INTEGER NOT NULL,
    matrix_total INTEGER NOT NULL,
    target INTEGER NOT NULL,
    collected INTEGER,
    status TEXT NOT NULL,
    error_message TEXT
);

-- One row per repository, keyed by the platform id
CREATE TABLE IF NOT EXISTS repo (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    owner TEXT NOT NULL,
    url TEXT NOT NULL,
    name_with_owner TEXT NOT NULL,
    created_at TEXT,
    primary_language TEXT,
    fork_count INTEGER,
    license_name TEXT,
    pushed_at TEXT,
    updated_at TEXT,
    alphabet_partition TEXT,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_repo_owner ON repo(owner);
CREATE INDEX IF NOT EXISTS idx_repo_language ON repo(primary_language);

-- Star count observed per repository per day
CREATE TABLE IF NOT EXISTS repo_stats (
    repo_id INTEGER NOT NULL REFERENCES repo(id),
    fetched_date TEXT NOT NULL,
    stars INTEGER NOT NULL,
    PRIMARY KEY (repo_id, fetched_date)
);

-- Outcome of every query of every run
CREATE TABLE IF NOT EXISTS query_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    position INTEGER NOT NULL,
    query TEXT NOT NULL,
    description TEXT NOT NULL,
    state TEXT NOT NULL,
    pages INTEGER NOT NULL,
    added INTEGER NOT NULL,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_query_log_run ON query_log(run_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
