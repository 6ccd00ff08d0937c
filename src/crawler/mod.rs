//! Crawler module for partitioned repository discovery
//!
//! This module contains the core crawling logic, including:
//! - GraphQL transport and response classification
//! - Page fetching with retry and quota handling
//! - Cross-worker deduplication up to the job target
//! - Overall job coordination and persistence

mod accumulator;
mod coordinator;
mod fetcher;
mod governor;
mod queue;
#[cfg(test)]
mod testing;
mod transport;

pub use accumulator::{Admission, DedupAccumulator};
pub use coordinator::CrawlCoordinator;
pub use fetcher::{search_payload, ConnectionInfo, Page, PagedFetcher};
pub use governor::{RateLimitGovernor, RecoverableKind, RetryDecision};
pub use queue::WorkQueue;
pub use transport::{build_http_client, GraphQlTransport, RawResponse, Transport, TransportError};

use crate::config::{resolve_token, Config};
use crate::model::CrawlResult;
use crate::output::{export_repositories, log_job_summary, ExportFormat};
use crate::partition::PartitionPlan;
use crate::storage::{NewRun, SqliteStorage, Storage};
use crate::CensusError;
use chrono::Utc;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Coordinates of one matrix job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub index: u64,
    pub total: u64,
    pub target: usize,
}

/// What a finished census job produced
#[derive(Debug)]
pub struct CensusOutcome {
    pub run_id: i64,
    pub result: CrawlResult,
}

/// Label stored with every repository a matrix job writes
pub fn partition_label(job_index: u64) -> String {
    format!("matrix_{}", job_index)
}

/// Runs a complete census job against the configured GraphQL endpoint
///
/// This is the main entry point for a matrix job. It will:
/// 1. Resolve the API token and build the transport
/// 2. Open the database and record a run
/// 3. Verify credentials
/// 4. Crawl the job's partition up to its target
/// 5. Upsert the results and write the configured exports
///
/// # Arguments
///
/// * `config` - The census configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
/// * `job` - Matrix coordinates and target
/// * `shutdown` - Cancelled to stop the crawl early
///
/// # Returns
///
/// * `Ok(CensusOutcome)` - Job completed and its results were stored
/// * `Err(CensusError)` - Job failed
pub async fn run_census(
    config: &Config,
    config_hash: &str,
    job: JobSpec,
    shutdown: CancellationToken,
) -> Result<CensusOutcome, CensusError> {
    let token = resolve_token(&config.github)?;
    let transport = GraphQlTransport::new(&config.github, token)?;
    run_census_with(transport, config, config_hash, job, shutdown).await
}

/// Runs a census job over an arbitrary transport
pub async fn run_census_with<T: Transport + 'static>(
    transport: T,
    config: &Config,
    config_hash: &str,
    job: JobSpec,
    shutdown: CancellationToken,
) -> Result<CensusOutcome, CensusError> {
    let plan = PartitionPlan::resolve(config.partition.as_ref())?;
    // Reject bad coordinates before touching the database
    plan.generate(job.index, job.total)?;

    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let run_id = storage.create_run(&NewRun {
        config_hash,
        matrix_index: job.index,
        matrix_total: job.total,
        target: job.target,
    })?;
    info!(run_id, job_index = job.index, job_count = job.total, "Created run");

    let fetcher = PagedFetcher::new(
        transport,
        RateLimitGovernor::new(&config.rate_limit),
        config.crawler.page_size,
    );

    match fetcher.verify_connection().await {
        Ok(info) => info!(
            login = %info.login,
            remaining = ?info.rate_limit_remaining,
            "Authenticated"
        ),
        Err(e) => {
            error!("Connection check failed: {}", e);
            storage.fail_run(run_id, &e.to_string())?;
            return Err(e.into());
        }
    }

    let coordinator =
        CrawlCoordinator::new(fetcher, plan, &config.crawler).with_shutdown(shutdown);

    let result = match coordinator.crawl(job.index, job.total, job.target).await {
        Ok(result) => result,
        Err(e) => {
            storage.fail_run(run_id, &e.to_string())?;
            return Err(e);
        }
    };
    log_job_summary(&result);

    let stored = match store_results(&mut storage, run_id, &result, job.index, config) {
        Ok(stored) => stored,
        Err(e) => {
            error!(run_id, "Failed to store results: {}", e);
            storage.fail_run(run_id, &e.to_string())?;
            return Err(e);
        }
    };
    storage.complete_run(run_id, stored)?;

    Ok(CensusOutcome { run_id, result })
}

/// Upserts the kept repositories, logs the queries and writes the exports
fn store_results(
    storage: &mut SqliteStorage,
    run_id: i64,
    result: &CrawlResult,
    job_index: u64,
    config: &Config,
) -> Result<usize, CensusError> {
    let label = partition_label(job_index);
    let stored = storage.upsert_repositories(
        &result.repositories,
        Some(&label),
        Utc::now().date_naive(),
    )?;
    storage.record_queries(run_id, &result.queries)?;
    info!(run_id, stored, partition = %label, "Stored repositories");

    write_exports(&*storage, config)?;
    Ok(stored)
}

/// Writes the exports named in the output configuration
fn write_exports(storage: &dyn Storage, config: &Config) -> Result<(), CensusError> {
    if let Some(path) = &config.output.csv_path {
        export_repositories(storage, ExportFormat::Csv, Path::new(path))?;
    }
    if let Some(path) = &config.output.json_path {
        export_repositories(storage, ExportFormat::Json, Path::new(path))?;
    }
    Ok(())
}
