//! Crawl coordinator - runs a job's queries against the shared accumulator
//!
//! Queries run one after another. Within a query, `workers-per-query` tasks
//! share a cursor [`WorkQueue`]; a job-wide semaphore bounds in-flight page
//! fetches. A query ends when its pages run out, the page ceiling is hit, an
//! error is recorded for it, or the job target is reached. Reaching the target
//! cancels every worker of the current query, including in-flight fetches.

use crate::config::CrawlerConfig;
use crate::crawler::accumulator::{Admission, DedupAccumulator};
use crate::crawler::fetcher::{Page, PagedFetcher};
use crate::crawler::queue::WorkQueue;
use crate::crawler::transport::Transport;
use crate::model::{CrawlResult, QueryReport};
use crate::partition::{PartitionPlan, QueryDescriptor};
use crate::state::QueryState;
use crate::{CensusError, FetchError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-query bookkeeping shared by that query's workers
#[derive(Debug)]
struct QueryProgress {
    state: QueryState,
    pages: u32,
    added: usize,
    limit_hit: bool,
    interrupted: bool,
    error: Option<FetchError>,
}

impl QueryProgress {
    fn new() -> Self {
        Self {
            state: QueryState::Pending,
            pages: 0,
            added: 0,
            limit_hit: false,
            interrupted: false,
            error: None,
        }
    }

    fn advance(&mut self, next: QueryState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => warn!("{}", e),
        }
    }
}

/// Everything a worker needs for one query
struct QueryRun<T> {
    descriptor: QueryDescriptor,
    fetcher: Arc<PagedFetcher<T>>,
    accumulator: Arc<DedupAccumulator>,
    semaphore: Arc<Semaphore>,
    queue: WorkQueue,
    progress: Mutex<QueryProgress>,
    max_pages: u32,
    cancel: CancellationToken,
}

impl<T: Transport> QueryRun<T> {
    fn progress(&self) -> MutexGuard<'_, QueryProgress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pulls cursors until the queue drains or the query is cancelled
    async fn work(&self) {
        while let Some(cursor) = self.queue.next(&self.cancel).await {
            let next = self.fetch_and_offer(cursor.as_deref()).await;
            self.queue.complete(next);
        }
    }

    /// Fetches one page and offers it; returns the cursor to continue from
    async fn fetch_and_offer(&self, cursor: Option<&str>) -> Option<String> {
        self.progress().advance(QueryState::Fetching);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.progress().interrupted = true;
                return None;
            }
            result = self.fetch(cursor) => result,
        };

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                error!(query = %self.descriptor.query(), error = %e, "Query failed");
                {
                    let mut progress = self.progress();
                    if progress.error.is_none() {
                        progress.error = Some(e);
                    }
                }
                self.cancel.cancel();
                return None;
            }
        };

        let mut added = 0usize;
        let mut full = false;
        for repository in page.repositories {
            match self.accumulator.offer(repository) {
                Admission::Added { .. } => added += 1,
                Admission::Duplicate => {}
                Admission::Full => full = true,
            }
        }

        let pages = {
            let mut progress = self.progress();
            progress.advance(QueryState::PageReceived);
            progress.pages += 1;
            progress.added += added;
            progress.pages
        };
        debug!(
            query = %self.descriptor.query(),
            page = pages,
            added,
            total = self.accumulator.len(),
            "Page received"
        );

        if full || self.accumulator.is_full() {
            self.cancel.cancel();
            return None;
        }
        if !page.has_more {
            return None;
        }
        let Some(next) = page.end_cursor else {
            warn!(query = %self.descriptor.query(), "More pages reported without a cursor");
            return None;
        };
        if pages >= self.max_pages {
            self.progress().limit_hit = true;
            return None;
        }
        Some(next)
    }

    async fn fetch(&self, cursor: Option<&str>) -> Result<Page, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| FetchError::Network {
                message: e.to_string(),
                attempts: 0,
            })?;
        self.fetcher.fetch_page(&self.descriptor, cursor).await
    }

    /// Settles the terminal state once every worker has stopped
    fn finish(&self) -> QueryReport {
        let target_reached = self.accumulator.is_full();
        let unfetched = self.cancel.is_cancelled() && self.queue.pending() > 0;
        let mut progress = self.progress();

        let terminal = if progress.error.is_some() {
            QueryState::Errored
        } else if target_reached {
            QueryState::TargetReached
        } else if progress.interrupted || unfetched {
            QueryState::Interrupted
        } else if progress.limit_hit {
            QueryState::PageLimitHit
        } else {
            QueryState::Exhausted
        };
        progress.advance(terminal);

        QueryReport {
            query: self.descriptor.query().to_string(),
            description: self.descriptor.description().to_string(),
            state: progress.state,
            pages: progress.pages,
            added: progress.added,
            error: progress.error.as_ref().map(|e| e.to_string()),
        }
    }

    fn fatal_error(&self) -> Option<FetchError> {
        self.progress().error.clone().filter(FetchError::is_fatal)
    }
}

/// Orchestrates a job: partition queries, paginate, dedup, stop at target
pub struct CrawlCoordinator<T> {
    fetcher: Arc<PagedFetcher<T>>,
    plan: PartitionPlan,
    semaphore: Arc<Semaphore>,
    workers_per_query: usize,
    max_pages_per_query: u32,
    shutdown: CancellationToken,
}

impl<T: Transport + 'static> CrawlCoordinator<T> {
    /// Creates a coordinator
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Page fetcher used by every worker
    /// * `plan` - Partition plan producing the job's queries
    /// * `config` - Worker, concurrency and page ceiling settings
    pub fn new(fetcher: PagedFetcher<T>, plan: PartitionPlan, config: &CrawlerConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            plan,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            workers_per_query: config.workers_per_query.max(1),
            max_pages_per_query: config.max_pages_per_query.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops the crawl early when `token` is cancelled
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn fetcher(&self) -> &PagedFetcher<T> {
        &self.fetcher
    }

    /// Crawls the slice of the search space owned by one matrix job
    ///
    /// # Arguments
    ///
    /// * `job_index` - 0-based matrix index
    /// * `job_count` - Number of matrix jobs
    /// * `target` - Maximum repositories to keep (at least 1)
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlResult)` - Job finished; may hold fewer than `target` repositories
    /// * `Err(CensusError)` - Invalid input or authentication failure
    pub async fn crawl(
        &self,
        job_index: u64,
        job_count: u64,
        target: usize,
    ) -> Result<CrawlResult, CensusError> {
        if target == 0 {
            return Err(CensusError::InvalidInput(
                "target must be at least 1".to_string(),
            ));
        }
        let queries = self.plan.generate(job_index, job_count)?;
        info!(
            job_index,
            job_count,
            target,
            queries = queries.len(),
            "Starting crawl job"
        );

        let mut result = self.crawl_queries(&queries, target).await?;
        result.job_index = job_index;
        result.job_count = job_count;
        Ok(result)
    }

    /// Runs an explicit list of queries until `target` repositories are kept
    pub async fn crawl_queries(
        &self,
        queries: &[QueryDescriptor],
        target: usize,
    ) -> Result<CrawlResult, CensusError> {
        if target == 0 {
            return Err(CensusError::InvalidInput(
                "target must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let accumulator = Arc::new(DedupAccumulator::new(target));
        let mut reports = Vec::with_capacity(queries.len());
        let mut errors = Vec::new();

        for (i, descriptor) in queries.iter().enumerate() {
            if accumulator.is_full() {
                break;
            }
            if self.shutdown.is_cancelled() {
                warn!("Shutdown requested, stopping before query {}", i + 1);
                errors.push("crawl interrupted".to_string());
                break;
            }

            info!(
                query = %descriptor.query(),
                "Query {}/{}: {}",
                i + 1,
                queries.len(),
                descriptor.description()
            );
            let run = Arc::new(QueryRun {
                descriptor: descriptor.clone(),
                fetcher: Arc::clone(&self.fetcher),
                accumulator: Arc::clone(&accumulator),
                semaphore: Arc::clone(&self.semaphore),
                queue: WorkQueue::seeded(),
                progress: Mutex::new(QueryProgress::new()),
                max_pages: self.max_pages_per_query,
                cancel: self.shutdown.child_token(),
            });

            let mut workers = JoinSet::new();
            for _ in 0..self.workers_per_query {
                let run = Arc::clone(&run);
                workers.spawn(async move { run.work().await });
            }
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!("Fetch worker failed: {}", e);
                }
            }

            if let Some(fatal) = run.fatal_error() {
                error!(error = %fatal, "Authentication failed, aborting job");
                return Err(fatal.into());
            }

            let report = run.finish();
            info!(
                state = %report.state,
                pages = report.pages,
                added = report.added,
                total = accumulator.len(),
                "Query finished"
            );
            if let Some(message) = &report.error {
                errors.push(format!("{}: {}", report.query, message));
            }
            reports.push(report);

            if self.shutdown.is_cancelled() && !accumulator.is_full() {
                warn!("Shutdown requested during query {}", i + 1);
                errors.push("crawl interrupted".to_string());
                break;
            }
        }

        let result = CrawlResult {
            target,
            repositories: accumulator.drain(),
            total_seen: accumulator.total_seen(),
            errors,
            queries: reports,
            duration: started.elapsed(),
            ..Default::default()
        };

        if result.shortfall() > 0 {
            warn!(
                collected = result.repositories.len(),
                target,
                shortfall = result.shortfall(),
                "Collected fewer repositories than the target; the search space for this partition may be exhausted"
            );
        }
        info!(
            collected = result.repositories.len(),
            seen = result.total_seen,
            errors = result.errors.len(),
            elapsed_ms = result.duration.as_millis() as u64,
            "Crawl job finished"
        );

        Ok(result)
    }
}
