//! Paged GraphQL search fetcher
//!
//! This module handles everything between a query descriptor and a parsed
//! page:
//! - Building the search payload for one cursor
//! - Classifying HTTP statuses and GraphQL error payloads
//! - Retrying recoverable failures under the [`RateLimitGovernor`] policy
//! - Preemptive throttling when the remaining quota runs low
//!
//! # Error classification
//!
//! | Condition | Outcome |
//! |-----------|---------|
//! | HTTP 401 | Authentication (fatal for the job) |
//! | HTTP 403 with rate-limit, abuse or secondary-limit text or `Retry-After`, HTTP 429 | Rate limited, retried |
//! | Other HTTP 403, HTTP 5xx | Server error, retried with backoff |
//! | Transport failure | Network error, retried |
//! | GraphQL `FORBIDDEN` / unauthorized | Authentication |
//! | GraphQL `RATE_LIMITED` | Rate limited, retried |
//! | Other GraphQL errors alongside data | Logged, page kept |
//! | Bad JSON, missing `search`, invalid node, other status | Malformed (fatal for the query) |

use crate::crawler::governor::{RateLimitGovernor, RecoverableKind};
use crate::crawler::transport::{RawResponse, Transport};
use crate::model::Repository;
use crate::partition::QueryDescriptor;
use crate::FetchError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

const SEARCH_QUERY: &str = r#"
query SearchRepositories($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    repositoryCount
    pageInfo {
      endCursor
      hasNextPage
    }
    nodes {
      ... on Repository {
        databaseId
        name
        url
        createdAt
        stargazerCount
        forkCount
        primaryLanguage { name }
        owner { login }
        licenseInfo { name }
        pushedAt
        updatedAt
      }
    }
  }
  rateLimit {
    remaining
    resetAt
  }
}
"#;

const CONNECTION_QUERY: &str = r#"
query VerifyConnection {
  viewer { login }
  rateLimit { remaining resetAt }
}
"#;

/// One page of search results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub repositories: Vec<Repository>,

    /// Cursor for the next page
    pub end_cursor: Option<String>,

    pub has_more: bool,

    /// Remaining request quota, from the body or the response header
    pub rate_limit_remaining: Option<u32>,

    /// Total matches reported by the platform
    pub total_count: Option<u64>,
}

/// Identity and quota reported by the connection check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub login: String,
    pub rate_limit_remaining: Option<u32>,
}

// ===== GraphQL wire types =====

#[derive(Debug, Deserialize)]
struct GraphQlResponse<D> {
    data: Option<D>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    search: Option<SearchConnection>,
    rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchConnection {
    repository_count: Option<u64>,
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<Option<RepositoryNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    end_cursor: Option<String>,
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct RateLimitInfo {
    remaining: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewerData {
    viewer: Option<Viewer>,
    rate_limit: Option<RateLimitInfo>,
}

#[derive(Debug, Deserialize)]
struct Viewer {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    database_id: Option<i64>,
    name: Option<String>,
    url: Option<String>,
    created_at: Option<DateTime<Utc>>,
    stargazer_count: Option<i64>,
    fork_count: Option<i64>,
    primary_language: Option<Named>,
    owner: Option<Owner>,
    license_info: Option<Named>,
    pushed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl RepositoryNode {
    fn into_repository(self) -> Result<Repository, FetchError> {
        let mut repo = Repository::new(
            self.database_id.unwrap_or_default(),
            self.name.unwrap_or_default(),
            self.owner.map(|o| o.login).unwrap_or_default(),
            self.url.unwrap_or_default(),
            self.stargazer_count.unwrap_or_default(),
        )
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        repo.created_at = self.created_at;
        repo.primary_language = self.primary_language.map(|l| l.name);
        repo.fork_count = self.fork_count.and_then(|c| u32::try_from(c).ok());
        repo.license_name = self.license_info.map(|l| l.name);
        repo.pushed_at = self.pushed_at;
        repo.updated_at = self.updated_at;
        Ok(repo)
    }
}

// ===== Classification =====

enum Failure {
    Fatal(FetchError),
    Recoverable {
        kind: RecoverableKind,
        status: u16,
        message: String,
    },
}

impl Failure {
    fn malformed(message: impl Into<String>) -> Self {
        Self::Fatal(FetchError::MalformedResponse(message.into()))
    }

    fn rate_limited(status: u16, message: impl Into<String>) -> Self {
        Self::Recoverable {
            kind: RecoverableKind::RateLimited,
            status,
            message: message.into(),
        }
    }
}

type Parsed<R> = Result<(R, Option<u32>), Failure>;

fn mentions_rate_limit(text: &str) -> bool {
    text.to_ascii_lowercase().contains("rate limit")
}

fn is_throttled_403(raw: &RawResponse) -> bool {
    let body = raw.body.to_ascii_lowercase();
    raw.retry_after_secs.is_some()
        || body.contains("rate limit")
        || body.contains("abuse")
        || body.contains("secondary")
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

fn check_status(raw: &RawResponse) -> Result<(), Failure> {
    match raw.status {
        200..=299 => Ok(()),
        401 => Err(Failure::Fatal(FetchError::Authentication(format!(
            "HTTP 401: {}",
            snippet(&raw.body)
        )))),
        403 if is_throttled_403(raw) => {
            Err(Failure::rate_limited(403, "HTTP 403 rate limit exceeded"))
        }
        429 => Err(Failure::rate_limited(429, "HTTP 429 too many requests")),
        403 => Err(Failure::Recoverable {
            kind: RecoverableKind::ServerError,
            status: 403,
            message: format!("HTTP 403: {}", snippet(&raw.body)),
        }),
        status @ 500..=599 => Err(Failure::Recoverable {
            kind: RecoverableKind::ServerError,
            status,
            message: format!("HTTP {}", status),
        }),
        status => Err(Failure::malformed(format!(
            "unexpected HTTP status {}: {}",
            status,
            snippet(&raw.body)
        ))),
    }
}

fn check_graphql_errors(errors: &[GraphQlError], has_data: bool) -> Result<(), Failure> {
    if errors.is_empty() {
        return Ok(());
    }

    for error in errors {
        let kind = error.kind.as_deref().unwrap_or_default().to_ascii_uppercase();
        let message = error.message.to_ascii_lowercase();

        if kind == "FORBIDDEN"
            || kind == "UNAUTHORIZED"
            || message.contains("forbidden")
            || message.contains("unauthorized")
        {
            return Err(Failure::Fatal(FetchError::Authentication(
                error.message.clone(),
            )));
        }
        if kind == "RATE_LIMITED" || mentions_rate_limit(&message) {
            return Err(Failure::rate_limited(200, error.message.clone()));
        }
    }

    let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
    if has_data {
        warn!(errors = ?messages, "GraphQL errors alongside data, continuing");
        Ok(())
    } else {
        Err(Failure::malformed(format!(
            "GraphQL errors without data: {}",
            messages.join("; ")
        )))
    }
}

fn decode<D: DeserializeOwned>(raw: &RawResponse) -> Result<D, Failure> {
    check_status(raw)?;
    let envelope: GraphQlResponse<D> = serde_json::from_str(&raw.body)
        .map_err(|e| Failure::malformed(format!("invalid JSON: {}", e)))?;
    check_graphql_errors(&envelope.errors, envelope.data.is_some())?;
    envelope
        .data
        .ok_or_else(|| Failure::malformed("response has no data"))
}

fn parse_search(raw: RawResponse) -> Parsed<Page> {
    let data: SearchData = decode(&raw)?;
    let search = data
        .search
        .ok_or_else(|| Failure::malformed("response has no search field"))?;

    let repositories = search
        .nodes
        .into_iter()
        .flatten()
        .map(RepositoryNode::into_repository)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Failure::Fatal)?;

    let remaining = data
        .rate_limit
        .and_then(|r| r.remaining)
        .or(raw.rate_limit_remaining);

    let page = Page {
        repositories,
        end_cursor: search.page_info.end_cursor,
        has_more: search.page_info.has_next_page,
        rate_limit_remaining: remaining,
        total_count: search.repository_count,
    };
    Ok((page, remaining))
}

fn parse_viewer(raw: RawResponse) -> Parsed<ConnectionInfo> {
    let data: ViewerData = decode(&raw)?;
    let viewer = data
        .viewer
        .ok_or_else(|| Failure::malformed("response has no viewer field"))?;

    let remaining = data
        .rate_limit
        .and_then(|r| r.remaining)
        .or(raw.rate_limit_remaining);

    Ok((
        ConnectionInfo {
            login: viewer.login,
            rate_limit_remaining: remaining,
        },
        remaining,
    ))
}

/// Builds the GraphQL payload for one page of a search
pub fn search_payload(query: &str, cursor: Option<&str>, page_size: u32) -> Value {
    json!({
        "query": SEARCH_QUERY,
        "variables": {
            "query": query,
            "first": page_size,
            "after": cursor,
        }
    })
}

/// Fetches search pages through a [`Transport`], retrying recoverable failures
#[derive(Debug)]
pub struct PagedFetcher<T> {
    transport: T,
    governor: RateLimitGovernor,
    page_size: u32,
}

impl<T: Transport> PagedFetcher<T> {
    pub fn new(transport: T, governor: RateLimitGovernor, page_size: u32) -> Self {
        Self {
            transport,
            governor,
            page_size,
        }
    }

    pub fn governor(&self) -> &RateLimitGovernor {
        &self.governor
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetches one page of `query`, starting after `cursor`
    ///
    /// # Arguments
    ///
    /// * `query` - The query descriptor to paginate
    /// * `cursor` - Continuation cursor, `None` for the first page
    ///
    /// # Returns
    ///
    /// * `Ok(Page)` - Parsed page
    /// * `Err(FetchError)` - Fatal failure, or retries exhausted
    pub async fn fetch_page(
        &self,
        query: &QueryDescriptor,
        cursor: Option<&str>,
    ) -> Result<Page, FetchError> {
        let payload = search_payload(query.query(), cursor, self.page_size);
        let page = self.execute(&payload, parse_search).await?;

        debug!(
            query = %query.query(),
            repositories = page.repositories.len(),
            has_more = page.has_more,
            remaining = ?page.rate_limit_remaining,
            "Fetched page"
        );
        Ok(page)
    }

    /// Checks credentials with a `viewer` query
    pub async fn verify_connection(&self) -> Result<ConnectionInfo, FetchError> {
        let payload = json!({ "query": CONNECTION_QUERY });
        self.execute(&payload, parse_viewer).await
    }

    async fn execute<R>(
        &self,
        payload: &Value,
        parse: fn(RawResponse) -> Parsed<R>,
    ) -> Result<R, FetchError> {
        let mut attempt: u32 = 0;

        loop {
            let failure = match self.transport.post(payload).await {
                Ok(raw) => match parse(raw) {
                    Ok((value, remaining)) => {
                        if let Some(pause) = self.governor.on_response(remaining) {
                            debug!(
                                remaining = ?remaining,
                                pause_ms = pause.as_millis() as u64,
                                "Quota low, pausing"
                            );
                            tokio::time::sleep(pause).await;
                        }
                        return Ok(value);
                    }
                    Err(failure) => failure,
                },
                Err(e) => Failure::Recoverable {
                    kind: RecoverableKind::Network,
                    status: 0,
                    message: e.to_string(),
                },
            };

            let (kind, status, message) = match failure {
                Failure::Fatal(error) => return Err(error),
                Failure::Recoverable {
                    kind,
                    status,
                    message,
                } => (kind, status, message),
            };

            attempt += 1;
            let decision = self.governor.on_recoverable_error(kind, attempt);
            if !decision.retry {
                return Err(exhausted(kind, status, message, attempt));
            }

            warn!(
                attempt,
                delay_ms = decision.delay.as_millis() as u64,
                error = %message,
                "Recoverable failure, retrying"
            );
            sleep(decision.delay).await;
        }
    }
}

fn exhausted(kind: RecoverableKind, status: u16, message: String, attempts: u32) -> FetchError {
    match kind {
        RecoverableKind::RateLimited => FetchError::RateLimited { attempts },
        RecoverableKind::ServerError => FetchError::ServerError { status, attempts },
        RecoverableKind::Network => FetchError::Network { message, attempts },
    }
}

async fn sleep(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
