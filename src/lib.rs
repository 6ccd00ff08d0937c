//! Forge-Census: partitioned repository discovery for code-forge search APIs
//!
//! This crate splits the public repository search space into disjoint query
//! partitions, one slice per matrix job, paginates each query with bounded
//! concurrency, deduplicates results across concurrent workers and persists
//! the final batch into SQLite.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod partition;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Forge-Census operations
#[derive(Debug, Error)]
pub enum CensusError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Connection check failed: {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Environment variable {0} is not set or empty")]
    MissingToken(String),
}

/// Errors raised while turning a job coordinate into search queries
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Invalid job {index} of {count}: index must be below a count of at least 1")]
    InvalidJob { index: u64, count: u64 },

    #[error("Query string cannot be empty")]
    EmptyQuery,

    #[error("Dimension '{0}' has no buckets")]
    EmptyDimension(String),

    #[error("Cut points of dimension '{0}' must be strictly ascending")]
    UnorderedBoundaries(String),

    #[error("Dimension '{name}' has an unparsable boundary '{value}'")]
    InvalidBoundary { name: String, value: String },
}

/// Outcome of a page fetch that could not produce a page
///
/// Recoverable conditions only surface here once the retry policy has given
/// up on them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited; gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("HTTP {status} persisted; gave up after {attempts} attempts")]
    ServerError { status: u16, attempts: u32 },

    #[error("Network error after {attempts} attempts: {message}")]
    Network { message: String, attempts: u32 },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Returns true if this error must abort the whole job
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Returns true if the error was recoverable and retries ran out
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::ServerError { .. } | Self::Network { .. }
        )
    }
}

impl From<FetchError> for CensusError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Authentication(message) => Self::Authentication(message),
            other => Self::Connection(other.to_string()),
        }
    }
}

/// Result type alias for Forge-Census operations
pub type Result<T> = std::result::Result<T, CensusError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for partitioning operations
pub type PartitionResult<T> = std::result::Result<T, PartitionError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlCoordinator, DedupAccumulator, PagedFetcher, RateLimitGovernor};
pub use model::{CrawlResult, Repository};
pub use partition::{PartitionPlan, QueryDescriptor};
pub use state::QueryState;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authentication_is_fatal() {
        assert!(FetchError::Authentication("bad credentials".to_string()).is_fatal());
        assert!(!FetchError::RateLimited { attempts: 3 }.is_fatal());
        assert!(!FetchError::ServerError {
            status: 503,
            attempts: 5
        }
        .is_fatal());
        assert!(!FetchError::MalformedResponse("truncated".to_string()).is_fatal());
    }

    #[test]
    fn test_retries_exhausted_classification() {
        assert!(FetchError::Network {
            message: "timeout".to_string(),
            attempts: 5
        }
        .is_retries_exhausted());
        assert!(!FetchError::MalformedResponse("x".to_string()).is_retries_exhausted());
        assert!(!FetchError::Authentication("x".to_string()).is_retries_exhausted());
    }

    #[test]
    fn test_fetch_error_conversion_keeps_single_prefix() {
        let err: CensusError = FetchError::Authentication("HTTP 401: Bad credentials".to_string()).into();
        assert_eq!(err.to_string(), "Authentication failed: HTTP 401: Bad credentials");

        let err: CensusError = FetchError::RateLimited { attempts: 4 }.into();
        assert!(matches!(err, CensusError::Connection(_)));
    }
}
