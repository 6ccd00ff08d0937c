use serde::Deserialize;

/// Main configuration structure for Forge-Census
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub github: GithubConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    pub output: OutputConfig,
    /// Overrides the built-in partition plan when present
    #[serde(default)]
    pub partition: Option<PartitionConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of unique repositories each job tries to collect
    #[serde(rename = "target-repos")]
    pub target_repos: usize,

    /// Safety ceiling on pages fetched for a single query
    #[serde(rename = "max-pages-per-query")]
    pub max_pages_per_query: u32,

    /// Fetch workers pulling cursors for one query
    #[serde(rename = "workers-per-query")]
    pub workers_per_query: usize,

    /// Maximum number of page fetches in flight across the whole job
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: usize,

    /// Results requested per page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    100
}

/// GraphQL endpoint and identity configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// GraphQL endpoint URL
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Name of the environment variable holding the API token
    #[serde(rename = "token-env", default = "default_token_env")]
    pub token_env: String,

    /// User agent sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Retry and throttling policy
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    /// Remaining quota below which every response is followed by a short pause
    pub low_water_mark: u32,

    /// Length of the preemptive pause (milliseconds)
    pub preemptive_pause_ms: u64,

    /// Pause after a rate-limit signal (seconds)
    pub rate_limit_pause_secs: u64,

    /// Retries granted after rate-limit signals
    pub max_rate_limit_retries: u32,

    /// Retries granted after server or network errors
    pub max_server_retries: u32,

    /// First exponential backoff delay (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    pub backoff_max_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            low_water_mark: 10,
            preemptive_pause_ms: 500,
            rate_limit_pause_secs: 60,
            max_rate_limit_retries: 3,
            max_server_retries: 5,
            backoff_base_ms: 1000,
            backoff_max_ms: 60_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// CSV export written after each crawl
    #[serde(rename = "csv-path", default)]
    pub csv_path: Option<String>,

    /// JSON export written after each crawl
    #[serde(rename = "json-path", default)]
    pub json_path: Option<String>,
}

/// Partition plan override
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionConfig {
    /// Qualifiers prepended to every query (e.g. `is:public`)
    #[serde(default = "default_base_qualifiers")]
    pub base_qualifiers: Vec<String>,

    /// Primary sort key
    #[serde(default = "default_sort")]
    pub sort: String,

    /// Sort key used by the first fallback query
    #[serde(default = "default_alternate_sort")]
    pub alternate_sort: String,

    /// Whether fallback queries are appended in multi-job mode
    #[serde(default = "default_fallbacks")]
    pub fallbacks: bool,

    /// Star cut points for single-job mode
    #[serde(default)]
    pub single_job_star_cut_points: Option<Vec<u64>>,

    /// Ordered partition dimensions
    pub dimensions: Vec<DimensionConfig>,
}

fn default_base_qualifiers() -> Vec<String> {
    vec!["is:public".to_string()]
}

fn default_sort() -> String {
    "updated".to_string()
}

fn default_alternate_sort() -> String {
    "stars".to_string()
}

fn default_fallbacks() -> bool {
    true
}

/// One partition dimension, described as data
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DimensionConfig {
    /// Discrete qualifier values such as languages or licenses
    Terms {
        name: String,
        qualifier: String,
        values: Vec<String>,
    },

    /// Integer ranges built from ascending cut points
    IntRange {
        name: String,
        qualifier: String,
        #[serde(rename = "cut-points")]
        cut_points: Vec<u64>,
    },

    /// Date ranges built from ascending `YYYY-MM-DD` cut points
    DateRange {
        name: String,
        qualifier: String,
        #[serde(rename = "cut-points")]
        cut_points: Vec<String>,
    },
}

impl DimensionConfig {
    /// Returns the dimension name
    pub fn name(&self) -> &str {
        match self {
            Self::Terms { name, .. } | Self::IntRange { name, .. } | Self::DateRange { name, .. } => {
                name
            }
        }
    }
}
