use crate::config::types::{
    Config, CrawlerConfig, DimensionConfig, GithubConfig, OutputConfig, PartitionConfig,
    RateLimitConfig,
};
use crate::ConfigError;
use chrono::NaiveDate;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_github_config(&config.github)?;
    validate_rate_limit_config(&config.rate_limit)?;
    validate_output_config(&config.output)?;
    if let Some(partition) = &config.partition {
        validate_partition_config(partition)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.target_repos < 1 {
        return Err(ConfigError::Validation(
            "target_repos must be >= 1".to_string(),
        ));
    }

    if config.max_pages_per_query < 1 {
        return Err(ConfigError::Validation(
            "max_pages_per_query must be >= 1".to_string(),
        ));
    }

    if config.workers_per_query < 1 || config.workers_per_query > 64 {
        return Err(ConfigError::Validation(format!(
            "workers_per_query must be between 1 and 64, got {}",
            config.workers_per_query
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    Ok(())
}

/// Validates endpoint configuration
fn validate_github_config(config: &GithubConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.token_env.is_empty() {
        return Err(ConfigError::Validation(
            "token_env cannot be empty".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates retry policy
fn validate_rate_limit_config(config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) cannot exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    for (name, path) in [("csv_path", &config.csv_path), ("json_path", &config.json_path)] {
        if matches!(path, Some(p) if p.is_empty()) {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

/// Validates a partition plan override
fn validate_partition_config(config: &PartitionConfig) -> Result<(), ConfigError> {
    if config.dimensions.is_empty() {
        return Err(ConfigError::Validation(
            "partition must declare at least one dimension".to_string(),
        ));
    }

    if config.sort.trim().is_empty() || config.alternate_sort.trim().is_empty() {
        return Err(ConfigError::Validation(
            "partition sort keys cannot be empty".to_string(),
        ));
    }

    if let Some(cut_points) = &config.single_job_star_cut_points {
        validate_ascending("single_job_star_cut_points", cut_points)?;
    }

    let mut names = HashSet::new();
    for dimension in &config.dimensions {
        if !names.insert(dimension.name()) {
            return Err(ConfigError::Validation(format!(
                "duplicate dimension name '{}'",
                dimension.name()
            )));
        }
        validate_dimension(dimension)?;
    }

    Ok(())
}

/// Validates a single dimension
fn validate_dimension(dimension: &DimensionConfig) -> Result<(), ConfigError> {
    match dimension {
        DimensionConfig::Terms {
            name,
            qualifier,
            values,
        } => {
            validate_qualifier(name, qualifier)?;
            if values.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "dimension '{}' has no values",
                    name
                )));
            }
            if values.iter().any(|v| v.trim().is_empty() || v.contains(' ')) {
                return Err(ConfigError::Validation(format!(
                    "dimension '{}' contains an empty or whitespace value",
                    name
                )));
            }
            let unique: HashSet<_> = values.iter().collect();
            if unique.len() != values.len() {
                return Err(ConfigError::Validation(format!(
                    "dimension '{}' repeats a value",
                    name
                )));
            }
        }
        DimensionConfig::IntRange {
            name,
            qualifier,
            cut_points,
        } => {
            validate_qualifier(name, qualifier)?;
            validate_ascending(name, cut_points)?;
        }
        DimensionConfig::DateRange {
            name,
            qualifier,
            cut_points,
        } => {
            validate_qualifier(name, qualifier)?;
            let dates = cut_points
                .iter()
                .map(|s| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
                        ConfigError::Validation(format!(
                            "dimension '{}' has invalid date '{}': {}",
                            name, s, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            validate_ascending(name, &dates)?;
        }
    }

    Ok(())
}

fn validate_qualifier(name: &str, qualifier: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dimension name cannot be empty".to_string(),
        ));
    }

    if qualifier.is_empty() || !qualifier.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "dimension '{}' has invalid qualifier '{}'",
            name, qualifier
        )));
    }

    Ok(())
}

/// Cut points must be non-empty and strictly ascending
fn validate_ascending<T: PartialOrd>(name: &str, cut_points: &[T]) -> Result<(), ConfigError> {
    if cut_points.is_empty() {
        return Err(ConfigError::Validation(format!(
            "dimension '{}' has no cut points",
            name
        )));
    }

    if cut_points.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ConfigError::Validation(format!(
            "cut points of '{}' must be strictly ascending",
            name
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_dimension(cut_points: Vec<u64>) -> DimensionConfig {
        DimensionConfig::IntRange {
            name: "stars".to_string(),
            qualifier: "stars".to_string(),
            cut_points,
        }
    }

    #[test]
    fn test_validate_ascending() {
        assert!(validate_ascending("x", &[0u64, 1, 5]).is_ok());
        assert!(validate_ascending::<u64>("x", &[]).is_err());
        assert!(validate_ascending("x", &[0u64, 5, 5]).is_err());
        assert!(validate_ascending("x", &[3u64, 1]).is_err());
    }

    #[test]
    fn test_validate_dimension() {
        assert!(validate_dimension(&int_dimension(vec![0, 10])).is_ok());
        assert!(validate_dimension(&int_dimension(vec![10, 0])).is_err());

        let dates = DimensionConfig::DateRange {
            name: "created".to_string(),
            qualifier: "created".to_string(),
            cut_points: vec!["2020-01-01".to_string(), "2019-13-01".to_string()],
        };
        assert!(validate_dimension(&dates).is_err());

        let terms = DimensionConfig::Terms {
            name: "language".to_string(),
            qualifier: "language".to_string(),
            values: vec!["rust".to_string(), "rust".to_string()],
        };
        assert!(validate_dimension(&terms).is_err());

        let bad_qualifier = DimensionConfig::Terms {
            name: "language".to_string(),
            qualifier: "lang uage".to_string(),
            values: vec!["rust".to_string()],
        };
        assert!(validate_dimension(&bad_qualifier).is_err());
    }

    #[test]
    fn test_validate_partition_duplicate_names() {
        let config = PartitionConfig {
            base_qualifiers: vec!["is:public".to_string()],
            sort: "updated".to_string(),
            alternate_sort: "stars".to_string(),
            fallbacks: true,
            single_job_star_cut_points: None,
            dimensions: vec![int_dimension(vec![0, 1]), int_dimension(vec![0, 2])],
        };

        assert!(matches!(
            validate_partition_config(&config),
            Err(ConfigError::Validation(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_validate_github_config() {
        let mut github = GithubConfig {
            api_url: "https://api.github.com/graphql".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: "forge-census/1.0".to_string(),
            request_timeout_secs: 30,
        };
        assert!(validate_github_config(&github).is_ok());

        github.api_url = "not a url".to_string();
        assert!(matches!(
            validate_github_config(&github),
            Err(ConfigError::InvalidUrl(_))
        ));

        github.api_url = "ftp://example.com/graphql".to_string();
        assert!(validate_github_config(&github).is_err());
    }

    #[test]
    fn test_validate_rate_limit_config() {
        let mut config = RateLimitConfig::default();
        assert!(validate_rate_limit_config(&config).is_ok());

        config.backoff_base_ms = config.backoff_max_ms + 1;
        assert!(validate_rate_limit_config(&config).is_err());
    }
}
