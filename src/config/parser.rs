use crate::config::types::{Config, GithubConfig};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use forge_census::config::load_config;
///
/// let config = load_config(Path::new("census.toml")).unwrap();
/// println!("Target per job: {}", config.crawler.target_repos);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is stored with every run so jobs crawled with different
/// settings can be told apart.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Reads the API token from the environment variable named in the config
pub fn resolve_token(github: &GithubConfig) -> Result<String, ConfigError> {
    match std::env::var(&github.token_env) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(ConfigError::MissingToken(github.token_env.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DimensionConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASE_CONFIG: &str = r#"
[crawler]
target-repos = 500
max-pages-per-query = 10
workers-per-query = 4
max-concurrent-requests = 10

[github]
api-url = "https://api.github.com/graphql"
user-agent = "forge-census/1.0"

[output]
database-path = "./census.db"
"#;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = create_temp_config(BASE_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.target_repos, 500);
        assert_eq!(config.crawler.page_size, 100);
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.github.request_timeout_secs, 30);
        assert_eq!(config.rate_limit.low_water_mark, 10);
        assert_eq!(config.rate_limit.rate_limit_pause_secs, 60);
        assert!(config.partition.is_none());
        assert!(config.output.csv_path.is_none());
    }

    #[test]
    fn test_load_partition_override() {
        let content = format!(
            "{}{}",
            BASE_CONFIG,
            r#"
[rate-limit]
low-water-mark = 50
backoff-base-ms = 10

[partition]
fallbacks = false

[[partition.dimensions]]
name = "stars"
kind = "int-range"
qualifier = "stars"
cut-points = [0, 10, 100]

[[partition.dimensions]]
name = "language"
kind = "terms"
qualifier = "language"
values = ["rust", "go"]

[[partition.dimensions]]
name = "created"
kind = "date-range"
qualifier = "created"
cut-points = ["2020-01-01", "2023-01-01"]
"#
        );

        let config = parse_config(&content).unwrap();
        assert_eq!(config.rate_limit.low_water_mark, 50);
        assert_eq!(config.rate_limit.backoff_base_ms, 10);
        // Unspecified keys keep their defaults
        assert_eq!(config.rate_limit.max_server_retries, 5);

        let partition = config.partition.unwrap();
        assert!(!partition.fallbacks);
        assert_eq!(partition.sort, "updated");
        assert_eq!(partition.base_qualifiers, vec!["is:public".to_string()]);
        assert_eq!(partition.dimensions.len(), 3);
        assert!(matches!(
            &partition.dimensions[0],
            DimensionConfig::IntRange { cut_points, .. } if cut_points == &vec![0, 10, 100]
        ));
        assert_eq!(partition.dimensions[1].name(), "language");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/census.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = BASE_CONFIG.replace("target-repos = 500", "target-repos = 0");
        let result = parse_config(&content);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }

    #[test]
    fn test_resolve_token_missing() {
        let github = GithubConfig {
            api_url: "https://api.github.com/graphql".to_string(),
            token_env: "FORGE_CENSUS_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
            user_agent: "test".to_string(),
            request_timeout_secs: 30,
        };

        let result = resolve_token(&github);
        assert!(matches!(result, Err(ConfigError::MissingToken(name)) if name.ends_with("NEVER_SET")));
    }
}
