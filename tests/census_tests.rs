//! Integration tests for a full census job
//!
//! These tests use wiremock to create a mock GraphQL endpoint and run
//! `run_census` end-to-end into a temporary SQLite database.

use forge_census::config::{parse_config, Config};
use forge_census::crawler::{run_census, JobSpec};
use forge_census::storage::{RunStatus, SqliteStorage, Storage};
use forge_census::CensusError;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_ENV: &str = "FORGE_CENSUS_IT_TOKEN";

/// Creates a config pointing at the mock server with a two-language partition
fn create_test_config(server: &MockServer, dir: &TempDir, target: usize) -> Config {
    std::env::set_var(TOKEN_ENV, "integration-token");

    let toml = format!(
        r#"
[crawler]
target-repos = {target}
max-pages-per-query = 10
workers-per-query = 1
max-concurrent-requests = 2

[github]
api-url = "{uri}/graphql"
token-env = "{token_env}"
user-agent = "forge-census-tests/1.0"
request-timeout-secs = 5

[rate-limit]
low-water-mark = 0
rate-limit-pause-secs = 0
max-server-retries = 1
backoff-base-ms = 1
backoff-max-ms = 2

[output]
database-path = "{db}"
json-path = "{json}"

[partition]
fallbacks = false

[[partition.dimensions]]
kind = "terms"
name = "language"
qualifier = "language"
values = ["rust", "go"]
"#,
        target = target,
        uri = server.uri(),
        token_env = TOKEN_ENV,
        db = dir.path().join("census.db").display(),
        json = dir.path().join("repos.json").display(),
    );
    parse_config(&toml).unwrap()
}

fn search_page(ids: &[i64], next: Option<&str>) -> serde_json::Value {
    let nodes: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "databaseId": id,
                "name": format!("crate{}", id),
                "url": format!("https://github.com/dev{}/crate{}", id % 3, id),
                "stargazerCount": id * 10,
                "primaryLanguage": { "name": "Rust" },
                "owner": { "login": format!("dev{}", id % 3) }
            })
        })
        .collect();

    json!({
        "data": {
            "search": {
                "repositoryCount": 5,
                "pageInfo": { "endCursor": next, "hasNextPage": next.is_some() },
                "nodes": nodes
            },
            "rateLimit": { "remaining": 4000 }
        }
    })
}

async fn mount_viewer(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("VerifyConnection"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "login": "census-bot" }, "rateLimit": { "remaining": 5000 } }
        })))
        .mount(server)
        .await;
}

async fn mount_two_pages(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("language:rust"))
        .and(body_string_contains(r#""after":null"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&[1, 2, 3], Some("c1"))))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("language:rust"))
        .and(body_string_contains(r#""after":"c1""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&[3, 4, 5], None)))
        .mount(server)
        .await;
}

fn job(target: usize) -> JobSpec {
    JobSpec {
        index: 0,
        total: 2,
        target,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_census_job() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_viewer(&server).await;
    mount_two_pages(&server).await;

    let config = create_test_config(&server, &dir, 100);
    let outcome = run_census(&config, "hash-1", job(100), CancellationToken::new())
        .await
        .unwrap();

    // Id 3 appears on both pages
    let ids: Vec<i64> = outcome.result.repositories.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert_eq!(outcome.result.shortfall(), 95);

    let storage = SqliteStorage::new(&dir.path().join("census.db")).unwrap();
    assert_eq!(storage.count_repositories().unwrap(), 5);
    assert_eq!(storage.total_stars().unwrap(), 150);

    let run = storage.get_run(outcome.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.collected, Some(5));
    assert_eq!(run.config_hash, "hash-1");

    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("repos.json")).unwrap())
            .unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_census_stops_at_target() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_viewer(&server).await;
    mount_two_pages(&server).await;

    let config = create_test_config(&server, &dir, 2);
    let outcome = run_census(&config, "hash", job(2), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.result.repositories.len(), 2);

    // The second page is never requested
    let requests = server.received_requests().await.unwrap();
    assert!(requests
        .iter()
        .all(|r| !String::from_utf8_lossy(&r.body).contains(r#""after":"c1""#)));

    let storage = SqliteStorage::new(&dir.path().join("census.db")).unwrap();
    assert_eq!(storage.count_repositories().unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_viewer(&server).await;
    mount_two_pages(&server).await;

    let config = create_test_config(&server, &dir, 100);
    run_census(&config, "hash", job(100), CancellationToken::new())
        .await
        .unwrap();
    run_census(&config, "hash", job(100), CancellationToken::new())
        .await
        .unwrap();

    let storage = SqliteStorage::new(&dir.path().join("census.db")).unwrap();
    assert_eq!(storage.count_runs().unwrap(), 2);
    assert_eq!(storage.count_repositories().unwrap(), 5);
    assert_eq!(storage.total_stars().unwrap(), 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_server_errors_are_recorded_not_fatal() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_viewer(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains("language:rust"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, 10);
    let outcome = run_census(&config, "hash", job(10), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.result.repositories.is_empty());
    assert_eq!(outcome.result.errors.len(), 1);

    let storage = SqliteStorage::new(&dir.path().join("census.db")).unwrap();
    let states = storage.count_queries_by_state().unwrap();
    assert_eq!(states, vec![("errored".to_string(), 1)]);
    assert_eq!(
        storage.get_run(outcome.run_id).unwrap().status,
        RunStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_revoked_token_aborts_job() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_viewer(&server).await;
    Mock::given(method("POST"))
        .and(body_string_contains("language:rust"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir, 10);
    let err = run_census(&config, "hash", job(10), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CensusError::Authentication(_)));

    let storage = SqliteStorage::new(&dir.path().join("census.db")).unwrap();
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(storage.count_repositories().unwrap(), 0);
}
