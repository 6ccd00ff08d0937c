//! In-process transport fakes for crawler unit tests

use crate::crawler::transport::{RawResponse, Transport, TransportError};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Key = (String, Option<String>);

/// Replays scripted responses keyed by `(search query, cursor)`
///
/// Each key holds a queue; the last response of a queue is repeated once the
/// queue is down to one entry. Unscripted keys return an empty final page.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<HashMap<Key, VecDeque<Result<RawResponse, TransportError>>>>,
    calls: AtomicUsize,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        self,
        query: &str,
        cursor: Option<&str>,
        response: Result<RawResponse, TransportError>,
    ) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry((query.to_string(), cursor.map(str::to_string)))
            .or_default()
            .push_back(response);
        self
    }

    pub fn on_page(self, query: &str, cursor: Option<&str>, body: String) -> Self {
        self.on(query, cursor, Ok(RawResponse::new(200, body)))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for ScriptedTransport {
    async fn post(&self, payload: &Value) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let variables = &payload["variables"];
        let key = (
            variables["query"].as_str().unwrap_or_default().to_string(),
            variables["after"].as_str().map(str::to_string),
        );

        let mut script = self.script.lock().unwrap();
        match script.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(RawResponse::new(200, search_body(&[], None, 5000))),
        }
    }
}

/// A repository search node
pub fn node(id: i64) -> Value {
    json!({
        "databaseId": id,
        "name": format!("repo{}", id),
        "url": format!("https://github.com/owner{}/repo{}", id % 7, id),
        "createdAt": "2021-03-04T05:06:07Z",
        "stargazerCount": id % 100,
        "forkCount": 2,
        "primaryLanguage": { "name": "Rust" },
        "owner": { "login": format!("owner{}", id % 7) },
        "licenseInfo": { "name": "MIT License" },
        "pushedAt": "2024-01-02T03:04:05Z",
        "updatedAt": "2024-01-02T03:04:05Z"
    })
}

/// A search response body; `next` is the end cursor when more pages exist
pub fn search_body(ids: &[i64], next: Option<&str>, remaining: u32) -> String {
    let nodes: Vec<Value> = ids.iter().map(|&id| node(id)).collect();
    json!({
        "data": {
            "search": {
                "repositoryCount": ids.len(),
                "pageInfo": { "endCursor": next, "hasNextPage": next.is_some() },
                "nodes": nodes
            },
            "rateLimit": { "remaining": remaining, "resetAt": "2030-01-01T00:00:00Z" }
        }
    })
    .to_string()
}
