//! Shared helpers for the integration tests

#![allow(dead_code)]

use manual_scout::config::Config;
use manual_scout::queue::SystemClock;
use manual_scout::storage::{shared, SharedStorage, SqliteStorage};
use manual_scout::{InMemoryLiveness, JobQueue, JobSpec};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Builds a configuration; `extra` is appended to the TOML verbatim
pub fn test_config(database_path: &str, extra: &str) -> Config {
    let text = format!(
        r#"
        [user-agent]
        crawler-name = "TestScout"
        crawler-version = "1.0.0"
        contact-url = "https://example.com/contact"
        contact-email = "test@example.com"

        [output]
        database-path = "{}"

        {}
        "#,
        database_path, extra
    );
    toml::from_str(&text).expect("test config should parse")
}

pub fn memory_storage() -> SharedStorage {
    shared(SqliteStorage::new_in_memory().expect("in-memory database"))
}

/// A queue over in-memory storage with a process-local liveness registry
pub fn memory_queue(config: &Config) -> JobQueue {
    JobQueue::new(
        config,
        memory_storage(),
        Arc::new(InMemoryLiveness::new()),
        Arc::new(SystemClock),
    )
    .expect("queue should build")
}

/// A job crawling the given sites with no exclusion terms
pub fn job(name: &str, sites: &[String]) -> JobSpec {
    let mut spec = JobSpec::new(name);
    spec.sites = sites.to_vec();
    spec
}

/// Serves `body` as an HTML page at `page_path`
pub async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Serves an HTML page that answers only after `delay`
pub async fn mount_slow_page(server: &MockServer, page_path: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html; charset=utf-8")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Wraps anchors in a minimal HTML document
pub fn html_page(title: &str, links: &[(&str, &str)]) -> String {
    let anchors: String = links
        .iter()
        .map(|(href, text)| format!("<li><a href=\"{}\">{}</a></li>\n", href, text))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><ul>\n{}</ul></body></html>",
        title, anchors
    )
}

/// The domain (host:port) a mock server is reachable at
pub fn server_domain(server: &MockServer) -> String {
    let url = url::Url::parse(&server.uri()).expect("mock server uri");
    manual_scout::extract_domain(&url).expect("mock server domain")
}
