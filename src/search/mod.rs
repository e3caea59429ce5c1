//! Auxiliary keyword search used to find seed sites
//!
//! A job with no configured sites asks a `SearchProvider` for result URLs;
//! only the URLs matter, titles and snippets are ignored.

use crate::config::SearchConfig;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

/// Errors from the auxiliary search
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search endpoint returned HTTP {0}")]
    Status(u16),

    #[error("invalid search endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Source of result URLs for a keyword query
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns result URLs in ranking order
    async fn search(&self, query: &str) -> Result<Vec<Url>, SearchError>;
}

/// DuckDuckGo's HTML (no-JavaScript) search endpoint
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: Url,
    max_results: usize,
}

impl DuckDuckGoSearch {
    /// Creates a provider for the configured endpoint
    ///
    /// # Arguments
    ///
    /// * `client` - The HTTP client to use
    /// * `config` - Endpoint and result limit
    pub fn new(client: Client, config: &SearchConfig) -> Result<Self, SearchError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|_| SearchError::InvalidEndpoint(config.endpoint.clone()))?;
        Ok(Self {
            client,
            endpoint,
            max_results: config.max_results,
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<Url>, SearchError> {
        let query = with_pdf_keyword(query);
        tracing::info!("Searching for seed sites: '{}'", query);

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("q", query.as_str()), ("kl", "us-en")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let mut results = parse_results(&body, &self.endpoint);
        results.truncate(self.max_results);

        tracing::debug!("Search returned {} result URLs", results.len());
        Ok(results)
    }
}

/// Appends "pdf" unless the query already mentions it
fn with_pdf_keyword(query: &str) -> String {
    let query = query.trim();
    if query.to_lowercase().contains("pdf") {
        query.to_string()
    } else {
        format!("{} pdf", query)
    }
}

/// Extracts result URLs from a DuckDuckGo HTML results page
///
/// Result anchors carry the class `result__a`. Their href is usually a
/// redirect (`//duckduckgo.com/l/?uddg=<encoded target>`), which is decoded
/// to the target URL. Non-HTTP(S) results are skipped.
pub fn parse_results(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.result__a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| decode_result_href(href, base))
        .collect()
}

fn decode_result_href(href: &str, base: &Url) -> Option<Url> {
    let resolved = base.join(href.trim()).ok()?;

    let target = match resolved
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned())
    {
        Some(target) => Url::parse(&target).ok()?,
        None => resolved,
    };

    match target.scheme() {
        "http" | "https" => Some(target),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn base() -> Url {
        Url::parse("https://html.duckduckgo.com/html/").unwrap()
    }

    #[test]
    fn test_decodes_redirect_links() {
        let html = r#"
            <div class="result">
              <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.atvmanuals.example%2Fhonda%2F&amp;rut=abc">Honda</a>
              <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fignored.example%2F">snippet</a>
            </div>"#;
        let results = parse_results(html, &base());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_str(), "https://www.atvmanuals.example/honda/");
    }

    #[test]
    fn test_keeps_direct_links_in_order() {
        let html = r#"
            <a class="result__a" href="https://b.example/x">B</a>
            <a class="result__a" href="https://a.example/y">A</a>
            <a class="result__a" href="javascript:void(0)">bad</a>"#;
        let results = parse_results(html, &base());
        let urls: Vec<&str> = results.iter().map(Url::as_str).collect();
        assert_eq!(urls, vec!["https://b.example/x", "https://a.example/y"]);
    }

    #[test]
    fn test_pdf_keyword_added_once() {
        assert_eq!(with_pdf_keyword("service manual"), "service manual pdf");
        assert_eq!(with_pdf_keyword("honda PDF manual"), "honda PDF manual");
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = SearchConfig {
            endpoint: "not a url".to_string(),
            max_results: 5,
        };
        assert!(matches!(
            DuckDuckGoSearch::new(Client::new(), &config),
            Err(SearchError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_search_against_mock_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "service manual pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<a class="result__a" href="/l/?uddg=https%3A%2F%2Fone.example%2Fa">1</a>
                   <a class="result__a" href="/l/?uddg=https%3A%2F%2Ftwo.example%2Fb">2</a>
                   <a class="result__a" href="/l/?uddg=https%3A%2F%2Fthree.example%2Fc">3</a>"#,
                "text/html",
            ))
            .mount(&server)
            .await;

        let config = SearchConfig {
            endpoint: format!("{}/html/", server.uri()),
            max_results: 2,
        };
        let search = DuckDuckGoSearch::new(Client::new(), &config).unwrap();
        let results = search.search("service manual").await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_str(), "https://one.example/a");
        assert_eq!(results[1].as_str(), "https://two.example/b");
    }

    #[tokio::test]
    async fn test_search_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = SearchConfig {
            endpoint: format!("{}/html/", server.uri()),
            max_results: 10,
        };
        let search = DuckDuckGoSearch::new(Client::new(), &config).unwrap();
        assert!(matches!(
            search.search("atv").await,
            Err(SearchError::Status(503))
        ));
    }
}
