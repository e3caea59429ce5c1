use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Reads the declared size of a remote file
#[async_trait]
pub trait SizeProbe: Send + Sync {
    /// Returns the size in megabytes, or None when it cannot be determined
    async fn size_mb(&self, url: &Url) -> Option<f64>;
}

/// Size probe issuing a HEAD request and reading `Content-Length`
///
/// Any failure (timeout, non-2xx, missing or malformed header) yields
/// `None` so the candidate passes through the size rule.
#[derive(Debug, Clone)]
pub struct HttpSizeProbe {
    client: Client,
    timeout: Duration,
}

impl HttpSizeProbe {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl SizeProbe for HttpSizeProbe {
    async fn size_mb(&self, url: &Url) -> Option<f64> {
        let response = match self
            .client
            .head(url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Size probe failed for {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(
                "Size probe for {} returned HTTP {}",
                url,
                response.status().as_u16()
            );
            return None;
        }

        let bytes = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())?;

        Some(bytes as f64 / BYTES_PER_MB)
    }
}

/// Probe that never knows the size; every candidate passes the size rule
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSizeProbe;

#[async_trait]
impl SizeProbe for NoSizeProbe {
    async fn size_mb(&self, _url: &Url) -> Option<f64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn probe() -> HttpSizeProbe {
        HttpSizeProbe::new(Client::new(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_reads_content_length() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/big.pdf"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2 * 1024 * 1024]))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/big.pdf", server.uri())).unwrap();
        let size = probe().size_mb(&url).await;
        assert_eq!(size, Some(2.0));
    }

    #[tokio::test]
    async fn test_error_status_is_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/a.pdf", server.uri())).unwrap();
        assert_eq!(probe().size_mb(&url).await, None);
    }

    #[tokio::test]
    async fn test_unreachable_is_unknown() {
        let url = Url::parse("http://127.0.0.1:1/a.pdf").unwrap();
        assert_eq!(probe().size_mb(&url).await, None);
    }
}
