use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::HttpConfig;
use crate::error::{ExtractError, Result};
use crate::source::HtmlDocument;

/// Fetches static pages and parses them into [`HtmlDocument`]s.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ExtractError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// GET `url` and parse the body. Connection failures and non-success
    /// statuses are reported as `SourceUnavailable`.
    pub async fn fetch(&self, url: &str) -> Result<HtmlDocument> {
        let parsed = Url::parse(url).map_err(|e| ExtractError::unavailable(url, format!("invalid URL: {}", e)))?;

        info!("HTTP GET request to: {}", url);
        let response = self
            .client
            .get(parsed.clone())
            .send()
            .await
            .map_err(|e| ExtractError::unavailable(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractError::unavailable(url, format!("request failed with status: {}", status)));
        }

        // Redirects change what relative links resolve against
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| ExtractError::unavailable(url, e))?;
        debug!("HTTP response: status={}, size={} bytes", status, body.len());

        Ok(HtmlDocument::parse(&body).with_base_url(final_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connection_refused_is_source_unavailable() {
        let fetcher = HttpFetcher::new(&HttpConfig {
            timeout_seconds: 2,
            ..HttpConfig::default()
        })
        .unwrap();

        let err = fetcher.fetch("http://127.0.0.1:9/roster").await.err().unwrap();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_url_is_source_unavailable() {
        let fetcher = HttpFetcher::new(&HttpConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.err().unwrap();
        assert!(matches!(err, ExtractError::SourceUnavailable { .. }));
    }
}
