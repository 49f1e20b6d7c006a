//! Shared HTTP client for hoster extraction
//!
//! Features:
//! - One connection pool shared by every concurrent extraction task
//! - HTTP/2 multiplexing when the hoster negotiates it
//! - Brotli, Gzip compression (auto-negotiated)
//! - Per-request connect and total timeouts
//! - Cookie store (some embed pages set a session cookie before the manifest)
//!
//! Non-2xx responses become [`ExtractError::Status`] so callers never have
//! to inspect status codes themselves.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::config::HttpConfig;
use crate::error::ExtractError;

/// Extra request headers as `(name, value)` pairs.
pub type HeaderPairs<'a> = &'a [(&'a str, &'a str)];

/// HTTP client shared by every extractor. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HosterClient {
    client: Client,
}

impl HosterClient {
    /// Create a client with default settings
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client from explicit settings
    pub fn with_config(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            // ═══════════════════════════════════════════════════════════════
            // CONNECTION REUSE
            // ═══════════════════════════════════════════════════════════════
            // Many candidates share a CDN host; keep connections around
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .http2_adaptive_window(true)
            .use_rustls_tls()
            // ═══════════════════════════════════════════════════════════════
            // COMPRESSION
            // ═══════════════════════════════════════════════════════════════
            .brotli(true)
            .gzip(true)
            .deflate(true)
            // ═══════════════════════════════════════════════════════════════
            // IDENTITY
            // ═══════════════════════════════════════════════════════════════
            // Hosters serve empty pages to non-browser agents
            .user_agent(config.user_agent.as_str())
            // ═══════════════════════════════════════════════════════════════
            // TIMEOUTS
            // ═══════════════════════════════════════════════════════════════
            // A hung hoster fails through these, never through a pipeline deadline
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            // ═══════════════════════════════════════════════════════════════
            // REDIRECTS & COOKIES
            // ═══════════════════════════════════════════════════════════════
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    /// GET `url` with extra headers; non-2xx is an error
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get(&self, url: &str, headers: HeaderPairs<'_>) -> Result<Response, ExtractError> {
        debug!("Fetching");
        let response = apply(self.client.get(url), headers).send().await?;

        let status = response.status();
        debug!(status = %status, version = ?response.version(), "Response received");

        if !status.is_success() {
            return Err(ExtractError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Fetch and return body as string
    pub async fn get_text(&self, url: &str, headers: HeaderPairs<'_>) -> Result<String, ExtractError> {
        let response = self.get(url, headers).await?;
        Ok(response.text().await?)
    }

    /// Fetch and return body as string plus the final URL after redirects
    pub async fn get_text_with_url(
        &self,
        url: &str,
        headers: HeaderPairs<'_>,
    ) -> Result<(String, String), ExtractError> {
        let response = self.get(url, headers).await?;
        let final_url = response.url().to_string();
        Ok((response.text().await?, final_url))
    }

    /// Fetch and parse a JSON body; parse failures are `MalformedBody`
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderPairs<'_>,
    ) -> Result<T, ExtractError> {
        let response = self.get(url, headers).await?;
        response.json().await.map_err(|e| {
            if e.is_decode() {
                ExtractError::malformed(url, e.to_string())
            } else {
                ExtractError::Transport(e)
            }
        })
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

fn apply(mut request: RequestBuilder, headers: HeaderPairs<'_>) -> RequestBuilder {
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_custom_config() {
        let config = HttpConfig {
            timeout_secs: 1,
            connect_timeout_secs: 1,
            user_agent: "hosterkit-test".to_string(),
        };
        assert!(HosterClient::with_config(&config).is_ok());
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let client = HosterClient::new().unwrap();
        // Port 9 (discard) is closed on any sane test host
        let err = client.get("http://127.0.0.1:9/", &[]).await.unwrap_err();
        assert!(matches!(err, ExtractError::Transport(_)));
    }
}
