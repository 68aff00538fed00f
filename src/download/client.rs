//! HTTP client wrapper for segment and manifest requests.
//!
//! This module provides the `HttpClient` struct which performs a single GET
//! with a fixed timeout and User-Agent, buffering the whole body in memory.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::constants::REQUEST_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for fetching segments and manifests.
///
/// Designed to be created once and cloned into every fetch, taking advantage
/// of connection pooling.
///
/// # Example
///
/// ```no_run
/// use segment_downloader::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let bytes = client.get_bytes("https://cdn.example/seg-1.ts").await?;
/// println!("fetched {} bytes", bytes.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with the default 30 second timeout.
    ///
    /// # Panics
    ///
    /// Same as [`with_timeout`](Self::with_timeout).
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with an explicit per-request timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent::default_segment_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Fetches `url` and returns the fully buffered body.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the URL is invalid, the request fails or
    /// times out, the server answers with a non-2xx status, or the body
    /// cannot be read to the end.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, DownloadError> {
        let response = self.send_get(url).await?;
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::body(url, e)
            }
        })?;
        debug!(bytes = body.len(), "body received");
        Ok(body)
    }

    /// Fetches `url` and returns the body decoded as text.
    ///
    /// # Errors
    ///
    /// Same as [`get_bytes`](Self::get_bytes).
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.send_get(url).await?;
        response.text().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::body(url, e)
            }
        })
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
