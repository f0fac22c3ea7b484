//! HTTP fetcher shared by all source adapters
//!
//! One request per call with a fixed timeout. There is no retry here:
//! a failed request fails the page it belongs to, and pacing is the
//! rate limiter's job.

use crate::utils::error::{CrawlerError, FetchError};
use reqwest::{header::HeaderMap, Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// Number of body bytes quoted in parse-error logs
const BODY_PREVIEW_LEN: usize = 200;

/// Thin wrapper over a configured reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default 30 second timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom per-request timeout
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self { client })
    }

    /// GET a URL and return the body as text
    pub async fn get_text(&self, url: &str, headers: HeaderMap) -> Result<String, FetchError> {
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        Self::read_body(response).await
    }

    /// GET a URL and deserialize the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<T, CrawlerError> {
        let body = self.get_text(url, headers).await?;
        Self::parse_json(&body)
    }

    /// POST a JSON body and deserialize the JSON response
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &B,
    ) -> Result<T, CrawlerError> {
        tracing::debug!(url = %url, "POST");
        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let text = Self::read_body(response).await?;
        Self::parse_json(&text)
    }

    async fn read_body(response: Response) -> Result<String, FetchError> {
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, CrawlerError> {
        serde_json::from_str(body).map_err(|e| {
            let preview: String = body.chars().take(BODY_PREVIEW_LEN).collect();
            tracing::debug!(error = %e, body = %preview, "Unexpected response body");
            CrawlerError::from(e)
        })
    }
}
