//! Fetcher seam for the content loader.
//!
//! Logical resource name `X` maps to `{base}/content/X.json` on the static
//! store. The loader only sees the [`ContentFetcher`] trait, so tests swap
//! in scripted fetchers.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ContentError {
    #[error("content store returned HTTP {status}")]
    Http { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Fetches the raw bytes of a named resource. Implementations must be
/// thread-safe.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError>;
}

/// reqwest-backed fetcher against the static content store.
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpContentFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ContentError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ContentError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/content/{}.json", self.base_url, name)
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError> {
        let response = self
            .client
            .get(self.url_for(name))
            .send()
            .await
            .map_err(|e| ContentError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Http {
                status: status.as_u16(),
            });
        }
        response
            .bytes()
            .await
            .map_err(|e| ContentError::Transport(e.to_string()))
    }
}
