//! Transports that retrieve chunk artifacts for the cache.
//!
//! The cache only knows the [`ChunkFetcher`] trait. A fetcher turns a
//! templated path into bytes, or into a [`FetchError`]. Timeouts and retries
//! belong to the transport, never to the cache.

use async_trait::async_trait;
use log::trace;
use std::path::PathBuf;

use super::format::partition::ChunkKey;
use super::types::error::FetchError;

/// Substitutes `{locale}` and `{key}` into a fetch path template.
pub fn chunk_path(template: &str, locale: &str, key: ChunkKey) -> String {
    template.replace("{locale}", locale).replace("{key}", key.as_str())
}

/// Retrieves the raw bytes of one chunk artifact.
#[async_trait]
pub trait ChunkFetcher: Send + Sync + 'static {
    /// Fetches the artifact at `path`. `key` is carried for error context.
    async fn fetch(&self, key: ChunkKey, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads chunk artifacts from a local directory.
///
/// The fetch path is taken relative to `root`, so the default template
/// `/data/chunks/{locale}/entries-{key}.json` with root `site/` reads
/// `site/data/chunks/...`.
#[derive(Debug, Clone)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ChunkFetcher for DirFetcher {
    async fn fetch(&self, key: ChunkKey, path: &str) -> Result<Vec<u8>, FetchError> {
        let file = self.root.join(path.trim_start_matches('/'));
        trace!("Reading chunk '{}' from {}", key, file.display());
        tokio::fs::read(&file).await.map_err(|e| FetchError {
            chunk_key: key,
            path: file.display().to_string(),
            reason: e.to_string(),
            status: None,
        })
    }
}

/// Issues a GET per chunk against a base URL. Any non-success status is a
/// fetch failure.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Uses a preconfigured client, e.g. one with a request timeout.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl ChunkFetcher for HttpFetcher {
    async fn fetch(&self, key: ChunkKey, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let failure = |reason: String, status: Option<u16>| FetchError {
            chunk_key: key,
            path: url.clone(),
            reason,
            status,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| failure(e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failure(format!("HTTP {}", status), Some(status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| failure(e.to_string(), Some(status.as_u16())))?;
        Ok(body.to_vec())
    }
}
