use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::time::Duration;

/// A fetched response, buffered in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AssetResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl AssetResponse {
    pub fn ok(body: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            status: 200,
            content_type,
            body,
        }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Network access used by the asset cache
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`. HTTP error statuses are responses, not errors; only
    /// transport failures return `Err`.
    async fn fetch(&self, url: &str) -> Result<AssetResponse>;
}

/// Largest body [`ReqwestFetcher`] buffers unless told otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub struct ReqwestFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    /// Refuse bodies larger than `bytes`
    pub fn with_max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<AssetResponse> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: {}", url))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                bail!("{} is {} bytes, over the {} byte limit", url, length, self.max_body_bytes);
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed to read body: {}", url))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                bail!("{} exceeds the {} byte limit", url, self.max_body_bytes);
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!("Fetched {} ({} bytes, status {})", url, body.len(), status);

        Ok(AssetResponse {
            status,
            content_type,
            body,
        })
    }
}
