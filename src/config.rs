use anyhow::{Context, Result};
use chrono::Duration;

use crate::engine::registry::default_retention;

/// Settings for the playback fallback engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a failed source is skipped
    pub retention: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention: default_retention(),
        }
    }
}

/// Settings for the audio asset cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Where the manifest of audio URLs is fetched from on install. A path
    /// is resolved against `public_base_url`.
    pub manifest_url: String,
    /// Origin the site is served from
    pub public_base_url: Option<String>,
    /// Upper bound on entries in the audio partition
    pub max_entries: usize,
    /// Separate partition for static assets, kept across manifest changes
    pub static_partition: Option<String>,
    /// Assets pre-fetched into the static partition on install
    pub static_assets: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            manifest_url: "/data/music.yml".to_string(),
            public_base_url: None,
            max_entries: 64,
            static_partition: None,
            static_assets: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Absolute manifest URL
    pub fn manifest_location(&self) -> Result<String> {
        if let Ok(url) = reqwest::Url::parse(&self.manifest_url) {
            return Ok(url.to_string());
        }

        let base = self.public_base_url.as_deref().with_context(|| {
            format!("Manifest URL {} is relative and no public base URL is set", self.manifest_url)
        })?;
        let base = reqwest::Url::parse(base).with_context(|| format!("Invalid base URL: {}", base))?;
        let url = base
            .join(&self.manifest_url)
            .with_context(|| format!("Cannot resolve {} against {}", self.manifest_url, base))?;
        Ok(url.to_string())
    }
}
