use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// A playable track with its ordered candidate sources
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub sources: Vec<String>,
    #[serde(rename = "lrcSources")]
    pub lrc_sources: Vec<String>,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            sources: Vec::new(),
            lrc_sources: Vec::new(),
        }
    }

    pub fn with_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_lrc_sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lrc_sources = sources.into_iter().map(Into::into).collect();
        self
    }
}

/// The feed allows either a single URL or a list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(url) if url.is_empty() => Vec::new(),
            OneOrMany::One(url) => vec![url],
            OneOrMany::Many(urls) => urls.into_iter().filter(|u| !u.is_empty()).collect(),
        }
    }
}

/// One entry of the external catalog feed
#[derive(Debug, Deserialize)]
struct FeedEntry {
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
    sources: Option<OneOrMany>,
    #[serde(rename = "lrcPath")]
    lrc_path: Option<OneOrMany>,
}

/// Immutable list of tracks built from the catalog feed
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Arc<Track>>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks: tracks.into_iter().map(Arc::new).collect(),
        }
    }

    /// Parse a JSON feed (an array of entries)
    pub fn from_feed(json: &str) -> Result<Self> {
        let entries: Vec<FeedEntry> =
            serde_json::from_str(json).context("Failed to parse catalog feed")?;

        let tracks = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Track {
                id: entry
                    .id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("s{}", index)),
                title: entry.title,
                artist: entry.artist,
                sources: entry.sources.map(OneOrMany::into_vec).unwrap_or_default(),
                lrc_sources: entry.lrc_path.map(OneOrMany::into_vec).unwrap_or_default(),
            })
            .collect();

        Ok(Self::new(tracks))
    }

    /// Load the feed from disk, degrading to an empty catalog on any failure
    pub async fn load_or_empty(path: &Path) -> Self {
        let loaded = async {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
            Self::from_feed(&raw)
        }
        .await;

        match loaded {
            Ok(catalog) => {
                tracing::info!("Loaded {} tracks from {}", catalog.len(), path.display());
                catalog
            }
            Err(e) => {
                tracing::error!("Catalog unavailable, continuing with no tracks: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    pub fn get(&self, id: &str) -> Option<Arc<Track>> {
        self.tracks.iter().find(|t| t.id == id).cloned()
    }

    /// Whether any track lists `url` as an audio source
    pub fn contains_source(&self, url: &str) -> bool {
        self.tracks.iter().any(|t| t.sources.iter().any(|s| s == url))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_normalizes_sources() {
        let feed = r#"[
            {"id": "a", "title": "First", "artist": "X", "sources": "https://cdn1/a.mp3", "lrcPath": "/lrc/a.lrc"},
            {"title": "Second", "artist": "Y", "sources": ["https://cdn1/b.mp3", "https://cdn2/b.mp3"]},
            {"title": "Third", "artist": "Z"}
        ]"#;

        let catalog = Catalog::from_feed(feed).unwrap();
        assert_eq!(catalog.len(), 3);

        let first = catalog.get("a").unwrap();
        assert_eq!(first.sources, vec!["https://cdn1/a.mp3"]);
        assert_eq!(first.lrc_sources, vec!["/lrc/a.lrc"]);

        let second = catalog.get("s1").unwrap();
        assert_eq!(second.sources.len(), 2);
        assert!(second.lrc_sources.is_empty());

        let third = catalog.get("s2").unwrap();
        assert!(third.sources.is_empty());

        assert!(catalog.contains_source("https://cdn2/b.mp3"));
        assert!(!catalog.contains_source("/lrc/a.lrc"));
    }

    #[tokio::test]
    async fn test_missing_feed_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load_or_empty(&dir.path().join("missing.json")).await;
        assert!(catalog.is_empty());
    }
}
