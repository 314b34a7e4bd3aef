//! Audio asset cache
//!
//! Caches audio responses in a partition named after the manifest it was
//! installed from. Audio requests are served cache-first; successful
//! network responses are written back in the background and the partition
//! is kept under a fixed entry count by dropping the oldest insertions.

pub mod fetcher;
pub mod manifest;
pub mod storage;

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use crate::config::CacheConfig;

pub use fetcher::{AssetResponse, Fetcher, ReqwestFetcher};
pub use storage::{CacheStorage, Partition};

/// Worker lifecycle. Requests are only intercepted once `Activated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDestination {
    Audio,
    Document,
    Script,
    Style,
    Image,
    Other,
}

#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub url: String,
    pub destination: RequestDestination,
}

impl AssetRequest {
    pub fn audio(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            destination: RequestDestination::Audio,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not ours; the caller goes to the network itself
    Passthrough,
    Response(AssetResponse),
    /// Network failed and nothing was cached; the caller treats it as a load failure
    Missing,
}

struct WorkerStatus {
    state: WorkerState,
    audio_partition: String,
    /// URLs named by the installed manifest
    listed: Vec<String>,
}

struct Inner {
    config: CacheConfig,
    fetcher: Arc<dyn Fetcher>,
    storage: RwLock<CacheStorage>,
    status: RwLock<WorkerStatus>,
    writes: Mutex<JoinSet<()>>,
}

#[derive(Clone)]
pub struct AssetCacheManager {
    inner: Arc<Inner>,
}

impl AssetCacheManager {
    pub fn new(config: CacheConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                storage: RwLock::new(CacheStorage::new()),
                status: RwLock::new(WorkerStatus {
                    state: WorkerState::Installing,
                    audio_partition: manifest::empty_partition_name(),
                    listed: Vec::new(),
                }),
                writes: Mutex::new(JoinSet::new()),
            }),
        }
    }

    pub async fn state(&self) -> WorkerState {
        self.inner.status.read().await.state
    }

    pub async fn current_partition(&self) -> String {
        self.inner.status.read().await.audio_partition.clone()
    }

    pub async fn partition_names(&self) -> Vec<String> {
        self.inner.storage.read().await.keys()
    }

    /// Whether the installed manifest names `url`
    pub async fn is_listed(&self, url: &str) -> bool {
        self.inner.status.read().await.listed.iter().any(|u| u == url)
    }

    /// Keys of the current audio partition, oldest first
    pub async fn cached_urls(&self) -> Vec<String> {
        let partition = self.current_partition().await;
        self.inner
            .storage
            .read()
            .await
            .partition(&partition)
            .map(|p| p.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Fetch the manifest, name the audio partition after its contents and
    /// pre-fetch every listed URL into it. A missing or unreadable manifest
    /// leaves an empty, freshly named partition instead of failing.
    pub async fn install(&self) -> String {
        self.inner.status.write().await.state = WorkerState::Installing;
        let config = &self.inner.config;

        let manifest = match config.manifest_location() {
            Ok(location) => self.fetch_manifest(&location).await,
            Err(e) => {
                tracing::error!("Cannot locate manifest: {:#}", e);
                None
            }
        };

        let (partition, listed) = match manifest {
            Some(text) => {
                let urls = manifest::extract_urls(&text);
                let name = manifest::partition_name(&urls);
                tracing::info!("Manifest lists {} audio files, partition {}", urls.len(), name);
                self.inner.storage.write().await.open(&name);
                self.prefetch(&name, &urls, Some(config.max_entries)).await;
                (name, urls)
            }
            None => {
                let name = manifest::empty_partition_name();
                self.inner.storage.write().await.open(&name);
                (name, Vec::new())
            }
        };

        // Static assets are a fixed set; the audio bound does not apply
        if let Some(static_partition) = &config.static_partition {
            self.inner.storage.write().await.open(static_partition);
            self.prefetch(static_partition, &config.static_assets, None).await;
        }

        let mut status = self.inner.status.write().await;
        status.audio_partition = partition.clone();
        status.listed = listed;
        status.state = WorkerState::Installed;
        tracing::info!("Asset cache installed with partition {}", partition);
        partition
    }

    /// Drop every partition from earlier manifests and start intercepting
    pub async fn activate(&self) -> usize {
        let current = {
            let mut status = self.inner.status.write().await;
            status.state = WorkerState::Activating;
            status.audio_partition.clone()
        };

        let mut removed = 0;
        {
            let mut storage = self.inner.storage.write().await;
            for name in storage.keys() {
                let keep = name == current
                    || self.inner.config.static_partition.as_deref() == Some(name.as_str());
                if !keep && storage.delete(&name) {
                    tracing::info!("Deleted stale cache partition {}", name);
                    removed += 1;
                }
            }
        }

        self.inner.status.write().await.state = WorkerState::Activated;
        tracing::info!("Asset cache active, {} stale partitions removed", removed);
        removed
    }

    pub async fn handle_fetch(&self, request: &AssetRequest) -> FetchOutcome {
        if self.state().await != WorkerState::Activated {
            return FetchOutcome::Passthrough;
        }

        match request.destination {
            RequestDestination::Audio => self.serve_audio(&request.url).await,
            _ => self.serve_static(&request.url).await,
        }
    }

    /// Wait for background cache writes started so far
    pub async fn settle(&self) {
        let mut writes = self.inner.writes.lock().await;
        while let Some(result) = writes.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Cache write task failed: {}", e);
            }
        }
    }

    async fn serve_audio(&self, url: &str) -> FetchOutcome {
        if let Some(hit) = self.lookup(url).await {
            tracing::debug!("Cache hit: {}", url);
            return FetchOutcome::Response(hit);
        }

        match self.inner.fetcher.fetch(url).await {
            Ok(response) => {
                if response.status == 200 {
                    self.store_in_background(url, response.clone()).await;
                }
                FetchOutcome::Response(response)
            }
            Err(e) => {
                tracing::warn!("Network failure for {}: {:#}", url, e);
                match self.lookup(url).await {
                    Some(hit) => FetchOutcome::Response(hit),
                    None => FetchOutcome::Missing,
                }
            }
        }
    }

    async fn serve_static(&self, url: &str) -> FetchOutcome {
        let Some(name) = &self.inner.config.static_partition else {
            return FetchOutcome::Passthrough;
        };
        self.inner
            .storage
            .read()
            .await
            .partition(name)
            .and_then(|p| p.get(url).cloned())
            .map_or(FetchOutcome::Passthrough, FetchOutcome::Response)
    }

    async fn fetch_manifest(&self, location: &str) -> Option<String> {
        match self.inner.fetcher.fetch(location).await {
            Ok(response) if response.is_ok() => Some(response.text()),
            Ok(response) => {
                tracing::error!("Manifest {} returned status {}", location, response.status);
                None
            }
            Err(e) => {
                tracing::error!("Failed to fetch manifest {}: {:#}", location, e);
                None
            }
        }
    }

    async fn lookup(&self, url: &str) -> Option<AssetResponse> {
        self.inner.storage.read().await.match_any(url).cloned()
    }

    /// The response goes back to the caller without waiting for this write
    async fn store_in_background(&self, url: &str, response: AssetResponse) {
        let inner = Arc::clone(&self.inner);
        let url = url.to_string();
        let partition = self.current_partition().await;
        let bound = Some(self.inner.config.max_entries);

        let mut writes = self.inner.writes.lock().await;
        while writes.try_join_next().is_some() {}
        writes.spawn(async move {
            inner.store(&partition, &url, response, bound).await;
        });
    }

    async fn prefetch(&self, partition: &str, urls: &[String], bound: Option<usize>) {
        let fetches = urls.iter().map(|url| self.inner.fetcher.fetch(url));
        let results = join_all(fetches).await;

        let mut cached = 0;
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(response) if response.status == 200 => {
                    self.inner.store(partition, url, response, bound).await;
                    cached += 1;
                }
                Ok(response) => {
                    tracing::warn!("Not caching {} (status {})", url, response.status)
                }
                Err(e) => tracing::warn!("Failed to pre-fetch {}: {:#}", url, e),
            }
        }
        tracing::info!("Pre-fetched {}/{} assets into {}", cached, urls.len(), partition);
    }
}

impl Inner {
    /// Insert into `partition`, then trim it to `bound` entries if one is given
    async fn store(&self, partition: &str, url: &str, response: AssetResponse, bound: Option<usize>) {
        let mut storage = self.storage.write().await;
        let entries = storage.open(partition);
        entries.put(url, response);
        if let Some(max) = bound {
            for evicted in entries.evict_to(max) {
                tracing::debug!("Evicted {} from {}", evicted, partition);
            }
        }
    }
}
