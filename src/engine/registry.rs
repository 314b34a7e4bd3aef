use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::storage::{KeyValueStore, StorageKey};

/// Default time a failed source stays on the skip list
pub fn default_retention() -> Duration {
    Duration::hours(1)
}

/// Advisory skip-list of recently failed source URLs.
///
/// Entries are epoch milliseconds keyed by URL and persisted as one JSON
/// object under [`StorageKey::FAILED_URLS`]. Expired entries are only
/// purged when something new is recorded.
pub struct FailedUrlRegistry {
    store: Box<dyn KeyValueStore>,
    failures: HashMap<String, i64>,
    retention: Duration,
}

impl FailedUrlRegistry {
    pub fn new(store: Box<dyn KeyValueStore>, retention: Duration) -> Self {
        let failures = store
            .get(StorageKey::FAILED_URLS)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(map) => Some(map),
                Err(e) => {
                    tracing::warn!("Discarding unreadable failed-URL registry: {}", e);
                    None
                }
            })
            .unwrap_or_default();

        Self {
            store,
            failures,
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Whether `url` failed less than one retention window before `now`
    pub fn is_recently_failed(&self, url: &str, now: DateTime<Utc>) -> bool {
        self.failures
            .get(url)
            .is_some_and(|&failed_at| now.timestamp_millis() - failed_at < self.retention.num_milliseconds())
    }

    pub fn failed_at(&self, url: &str) -> Option<DateTime<Utc>> {
        self.failures
            .get(url)
            .and_then(|&millis| DateTime::from_timestamp_millis(millis))
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record a failure, purge expired entries and persist
    pub fn record_failure(&mut self, url: &str, now: DateTime<Utc>) {
        let now_ms = now.timestamp_millis();
        let window = self.retention.num_milliseconds();

        self.failures.insert(url.to_string(), now_ms);
        self.failures.retain(|_, failed_at| now_ms - *failed_at <= window);

        let persisted = serde_json::to_string(&self.failures)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(StorageKey::FAILED_URLS, raw));
        if let Err(e) = persisted {
            tracing::warn!("Could not persist failed URL {}: {:#}", url, e);
        }
    }
}
