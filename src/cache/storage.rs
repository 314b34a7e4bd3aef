use std::collections::HashMap;

use indexmap::IndexMap;

use super::fetcher::AssetResponse;

/// One named cache partition. Keys enumerate in insertion order.
#[derive(Debug, Default)]
pub struct Partition {
    entries: IndexMap<String, AssetResponse>,
}

impl Partition {
    /// Store a response. Replacing a key moves it to the end of the order.
    pub fn put(&mut self, key: &str, response: AssetResponse) {
        self.entries.shift_remove(key);
        self.entries.insert(key.to_string(), response);
    }

    pub fn get(&self, key: &str) -> Option<&AssetResponse> {
        self.entries.get(key)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the oldest entries until at most `max` remain. Returns the
    /// evicted keys, oldest first.
    pub fn evict_to(&mut self, max: usize) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.entries.len() > max {
            match self.entries.shift_remove_index(0) {
                Some((oldest, _)) => evicted.push(oldest),
                None => break,
            }
        }
        evicted
    }
}

/// All partitions known to the worker, by name
#[derive(Debug, Default)]
pub struct CacheStorage {
    partitions: HashMap<String, Partition>,
}

impl CacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a partition, creating it empty if needed
    pub fn open(&mut self, name: &str) -> &mut Partition {
        self.partitions.entry(name.to_string()).or_default()
    }

    pub fn partition(&self, name: &str) -> Option<&Partition> {
        self.partitions.get(name)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.partitions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn delete(&mut self, name: &str) -> bool {
        self.partitions.remove(name).is_some()
    }

    /// Look `key` up across every partition
    pub fn match_any(&self, key: &str) -> Option<&AssetResponse> {
        self.partitions.values().find_map(|p| p.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(tag: &str) -> AssetResponse {
        AssetResponse::ok(tag.as_bytes().to_vec(), Some("audio/mpeg".to_string()))
    }

    #[test]
    fn test_eviction_removes_earliest_inserted() {
        let mut partition = Partition::default();
        for i in 0..5 {
            partition.put(&format!("track-{}", i), body("x"));
        }

        let evicted = partition.evict_to(3);
        assert_eq!(evicted, vec!["track-0", "track-1"]);
        assert_eq!(partition.len(), 3);
        assert_eq!(
            partition.keys().collect::<Vec<_>>(),
            vec!["track-2", "track-3", "track-4"]
        );
    }

    #[test]
    fn test_reput_moves_key_to_back() {
        let mut partition = Partition::default();
        partition.put("a", body("1"));
        partition.put("b", body("2"));
        partition.put("a", body("3"));

        assert_eq!(partition.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(partition.get("a").map(|r| r.body.as_slice()), Some(&b"3"[..]));

        partition.evict_to(1);
        assert!(partition.get("b").is_none());
    }

    #[test]
    fn test_delete_keeps_remaining_order() {
        let mut partition = Partition::default();
        for key in ["a", "b", "c", "d"] {
            partition.put(key, body(key));
        }

        assert!(partition.delete("b"));
        assert!(!partition.delete("b"));
        assert_eq!(partition.keys().collect::<Vec<_>>(), vec!["a", "c", "d"]);
        assert_eq!(partition.evict_to(2), vec!["a"]);
    }

    #[test]
    fn test_storage_open_and_delete() {
        let mut storage = CacheStorage::new();
        storage.open("music-cache-1").put("a", body("1"));
        storage.open("static-v1");

        assert_eq!(storage.keys(), vec!["music-cache-1", "static-v1"]);
        assert!(storage.match_any("a").is_some());
        assert!(storage.delete("music-cache-1"));
        assert!(storage.match_any("a").is_none());
    }
}
