//! In-memory result cache keyed by target.
//!
//! ## Eviction
//!
//! Entries expire after the TTL. When the cache is full, expired entries are
//! dropped first; if none are expired the oldest entry goes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::CacheConfig;
use crate::types::ProfileResult;

struct CacheEntry {
    result: ProfileResult,
    cached_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() >= ttl
    }
}

/// Time- and capacity-bounded map from target to its last successful result.
pub struct ResultCache {
    index: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            index: HashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    /// Fresh cached result for `target`, marked as a cache hit.
    pub fn get(&mut self, target: &str) -> Option<ProfileResult> {
        let expired = self.index.get(target)?.is_expired(self.ttl);
        if expired {
            self.index.remove(target);
            return None;
        }
        self.index.get(target).map(|entry| ProfileResult {
            cached: true,
            ..entry.result.clone()
        })
    }

    /// Store a result, evicting if at capacity.
    pub fn put(&mut self, target: &str, result: ProfileResult) {
        if self.index.len() >= self.max_entries && !self.index.contains_key(target) {
            self.evict();
        }
        self.index.insert(
            target.to_string(),
            CacheEntry {
                result,
                cached_at: Instant::now(),
            },
        );
    }

    fn evict(&mut self) {
        let before = self.index.len();
        self.cleanup_expired();
        if self.index.len() < before {
            return;
        }

        if let Some(oldest) = self
            .index
            .iter()
            .min_by_key(|(_, entry)| entry.cached_at)
            .map(|(target, _)| target.clone())
        {
            tracing::debug!("evicting cached result for {oldest}");
            self.index.remove(&oldest);
        }
    }

    /// Number of cached results (including expired).
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Remove all expired entries.
    pub fn cleanup_expired(&mut self) {
        let ttl = self.ttl;
        self.index.retain(|_, entry| !entry.is_expired(ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProfileIdentity, ProfileStatistics};

    fn result(username: &str) -> ProfileResult {
        ProfileResult {
            identity: ProfileIdentity {
                username: username.to_string(),
                ..ProfileIdentity::default()
            },
            statistics: ProfileStatistics::default(),
            extraction_time_ms: 5,
            data_points: 13,
            cached: false,
            used_identity: "1.2.3.4".to_string(),
        }
    }

    #[test]
    fn test_hit_is_flagged_cached() {
        let mut cache = ResultCache::new(Duration::from_secs(300), 10);
        cache.put("alice", result("alice"));

        let hit = cache.get("alice").unwrap();
        assert!(hit.cached);
        assert_eq!(hit.identity.username, "alice");
        assert!(cache.get("bob").is_none());
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let mut cache = ResultCache::new(Duration::from_secs(0), 10);
        cache.put("alice", result("alice"));
        assert!(cache.get("alice").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oldest_evicted_on_overflow() {
        let mut cache = ResultCache::new(Duration::from_secs(300), 2);
        cache.put("a", result("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put("b", result("b"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put("c", result("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_evicts_expired_first() {
        let mut cache = ResultCache::new(Duration::from_secs(1), 3);
        cache.put("stale", result("stale"));
        if let Some(entry) = cache.index.get_mut("stale") {
            entry.cached_at -= Duration::from_secs(2);
        }
        cache.put("b", result("b"));
        cache.put("c", result("c"));
        cache.put("d", result("d"));

        assert_eq!(cache.len(), 3);
        assert!(cache.get("stale").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_overwrite_same_target_keeps_size() {
        let mut cache = ResultCache::new(Duration::from_secs(300), 1);
        cache.put("a", result("a"));
        cache.put("a", result("a2"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().identity.username, "a2");
    }
}
