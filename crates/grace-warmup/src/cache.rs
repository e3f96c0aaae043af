//! Injection-time cache.
//!
//! Maps `host:port:injectTime` to the instant warm-up is measured from.
//! A declared injection time that is newer than `now - gap` has likely
//! not finished propagating through the registry, so the first observation
//! instant is used instead and pinned for the lifetime of the entry.
//!
//! The cache is bounded opportunistically: an insert that would push the
//! size past the bound first sweeps every entry older than the gap. There
//! is no background eviction task.

use std::collections::HashMap;

use dashmap::DashMap;
use tracing::{debug, warn};

use grace_core::{DEFAULT_WARM_UP_INJECT_TIME_GAP_MS, MAX_CACHE_SIZE, WARM_KEY_INJECT_TIME};

/// Concurrent map of instance identity to normalized warm-up start (epoch millis).
#[derive(Debug)]
pub struct InjectionTimeCache {
    entries: DashMap<String, u64>,
    max_size: usize,
    gap_ms: u64,
}

impl InjectionTimeCache {
    pub fn new() -> Self {
        Self::with_limits(MAX_CACHE_SIZE, DEFAULT_WARM_UP_INJECT_TIME_GAP_MS)
    }

    /// Create a cache with a custom bound and reset gap (for testing).
    pub fn with_limits(max_size: usize, gap_ms: u64) -> Self {
        Self {
            entries: DashMap::new(),
            max_size,
            gap_ms,
        }
    }

    /// Build the cache key for an instance.
    pub fn cache_key(host: &str, port: u16, metadata: &HashMap<String, String>) -> String {
        let raw = metadata
            .get(WARM_KEY_INJECT_TIME)
            .map(String::as_str)
            .unwrap_or("");
        format!("{host}:{port}:{raw}")
    }

    /// Resolve the warm-up start instant for `key`.
    ///
    /// The first lookup derives it from `metadata` and caches it; later
    /// lookups return the cached value. Two threads racing on the same key
    /// may both derive, which is harmless since they compute the same value.
    pub fn resolve(&self, key: &str, metadata: &HashMap<String, String>, now_ms: u64) -> u64 {
        if let Some(cached) = self.entries.get(key) {
            return *cached;
        }

        let threshold = now_ms.saturating_sub(self.gap_ms);
        let raw = metadata
            .get(WARM_KEY_INJECT_TIME)
            .and_then(|value| match value.trim().parse::<u64>() {
                Ok(ts) => Some(ts),
                Err(_) => {
                    warn!(%key, value = %value, "malformed injection time, using default");
                    None
                }
            })
            .unwrap_or(threshold);

        let resolved = if raw > threshold {
            debug!(%key, declared = raw, now_ms, "injection time too recent, resetting");
            now_ms
        } else {
            raw
        };

        if self.entries.len() >= self.max_size {
            self.clear_expired(now_ms);
        }

        // No shard guard may be held across the sweep above.
        *self.entries.entry(key.to_string()).or_insert(resolved)
    }

    /// Remove every entry whose warm-up start is at least `gap` in the past.
    pub fn clear_expired(&self, now_ms: u64) -> usize {
        let before = self.entries.len();
        let gap = self.gap_ms;
        self.entries
            .retain(|_, started| now_ms < started.saturating_add(gap));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept expired injection times");
        }
        removed
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|v| *v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InjectionTimeCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    const GAP: u64 = 60_000;
    const NOW: u64 = 1_700_000_000_000;

    fn meta(inject: Option<&str>) -> HashMap<String, String> {
        let mut m = HashMap::new();
        if let Some(ts) = inject {
            m.insert(WARM_KEY_INJECT_TIME.to_string(), ts.to_string());
        }
        m
    }

    #[test]
    fn key_includes_raw_injection_time() {
        assert_eq!(
            InjectionTimeCache::cache_key("10.0.0.1", 8080, &meta(Some("123"))),
            "10.0.0.1:8080:123"
        );
        assert_eq!(
            InjectionTimeCache::cache_key("10.0.0.1", 8080, &meta(None)),
            "10.0.0.1:8080:"
        );
    }

    #[test]
    fn old_injection_time_is_kept() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        let declared = NOW - 2 * GAP;
        let m = meta(Some(&declared.to_string()));
        assert_eq!(cache.resolve("a", &m, NOW), declared);
    }

    #[test]
    fn recent_injection_time_is_reset_to_now() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        let m = meta(Some(&(NOW - 1_000).to_string()));
        assert_eq!(cache.resolve("a", &m, NOW), NOW);
    }

    #[test]
    fn future_injection_time_is_reset_to_now() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        let m = meta(Some(&(NOW + 50_000).to_string()));
        assert_eq!(cache.resolve("a", &m, NOW), NOW);
    }

    #[test]
    fn absent_injection_time_is_immediately_stable() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        assert_eq!(cache.resolve("a", &meta(None), NOW), NOW - GAP);
    }

    #[test]
    fn malformed_injection_time_falls_back_to_default() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        assert_eq!(cache.resolve("a", &meta(Some("yesterday")), NOW), NOW - GAP);
    }

    #[test]
    fn lookups_are_idempotent_once_cached() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        let m = meta(Some(&(NOW - 10).to_string()));
        let first = cache.resolve("a", &m, NOW);
        // Later lookups do not re-derive even though "now" moved on.
        assert_eq!(cache.resolve("a", &m, NOW + 30_000), first);
        assert_eq!(cache.get("a"), Some(NOW));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn overflow_sweeps_expired_entries() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        for i in 0..501 {
            cache.resolve(&format!("k{i}"), &meta(Some(&NOW.to_string())), NOW);
        }
        // Inserts after the bound sweep first, but nothing had expired yet.
        assert_eq!(cache.len(), 501);

        let later = NOW + GAP + 1;
        cache.resolve("fresh", &meta(Some(&later.to_string())), later);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(later));
        assert!(cache.get("k0").is_none());
    }

    #[test]
    fn sweep_keeps_entries_inside_gap() {
        let cache = InjectionTimeCache::with_limits(500, GAP);
        cache.resolve("old", &meta(None), NOW);
        cache.resolve("new", &meta(Some(&NOW.to_string())), NOW);

        let removed = cache.clear_expired(NOW + 1);
        assert_eq!(removed, 1);
        assert!(cache.get("old").is_none());
        assert_eq!(cache.get("new"), Some(NOW));
    }

    #[test]
    fn concurrent_resolution_is_consistent() {
        let cache = Arc::new(InjectionTimeCache::with_limits(50, GAP));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}", (i + t) % 100);
                        cache.resolve(&key, &meta(Some(&NOW.to_string())), NOW);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get("k42"), Some(NOW));
    }
}
