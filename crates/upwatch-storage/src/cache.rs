//! Write-through cache for endpoint status reads.
//!
//! Entries are populated on read, refreshed on the write path after the
//! owning endpoint's data changes, and carry a TTL as a safety net: if a
//! refresh-after-invalidate ever fails, the stale entry ages out instead of
//! being served forever.

use crate::PagingParams;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use upwatch_core::EndpointStatus;

struct CacheEntry {
    status: EndpointStatus,
    params: PagingParams,
    expires_at: Instant,
}

pub(crate) struct StatusCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl StatusCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn cache_key(endpoint_key: &str, params: &PagingParams) -> String {
        format!(
            "{endpoint_key}-{}-{}-{}-{}",
            params.events_page, params.events_page_size, params.results_page, params.results_page_size
        )
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn get(&self, cache_key: &str) -> Option<EndpointStatus> {
        let mut entries = self.lock();
        match entries.get(cache_key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.status.clone()),
            Some(_) => {
                entries.remove(cache_key);
                None
            }
            None => None,
        }
    }

    pub(crate) fn set(&self, cache_key: String, status: EndpointStatus, params: PagingParams) {
        self.lock().insert(
            cache_key,
            CacheEntry {
                status,
                params,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub(crate) fn delete(&self, cache_key: &str) {
        self.lock().remove(cache_key);
    }

    /// Returns the cache keys and paging parameters of every entry owned by
    /// the given endpoint key, so the write path can refresh them.
    pub(crate) fn entries_for_endpoint(&self, endpoint_key: &str) -> Vec<(String, PagingParams)> {
        let prefix = format!("{endpoint_key}-");
        self.lock()
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, entry)| (key.clone(), entry.params))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire_after_ttl() {
        let cache = StatusCache::new(Duration::from_millis(10));
        let params = PagingParams::default();
        let key = StatusCache::cache_key("core_app", &params);
        cache.set(key.clone(), EndpointStatus::new("core", "app"), params);
        assert!(cache.get(&key).is_some());
        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn entries_are_scoped_by_endpoint_key() {
        let cache = StatusCache::new(Duration::from_secs(60));
        let params = PagingParams::default().with_results(1, 20);
        cache.set(
            StatusCache::cache_key("core_app", &params),
            EndpointStatus::new("core", "app"),
            params,
        );
        cache.set(
            StatusCache::cache_key("core_db", &params),
            EndpointStatus::new("core", "db"),
            params,
        );
        assert_eq!(cache.entries_for_endpoint("core_app").len(), 1);
        assert_eq!(cache.entries_for_endpoint("core_db").len(), 1);
        assert!(cache.entries_for_endpoint("other_x").is_empty());
    }
}
