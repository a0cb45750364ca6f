//! Opt-in TTL cache for composite analysis responses.

use std::time::Duration;

use moka::sync::Cache;

use crate::config::CacheConfig;
use crate::types::AnalysisResponse;

/// In-process response cache keyed by upload hash plus options.
pub struct ResponseCache {
    cache: Cache<String, AnalysisResponse>,
}

impl ResponseCache {
    /// Build a cache from config, or `None` when caching is disabled.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(Duration::from_secs(config.ttl_secs), config.max_entries))
    }

    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_entries as u64)
                .build(),
        }
    }

    /// Fetch a live entry.
    pub fn get(&self, key: &str) -> Option<AnalysisResponse> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: String, response: AnalysisResponse) {
        self.cache.insert(key, response);
    }

    /// Entry count after pending evictions are applied.
    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
