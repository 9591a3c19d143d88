use ci_results_core::aggregate::Stats;
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Short-lived cache of stats responses keyed by the normalized request.
///
/// The indexer commits a whole run at once, so a response can only go stale
/// by missing the latest run; the TTL bounds that.
#[derive(Clone)]
pub struct StatsCache {
    inner: Option<Cache<String, Arc<Stats>>>,
}

impl StatsCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let inner = (max_entries > 0 && !ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Stats>> {
        self.inner.as_ref()?.get(key)
    }

    pub fn insert(&self, key: String, stats: Arc<Stats>) {
        if let Some(c) = &self.inner {
            c.insert(key, stats);
        }
    }
}

pub fn key(columns: &str, filter: &str, periods: &str, testname: &str) -> String {
    // unit separator; never part of a column list, filter or period list
    format!("{columns}\u{1f}{filter}\u{1f}{periods}\u{1f}{testname}")
}
