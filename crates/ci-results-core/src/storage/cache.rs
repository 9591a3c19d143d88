//! Point-lookup caches in front of the store.
//!
//! Keys are immutable once written (a job name, a `(job, number)` pair, a test
//! name always map to the same row id), so entries are never invalidated while
//! the data they point at is committed. A rolled-back write transaction clears
//! them, since ids handed out inside it no longer exist.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildKey {
    pub job_id: i64,
    pub number: String,
}

pub trait IdCache<K>: Send + Sync {
    fn get(&self, key: &K) -> Option<i64>;
    fn insert(&self, key: K, id: i64);
    fn clear(&self);
}

/// Bounded cache with recency-based eviction.
pub struct BoundedIdCache<K> {
    inner: Cache<K, i64>,
}

impl<K> BoundedIdCache<K>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::new(capacity),
        }
    }
}

impl<K> IdCache<K> for BoundedIdCache<K>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<i64> {
        self.inner.get(key)
    }

    fn insert(&self, key: K, id: i64) {
        self.inner.insert(key, id);
    }

    fn clear(&self) {
        self.inner.invalidate_all();
    }
}

/// Always misses; every lookup goes to the database.
pub struct NoCache;

impl<K> IdCache<K> for NoCache {
    fn get(&self, _key: &K) -> Option<i64> {
        None
    }

    fn insert(&self, _key: K, _id: i64) {}

    fn clear(&self) {}
}

/// Per-entity capacities. Zero disables that cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub jobs: u64,
    pub builds: u64,
    pub tests: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            jobs: 20,
            builds: 100,
            tests: 5000,
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            jobs: 0,
            builds: 0,
            tests: 0,
        }
    }
}

fn make<K>(capacity: u64) -> Box<dyn IdCache<K>>
where
    K: Hash + Eq + Send + Sync + 'static,
{
    if capacity == 0 {
        Box::new(NoCache)
    } else {
        Box::new(BoundedIdCache::new(capacity))
    }
}

pub struct StoreCaches {
    pub jobs: Box<dyn IdCache<String>>,
    pub builds: Box<dyn IdCache<BuildKey>>,
    pub tests: Box<dyn IdCache<String>>,
}

impl StoreCaches {
    pub fn new(cfg: &CacheConfig) -> Self {
        Self {
            jobs: make(cfg.jobs),
            builds: make(cfg.builds),
            tests: make(cfg.tests),
        }
    }

    pub fn clear(&self) {
        self.jobs.clear();
        self.builds.clear();
        self.tests.clear();
    }
}

impl Default for StoreCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
