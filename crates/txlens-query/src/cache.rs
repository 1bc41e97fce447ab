//! Version-keyed result cache.
//!
//! Entries are keyed by query name, a BLAKE3 digest of the canonical
//! parameter encoding, and the dataset version observed at lookup time.
//! Ingestion bumping the version makes every older entry unreachable,
//! so invalidation needs no explicit flush. Eviction is oldest-first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use txlens_graph::{QueryParams, Row};

use crate::catalog::QueryCatalog;
use crate::error::Result;

/// Source of the dataset version a cache entry is pinned to.
pub trait DatasetVersion: Send + Sync {
    fn current(&self) -> u64;
}

impl DatasetVersion for AtomicU64 {
    fn current(&self) -> u64 {
        self.load(Ordering::Relaxed)
    }
}

/// Fixed version for offline use against a dataset that never changes.
pub struct PinnedVersion(pub u64);

impl DatasetVersion for PinnedVersion {
    fn current(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    name: String,
    params_digest: [u8; 32],
    version: u64,
}

fn params_digest(params: &QueryParams) -> [u8; 32] {
    // QueryParams is a BTreeMap, so the JSON encoding is canonical.
    let json = serde_json::to_vec(params).unwrap_or_default();
    *blake3::hash(&json).as_bytes()
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<Vec<Row>>>,
    order: VecDeque<CacheKey>,
}

/// Bounded map from `(query, params, version)` to shared result rows.
pub struct ResultCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, name: &str, params: &QueryParams, version: u64) -> Option<Arc<Vec<Row>>> {
        let key = CacheKey {
            name: name.to_string(),
            params_digest: params_digest(params),
            version,
        };
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.entries.get(&key) {
            Some(rows) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(rows.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, name: &str, params: &QueryParams, version: u64, rows: Arc<Vec<Row>>) {
        let key = CacheKey {
            name: name.to_string(),
            params_digest: params_digest(params),
            version,
        };
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.entries.insert(key.clone(), rows).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

/// A [`QueryCatalog`] with the cache in front of it.
pub struct CachedCatalog {
    catalog: QueryCatalog,
    cache: ResultCache,
    version: Arc<dyn DatasetVersion>,
}

impl CachedCatalog {
    pub fn new(catalog: QueryCatalog, cache: ResultCache, version: Arc<dyn DatasetVersion>) -> Self {
        Self {
            catalog,
            cache,
            version,
        }
    }

    /// Serve from the cache when the entry's version is still current,
    /// otherwise execute and fill. Validation errors are never cached.
    pub async fn run(&self, name: &str, params: QueryParams) -> Result<Arc<Vec<Row>>> {
        let version = self.version.current();
        if let Some(rows) = self.cache.get(name, &params, version) {
            tracing::debug!(query = name, version, "Cache hit");
            return Ok(rows);
        }
        let rows = Arc::new(self.catalog.run(name, params.clone()).await?);
        self.cache.insert(name, &params, version, rows.clone());
        Ok(rows)
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use txlens_core::{ClassLabel, FeatureVector, TimeStep, TransactionRecord, TxId};
    use txlens_graph::{GraphStore, MemoryStore};

    fn tx(id: &str, label: ClassLabel, step: TimeStep) -> TransactionRecord {
        TransactionRecord {
            tx_id: TxId::new(id),
            class_label: label,
            time_step: step,
            features: FeatureVector::zeroed(),
        }
    }

    fn some_rows(n: usize) -> Arc<Vec<Row>> {
        let mut rows = Vec::new();
        for i in 0..n {
            let mut row = Row::new();
            row.insert("i".to_string(), json!(i));
            rows.push(row);
        }
        Arc::new(rows)
    }

    #[test]
    fn test_hit_returns_the_same_allocation() {
        let cache = ResultCache::new(8);
        let params = QueryParams::new();
        let rows = some_rows(3);

        assert!(cache.get("q", &params, 7).is_none());
        cache.insert("q", &params, 7, rows.clone());
        let hit = cache.get("q", &params, 7).unwrap();
        assert!(Arc::ptr_eq(&hit, &rows));
        assert_eq!(cache.stats(), (1, 1));
    }

    #[test]
    fn test_version_change_misses() {
        let cache = ResultCache::new(8);
        let params = QueryParams::new();
        cache.insert("q", &params, 1, some_rows(1));

        assert!(cache.get("q", &params, 1).is_some());
        assert!(cache.get("q", &params, 2).is_none());
    }

    #[test]
    fn test_distinct_params_are_distinct_entries() {
        let cache = ResultCache::new(8);
        let mut p1 = QueryParams::new();
        p1.insert("start".into(), json!(1));
        let mut p2 = QueryParams::new();
        p2.insert("start".into(), json!(2));

        cache.insert("q", &p1, 1, some_rows(1));
        assert!(cache.get("q", &p1, 1).is_some());
        assert!(cache.get("q", &p2, 1).is_none());
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let cache = ResultCache::new(8);
        let mut p1 = QueryParams::new();
        p1.insert("start".into(), json!(1));
        p1.insert("end".into(), json!(5));
        let mut p2 = QueryParams::new();
        p2.insert("end".into(), json!(5));
        p2.insert("start".into(), json!(1));

        cache.insert("q", &p1, 1, some_rows(1));
        assert!(cache.get("q", &p2, 1).is_some());
    }

    #[test]
    fn test_eviction_is_oldest_first() {
        let cache = ResultCache::new(2);
        let params = QueryParams::new();
        cache.insert("q1", &params, 1, some_rows(1));
        cache.insert("q2", &params, 1, some_rows(1));
        cache.insert("q3", &params, 1, some_rows(1));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("q1", &params, 1).is_none());
        assert!(cache.get("q2", &params, 1).is_some());
        assert!(cache.get("q3", &params, 1).is_some());
    }

    #[tokio::test]
    async fn test_cached_catalog_round_trip_and_invalidation() {
        let store = MemoryStore::new();
        store
            .upsert_nodes(&[tx("a", ClassLabel::Licit, 1)])
            .await
            .unwrap();
        let store = Arc::new(store);

        let version = Arc::new(AtomicU64::new(1));
        let cached = CachedCatalog::new(
            QueryCatalog::new(store.clone(), 4),
            ResultCache::new(8),
            version.clone(),
        );

        let first = cached.run("count-by-class", QueryParams::new()).await.unwrap();
        let second = cached.run("count-by-class", QueryParams::new()).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // More data lands and the version moves; the cache re-executes.
        store
            .upsert_nodes(&[tx("b", ClassLabel::Illicit, 2)])
            .await
            .unwrap();
        version.store(2, Ordering::Relaxed);

        let third = cached.run("count-by-class", QueryParams::new()).await.unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third.len(), 2);
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_cached() {
        let cached = CachedCatalog::new(
            QueryCatalog::new(Arc::new(MemoryStore::new()), 4),
            ResultCache::new(8),
            Arc::new(PinnedVersion(0)),
        );

        assert!(cached.run("no-such-query", QueryParams::new()).await.is_err());
        assert!(cached.cache().is_empty());
    }
}
