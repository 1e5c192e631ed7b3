//! Per-source memoization of decoded weight maps.

use crate::Result;
use dashmap::DashMap;
use pix2pix_weights::WeightMap;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Loaded models currently held
    pub entries: usize,
    /// Lookups served from a loaded entry
    pub hits: u64,
    /// Lookups that had to wait for or run a load
    pub misses: u64,
    /// Loader invocations
    pub loads: u64,
    /// Loader invocations that failed
    pub failures: u64,
    /// Entries removed by `evict` or `clear`
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct CacheStatsInner {
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    failures: AtomicU64,
    evictions: AtomicU64,
}

type Slot = Arc<OnceCell<Arc<WeightMap>>>;

/// Decoded models keyed by source.
///
/// Concurrent callers for the same key share one load. A failed load leaves
/// nothing behind, so the next call starts over.
#[derive(Debug, Default)]
pub struct ModelCache {
    slots: DashMap<String, Slot>,
    stats: CacheStatsInner,
}

impl ModelCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the model for `key`, running `load` if it is not cached yet.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> Result<Arc<WeightMap>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WeightMap>>,
    {
        // Clone the slot out so no map guard is held across an await.
        let slot: Slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        if let Some(weights) = slot.get() {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(weights.clone());
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let result = slot
            .get_or_try_init(|| async {
                self.stats.loads.fetch_add(1, Ordering::Relaxed);
                debug!("Loading model {}", key);
                load().await.map(Arc::new)
            })
            .await;

        match result {
            Ok(weights) => Ok(weights.clone()),
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                warn!("Loading model {} failed ({}): {}", key, e.category(), e);
                // A waiter holding the slot runs its own loader into it.
                self.slots.remove_if(key, |_, current| {
                    Arc::ptr_eq(current, &slot)
                        && !current.initialized()
                        && Arc::strong_count(current) == 2
                });
                Err(e)
            }
        }
    }

    /// Loaded model for `key`, if any
    pub fn get(&self, key: &str) -> Option<Arc<WeightMap>> {
        let weights = self.slots.get(key).and_then(|slot| slot.get().cloned());
        let counter = match weights {
            Some(_) => &self.stats.hits,
            None => &self.stats.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        weights
    }

    /// Whether a loaded model exists for `key`
    pub fn contains(&self, key: &str) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.initialized())
            .unwrap_or(false)
    }

    /// Drop the entry for `key`. Returns whether a loaded model was removed.
    ///
    /// Handles already given out stay valid; the next load re-fetches.
    pub fn evict(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) if slot.initialized() => {
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Evicted model {}", key);
                true
            }
            _ => false,
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let loaded = self.len() as u64;
        self.slots.clear();
        self.stats.evictions.fetch_add(loaded, Ordering::Relaxed);
    }

    /// Number of loaded models
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.initialized()).count()
    }

    /// Whether no model is loaded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys of loaded models
    pub fn keys(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| slot.initialized())
            .map(|slot| slot.key().clone())
            .collect()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            loads: self.stats.loads.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }
}
