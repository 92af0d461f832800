//! Epoch cache coordination
//!
//! Building a cache is the one expensive step per epoch. [`EpochCaches`] hands out shared
//! read-only buffers and guarantees at most one build in flight per epoch: concurrent
//! callers for the same epoch wait on that epoch's slot and receive the same `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::cache::{Cache, build_cache_with_progress};
use crate::error::Result;
use crate::params::AihashConfig;

/// Keyed storage for built caches
pub trait CacheStore: Send + Sync {
    /// Cache for `epoch`, if present
    fn get(&self, epoch: u64) -> Result<Option<Arc<Cache>>>;

    /// Store a complete cache for `epoch`
    fn put(&self, epoch: u64, cache: Arc<Cache>) -> Result<()>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, epoch: u64) -> Result<Option<Arc<Cache>>> {
        (**self).get(epoch)
    }

    fn put(&self, epoch: u64, cache: Arc<Cache>) -> Result<()> {
        (**self).put(epoch, cache)
    }
}

/// In-process store, optionally keeping only the newest `capacity` epochs
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    caches: Mutex<BTreeMap<u64, Arc<Cache>>>,
    capacity: Option<usize>,
}

impl MemoryCacheStore {
    /// Unbounded store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store keeping at most `capacity` epochs (oldest evicted first)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            caches: Mutex::new(BTreeMap::new()),
            capacity: Some(capacity.max(1)),
        }
    }

    /// Epochs currently held, ascending
    pub fn epochs(&self) -> Vec<u64> {
        let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.keys().copied().collect()
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, epoch: u64) -> Result<Option<Arc<Cache>>> {
        let caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(caches.get(&epoch).cloned())
    }

    fn put(&self, epoch: u64, cache: Arc<Cache>) -> Result<()> {
        let mut caches = self.caches.lock().unwrap_or_else(PoisonError::into_inner);
        caches.insert(epoch, cache);
        if let Some(capacity) = self.capacity {
            while caches.len() > capacity {
                caches.pop_first();
            }
        }
        Ok(())
    }
}

/// One in-flight build: waiters queue on `cache`, observers read `progress`
#[derive(Default)]
struct BuildSlot {
    cache: Mutex<Option<Arc<Cache>>>,
    progress: AtomicU64,
}

/// Build-or-wait access to per-epoch caches
pub struct EpochCaches<S: CacheStore = MemoryCacheStore> {
    config: AihashConfig,
    store: S,
    pending: Mutex<HashMap<u64, Arc<BuildSlot>>>,
    builds: AtomicU64,
}

impl EpochCaches<MemoryCacheStore> {
    /// Coordinator backed by an unbounded in-memory store
    pub fn in_memory(config: AihashConfig) -> Result<Self> {
        Self::new(config, MemoryCacheStore::new())
    }
}

impl<S: CacheStore> EpochCaches<S> {
    pub fn new(config: AihashConfig, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            pending: Mutex::new(HashMap::new()),
            builds: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &AihashConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of cache constructions that actually ran
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }

    /// Rows written so far by the build in flight for `epoch`, if there is one
    pub fn progress(&self, epoch: u64) -> Option<u64> {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending
            .get(&epoch)
            .map(|slot| slot.progress.load(Ordering::Relaxed))
    }

    /// Cache for the epoch containing `height`
    pub fn cache_for_height(&self, height: u64, seed: &[u8]) -> Result<Arc<Cache>> {
        self.get_or_build(self.config.epoch(height), seed)
    }

    /// Cache for `epoch`, building it from `seed` if no one has yet.
    pub fn get_or_build(&self, epoch: u64, seed: &[u8]) -> Result<Arc<Cache>> {
        if let Some(cache) = self.store.get(epoch)? {
            return Ok(cache);
        }

        let slot = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(pending.entry(epoch).or_default())
        };

        // Holding the slot lock makes later callers for this epoch wait for us
        let mut guard = slot.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cache) = guard.as_ref() {
            return Ok(Arc::clone(cache));
        }
        // Another builder may have finished and left the pending map before we got here
        if let Some(cache) = self.store.get(epoch)? {
            *guard = Some(Arc::clone(&cache));
            return Ok(cache);
        }

        let result = self.build(epoch, seed, &slot.progress);
        if let Ok(cache) = &result {
            *guard = Some(Arc::clone(cache));
        }
        drop(guard);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&epoch).is_some_and(|s| Arc::ptr_eq(s, &slot)) {
            pending.remove(&epoch);
        }

        result
    }

    fn build(&self, epoch: u64, seed: &[u8], progress: &AtomicU64) -> Result<Arc<Cache>> {
        let start = Instant::now();
        tracing::info!(epoch, size = self.config.cache_size, "building epoch cache");

        progress.store(0, Ordering::Relaxed);
        let cache = Arc::new(build_cache_with_progress(
            seed,
            self.config.cache_size,
            progress,
        )?);
        self.store.put(epoch, Arc::clone(&cache))?;
        self.builds.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            epoch,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "epoch cache ready"
        );
        Ok(cache)
    }
}
