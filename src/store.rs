//! Persistent epoch cache store on sled
//!
//! Keys are `cache:<epoch BE>` for raw cache buffers and `seed:<epoch BE>` for the
//! seed each cache was built from. Big-endian epochs keep prefix scans in epoch order.

use sled::Db;
use std::path::Path;
use std::sync::Arc;

use crate::algorithm::{AihashError, Cache, CacheStore, EpochCaches, Result, SEED_BYTES};

const PREFIX_CACHE: &[u8] = b"cache:";
const PREFIX_SEED: &[u8] = b"seed:";

/// How a stored epoch relates to a requested seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStatus {
    /// No cache stored yet
    Missing,
    /// Cache stored and recorded under this seed
    Stored,
    /// Cache or seed record belongs to another seed (or the cache has no seed record)
    Conflict,
}

/// What [`seeded_cache`] does with a [`SeedStatus::Conflict`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnSeedMismatch {
    Reject,
    Rebuild,
}

/// Cache store backed by an embedded sled database
pub struct DiskCacheStore {
    db: Db,
}

impl DiskCacheStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path).map_err(store_error)?;
        Ok(Self { db })
    }

    /// Record the seed used for `epoch`, overwriting any previous record.
    ///
    /// Use [`seeded_cache`] to keep the record and the cache in step.
    pub fn put_seed(&self, epoch: u64, seed: &[u8; SEED_BYTES]) -> Result<()> {
        self.db
            .insert(epoch_key(PREFIX_SEED, epoch), seed.as_slice())
            .map_err(store_error)?;
        Ok(())
    }

    pub fn get_seed(&self, epoch: u64) -> Result<Option<[u8; SEED_BYTES]>> {
        match self.db.get(epoch_key(PREFIX_SEED, epoch)).map_err(store_error)? {
            Some(bytes) => {
                let seed: [u8; SEED_BYTES] = bytes.as_ref().try_into().map_err(|_| {
                    AihashError::Store(format!(
                        "seed for epoch {epoch} has {} bytes, expected {SEED_BYTES}",
                        bytes.len()
                    ))
                })?;
                Ok(Some(seed))
            }
            None => Ok(None),
        }
    }

    /// Record `seed` for `epoch` unless another seed is already recorded.
    ///
    /// Returns whether the record now names `seed`.
    pub fn claim_seed(&self, epoch: u64, seed: &[u8; SEED_BYTES]) -> Result<bool> {
        let claimed = self
            .db
            .compare_and_swap(
                epoch_key(PREFIX_SEED, epoch),
                None::<&[u8]>,
                Some(seed.as_slice()),
            )
            .map_err(store_error)?;
        Ok(match claimed {
            Ok(()) => true,
            Err(e) => e.current.as_deref() == Some(seed.as_slice()),
        })
    }

    /// Whether a cache is stored for `epoch`
    pub fn contains(&self, epoch: u64) -> Result<bool> {
        self.db
            .contains_key(epoch_key(PREFIX_CACHE, epoch))
            .map_err(store_error)
    }

    pub fn seed_status(&self, epoch: u64, seed: &[u8; SEED_BYTES]) -> Result<SeedStatus> {
        let status = match self.get_seed(epoch)? {
            Some(stored) if stored != *seed => SeedStatus::Conflict,
            Some(_) if self.contains(epoch)? => SeedStatus::Stored,
            Some(_) => SeedStatus::Missing,
            None if self.contains(epoch)? => SeedStatus::Conflict,
            None => SeedStatus::Missing,
        };
        Ok(status)
    }

    /// Stored epochs, ascending
    pub fn epochs(&self) -> Result<Vec<u64>> {
        let mut epochs = Vec::new();
        for item in self.db.scan_prefix(PREFIX_CACHE) {
            let (key, _) = item.map_err(store_error)?;
            epochs.push(epoch_from_key(PREFIX_CACHE, &key)?);
        }
        Ok(epochs)
    }

    /// Drop the cache and seed for `epoch`
    pub fn remove(&self, epoch: u64) -> Result<()> {
        self.db
            .remove(epoch_key(PREFIX_CACHE, epoch))
            .map_err(store_error)?;
        self.db
            .remove(epoch_key(PREFIX_SEED, epoch))
            .map_err(store_error)?;
        Ok(())
    }

    /// Keep only the `keep` newest epochs; returns the epochs removed
    pub fn prune(&self, keep: usize) -> Result<Vec<u64>> {
        let epochs = self.epochs()?;
        let excess = epochs.len().saturating_sub(keep);
        let removed = epochs[..excess].to_vec();
        for &epoch in &removed {
            self.remove(epoch)?;
        }
        if !removed.is_empty() {
            tracing::info!(?removed, keep, "pruned epoch caches");
        }
        Ok(removed)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().map_err(store_error)?;
        Ok(())
    }
}

impl CacheStore for DiskCacheStore {
    fn get(&self, epoch: u64) -> Result<Option<Arc<Cache>>> {
        match self.db.get(epoch_key(PREFIX_CACHE, epoch)).map_err(store_error)? {
            Some(bytes) => {
                let cache = Cache::from_bytes(bytes.to_vec()).map_err(|e| {
                    AihashError::Store(format!("corrupt cache for epoch {epoch}: {e}"))
                })?;
                Ok(Some(Arc::new(cache)))
            }
            None => Ok(None),
        }
    }

    fn put(&self, epoch: u64, cache: Arc<Cache>) -> Result<()> {
        self.db
            .insert(epoch_key(PREFIX_CACHE, epoch), cache.as_bytes())
            .map_err(store_error)?;
        tracing::debug!(
            epoch,
            fingerprint = %hex::encode(cache.fingerprint()),
            "stored epoch cache"
        );
        Ok(())
    }
}

/// Cache for `epoch` built from `seed`, keeping the seed record consistent.
///
/// The seed is claimed before the build so a cache is never labelled with a seed it was
/// not built from. A conflicting epoch is an [`AihashError::SeedMismatch`] under
/// [`OnSeedMismatch::Reject`]; under [`OnSeedMismatch::Rebuild`] it is dropped and rebuilt.
pub fn seeded_cache(
    caches: &EpochCaches<DiskCacheStore>,
    epoch: u64,
    seed: &[u8; SEED_BYTES],
    on_mismatch: OnSeedMismatch,
) -> Result<Arc<Cache>> {
    let store = caches.store();

    if store.seed_status(epoch, seed)? == SeedStatus::Conflict {
        match on_mismatch {
            OnSeedMismatch::Reject => return Err(AihashError::SeedMismatch { epoch }),
            OnSeedMismatch::Rebuild => {
                tracing::warn!(epoch, "seed changed, rebuilding epoch cache");
                store.remove(epoch)?;
            }
        }
    }
    if !store.claim_seed(epoch, seed)? {
        return Err(AihashError::SeedMismatch { epoch });
    }

    let cache = caches.get_or_build(epoch, seed)?;
    store.flush()?;
    Ok(cache)
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn store_error(e: sled::Error) -> AihashError {
    AihashError::Store(e.to_string())
}

fn epoch_key(prefix: &[u8], epoch: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 8);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&epoch.to_be_bytes());
    key
}

fn epoch_from_key(prefix: &[u8], key: &[u8]) -> Result<u64> {
    let raw: [u8; 8] = key[prefix.len()..]
        .try_into()
        .map_err(|_| AihashError::Store(format!("malformed key {}", hex::encode(key))))?;
    Ok(u64::from_be_bytes(raw))
}
