//! Memory-hard epoch cache
//!
//! Construction runs in three phases:
//!
//! 1. Row 0 = SHA3-512(seed)
//! 2. Row i = SHA3-512(row i-1), strictly sequential
//! 3. [`CACHE_ROUNDS`] passes where every row is rewritten as
//!    `SHA3-512(row[j-1] ^ row[word(j) % rows])`, a data-dependent read anywhere in the buffer
//!
//! The buffer is kept in canonical little-endian byte order and 32-bit words are only ever
//! read through [`u32::from_le_bytes`], so the output does not depend on the host.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use sha3::{Digest, Sha3_256, Sha3_512};

use crate::error::Result;
use crate::params::{CACHE_ROUNDS, HASH_BYTES, check_cache_size};

/// Immutable cache buffer shared by every hash within an epoch
#[derive(Clone, PartialEq, Eq)]
pub struct Cache {
    bytes: Vec<u8>,
}

impl Cache {
    /// Adopt an existing buffer (e.g. loaded from disk).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        check_cache_size(bytes.len())?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of 64-byte rows
    pub fn rows(&self) -> usize {
        self.bytes.len() / HASH_BYTES
    }

    /// Row `j`, or `None` past the last row
    pub fn row(&self, j: usize) -> Option<&[u8]> {
        let start = j.checked_mul(HASH_BYTES)?;
        self.bytes.get(start..start.checked_add(HASH_BYTES)?)
    }

    /// 32-bit word `i`, little-endian
    pub fn word(&self, i: usize) -> u32 {
        read_word(&self.bytes, i * 4)
    }

    /// All 32-bit words, little-endian
    pub fn words(&self) -> Vec<u32> {
        self.bytes
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect()
    }

    /// SHA3-256 of the whole buffer; used in logs and for store integrity checks.
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha3_256::digest(&self.bytes).into()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl core::fmt::Debug for Cache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.bytes.len())
            .field("rows", &self.rows())
            .finish()
    }
}

/// Progress steps reported by [`build_cache_with_progress`] for a cache of `size` bytes.
pub fn cache_build_steps(size: usize) -> u64 {
    let rows = (size / HASH_BYTES) as u64;
    rows.saturating_sub(1) + rows * CACHE_ROUNDS as u64
}

/// Build the cache for `seed`. `size` must be a positive multiple of 64.
pub fn build_cache(seed: &[u8], size: usize) -> Result<Cache> {
    let progress = AtomicU64::new(0);
    build_cache_with_progress(seed, size, &progress)
}

/// Same as [`build_cache`], bumping `progress` once per row written.
pub fn build_cache_with_progress(seed: &[u8], size: usize, progress: &AtomicU64) -> Result<Cache> {
    check_cache_size(size)?;

    let start = Instant::now();
    let rows = size / HASH_BYTES;
    let mut cache = vec![0u8; size];

    tracing::debug!(size, rows, "building aihash cache");

    // Sequential fill
    sha3_512_into(&mut cache[..HASH_BYTES], seed);
    for offset in (HASH_BYTES..size).step_by(HASH_BYTES) {
        let (prev, next) = cache.split_at_mut(offset);
        sha3_512_into(&mut next[..HASH_BYTES], &prev[offset - HASH_BYTES..]);
        progress.fetch_add(1, Ordering::Relaxed);
    }

    // Low-round randmemohash
    let mut temp = [0u8; HASH_BYTES];
    for _ in 0..CACHE_ROUNDS {
        for j in 0..rows {
            let src_off = ((j + rows - 1) % rows) * HASH_BYTES;
            let dst_off = j * HASH_BYTES;
            let xor_off = (read_word(&cache, dst_off) as usize % rows) * HASH_BYTES;

            xor_rows(
                &mut temp,
                &cache[src_off..src_off + HASH_BYTES],
                &cache[xor_off..xor_off + HASH_BYTES],
            );
            sha3_512_into(&mut cache[dst_off..dst_off + HASH_BYTES], &temp);
            progress.fetch_add(1, Ordering::Relaxed);
        }
    }

    tracing::debug!(size, elapsed_ms = start.elapsed().as_millis() as u64, "aihash cache ready");

    Ok(Cache { bytes: cache })
}

/// Byte-swap every 32-bit word in place.
///
/// Converts a buffer of host-order words into canonical little-endian order on
/// big-endian hosts (and back). Length must be a multiple of 4.
pub fn swap_word_order(buffer: &mut [u8]) {
    for word in buffer.chunks_exact_mut(4) {
        word.reverse();
    }
}

/// Encode host words as a canonical little-endian byte buffer.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[inline(always)]
fn read_word(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline(always)]
fn sha3_512_into(dest: &mut [u8], data: &[u8]) {
    let digest = Sha3_512::digest(data);
    dest.copy_from_slice(&digest);
}

#[inline(always)]
fn xor_rows(out: &mut [u8; HASH_BYTES], a: &[u8], b: &[u8]) {
    for ((o, x), y) in out.iter_mut().zip(a).zip(b) {
        *o = x ^ y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AihashError;

    #[test]
    fn test_rejects_bad_sizes() {
        for size in [0, 1, 63, 65, 100] {
            assert_eq!(
                build_cache(&[0u8; 32], size),
                Err(AihashError::InvalidCacheSize { size })
            );
        }
        assert!(Cache::from_bytes(vec![0u8; 96]).is_err());
        assert!(Cache::from_bytes(vec![0u8; 128]).is_ok());
    }

    #[test]
    fn test_single_row_cache() {
        // One row: the mixing rounds xor the row with itself, hash zeros.
        let cache = build_cache(b"seed", 64).unwrap();
        let zeros: [u8; 64] = {
            let mut z = [0u8; 64];
            z.copy_from_slice(&Sha3_512::digest([0u8; 64]));
            z
        };
        assert_eq!(cache.as_bytes(), &zeros);
    }

    #[test]
    fn test_deterministic() {
        let a = build_cache(&[3u8; 32], 64 * 32).unwrap();
        let b = build_cache(&[3u8; 32], 64 * 32).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64 * 32);
        assert_eq!(a.rows(), 32);
    }

    #[test]
    fn test_progress_counts_every_row() {
        let size = 64 * 50;
        let progress = AtomicU64::new(0);
        let cache = build_cache_with_progress(&[1u8; 32], size, &progress).unwrap();
        assert_eq!(progress.load(Ordering::Relaxed), cache_build_steps(size));
        assert_eq!(cache_build_steps(size), 49 + 150);

        // Progress reporting never changes the output
        assert_eq!(cache, build_cache(&[1u8; 32], size).unwrap());
    }

    #[test]
    fn test_word_access_is_little_endian() {
        let mut bytes = vec![0u8; 64];
        bytes[..8].copy_from_slice(&[0x04, 0x03, 0x02, 0x01, 0xAA, 0, 0, 0]);
        let cache = Cache::from_bytes(bytes).unwrap();
        assert_eq!(cache.word(0), 0x0102_0304);
        assert_eq!(cache.word(1), 0xAA);
        assert_eq!(cache.words().len(), 16);
    }

    #[test]
    fn test_big_endian_host_simulation() {
        let cache = build_cache(&[5u8; 32], 64 * 8).unwrap();

        // A big-endian host holding the words natively stores them byte-swapped;
        // normalising that buffer must give back the canonical bytes.
        let mut be_native: Vec<u8> = cache.words().iter().flat_map(|w| w.to_be_bytes()).collect();
        swap_word_order(&mut be_native);
        assert_eq!(be_native, cache.as_bytes());

        assert_eq!(words_to_bytes(&cache.words()), cache.as_bytes());
    }
}
