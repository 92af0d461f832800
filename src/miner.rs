//! Multi-threaded nonce search and proof verification
//!
//! Mixing material for a nonce is `header || nonce` (8 bytes, little-endian). Only the first
//! `2·mul_rounds` bytes of the material select matrices, so the header must be exactly
//! [`header_len`] bytes: anything longer would push the nonce out of that window and make
//! every nonce hash alike. The matrix list for the height is built once and shared by every
//! worker; verification recomputes from scratch through [`Aihash::hash`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::algorithm::{meets_target, Aihash, AihashError, Cache, MatrixList, DIGEST_BYTES};

/// Bytes appended to the header for the nonce
pub const NONCE_BYTES: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MinerError {
    #[error("Header must be exactly {expected} bytes, got {actual}")]
    HeaderLength { expected: usize, actual: usize },

    #[error(transparent)]
    Aihash(#[from] AihashError),
}

pub type Result<T> = std::result::Result<T, MinerError>;

/// A valid proof found by a mining thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundProof {
    pub nonce: u64,
    #[serde(with = "hex_digest")]
    pub digest: [u8; DIGEST_BYTES],
}

/// Nonce search at a fixed height
pub struct Miner {
    engine: Aihash,
    list: MatrixList,
    hashes: AtomicU64,
}

impl Miner {
    /// Prepare the matrix list for `height`
    pub fn new(engine: Aihash, cache: &Cache, height: u64) -> Result<Self> {
        let list = engine.matrix_list(height, cache)?;
        Ok(Self {
            engine,
            list,
            hashes: AtomicU64::new(0),
        })
    }

    pub fn height(&self) -> u64 {
        self.list.height()
    }

    /// Total digests computed across all searches
    pub fn hashes(&self) -> u64 {
        self.hashes.load(Ordering::Relaxed)
    }

    /// Digest for a single nonce
    pub fn hash_nonce(&self, header: &[u8], nonce: u64) -> Result<[u8; DIGEST_BYTES]> {
        check_header(&self.engine, header)?;
        let material = mixing_material(header, nonce);
        Ok(self.engine.hash_with_list(&self.list, &material)?)
    }

    /// Search nonces until one meets `target` or `stop` is raised.
    ///
    /// Worker `t` of `threads` tries `t, t + threads, t + 2·threads, …`.
    pub fn search(
        &self,
        header: &[u8],
        target: &[u8; DIGEST_BYTES],
        threads: usize,
        stop: &AtomicBool,
    ) -> Result<Option<FoundProof>> {
        check_header(&self.engine, header)?;
        let threads = threads.max(1);
        let found = Mutex::new(None::<FoundProof>);
        let failure = Mutex::new(None::<AihashError>);

        std::thread::scope(|scope| {
            for thread_id in 0..threads {
                let found = &found;
                let failure = &failure;
                scope.spawn(move || {
                    let mut material = Vec::with_capacity(header.len() + NONCE_BYTES);
                    let mut nonce = thread_id as u64;

                    while !stop.load(Ordering::Relaxed) {
                        material.clear();
                        material.extend_from_slice(header);
                        material.extend_from_slice(&nonce.to_le_bytes());

                        let digest = match self.engine.hash_with_list(&self.list, &material) {
                            Ok(digest) => digest,
                            Err(e) => {
                                let mut guard =
                                    failure.lock().unwrap_or_else(PoisonError::into_inner);
                                if guard.is_none() {
                                    *guard = Some(e);
                                }
                                stop.store(true, Ordering::SeqCst);
                                return;
                            }
                        };
                        self.hashes.fetch_add(1, Ordering::Relaxed);

                        if meets_target(&digest, target) {
                            let mut guard = found.lock().unwrap_or_else(PoisonError::into_inner);
                            if guard.is_none() {
                                *guard = Some(FoundProof { nonce, digest });
                                stop.store(true, Ordering::SeqCst);
                            }
                            return;
                        }

                        nonce = nonce.wrapping_add(threads as u64);
                    }
                });
            }
        });

        if let Some(e) = failure.into_inner().unwrap_or_else(PoisonError::into_inner) {
            return Err(e.into());
        }
        let proof = found.into_inner().unwrap_or_else(PoisonError::into_inner);
        if let Some(proof) = &proof {
            tracing::info!(
                height = self.height(),
                nonce = proof.nonce,
                hashes = self.hashes(),
                "found proof"
            );
        }
        Ok(proof)
    }
}

/// Recompute the digest for `proof` and check it against `target`
pub fn verify(
    engine: &Aihash,
    cache: &Cache,
    height: u64,
    header: &[u8],
    proof: &FoundProof,
    target: &[u8; DIGEST_BYTES],
) -> Result<bool> {
    check_header(engine, header)?;
    let digest = engine.hash(height, &mixing_material(header, proof.nonce), cache)?;
    Ok(digest == proof.digest && meets_target(&digest, target))
}

/// Target whose passing digests have at least `bits` leading zero bits
pub fn difficulty_to_target(bits: u32) -> [u8; DIGEST_BYTES] {
    if bits == 0 {
        return [0xFF; DIGEST_BYTES];
    }
    let mut target = [0u8; DIGEST_BYTES];
    let bits = bits as usize;
    if bits > DIGEST_BYTES * 8 {
        return target;
    }
    // digest < 2^(256 - bits)
    let bit = DIGEST_BYTES * 8 - bits;
    let byte = DIGEST_BYTES - 1 - bit / 8;
    target[byte] = 1 << (bit % 8);
    target
}

/// Header length accepted for `engine`: the index window minus the nonce.
///
/// When `2·mul_rounds < 8` this is zero and only the low `2·mul_rounds` nonce bytes count.
pub fn header_len(engine: &Aihash) -> usize {
    engine
        .config()
        .mixing_material_len()
        .saturating_sub(NONCE_BYTES)
}

/// `header || nonce` as little-endian bytes
pub fn mixing_material(header: &[u8], nonce: u64) -> Vec<u8> {
    let mut material = Vec::with_capacity(header.len() + NONCE_BYTES);
    material.extend_from_slice(header);
    material.extend_from_slice(&nonce.to_le_bytes());
    material
}

fn check_header(engine: &Aihash, header: &[u8]) -> Result<()> {
    let expected = header_len(engine);
    if header.len() != expected {
        return Err(MinerError::HeaderLength {
            expected,
            actual: header.len(),
        });
    }
    Ok(())
}

mod hex_digest {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::algorithm::DIGEST_BYTES;

    pub fn serialize<S: Serializer>(digest: &[u8; DIGEST_BYTES], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; DIGEST_BYTES], D::Error> {
        let s = String::deserialize(d)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("digest must be 32 bytes"))
    }
}
