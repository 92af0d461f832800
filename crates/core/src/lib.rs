//! # Aihash Core Algorithm
//!
//! A memory-hard proof-of-work built from integer matrix multiplication.
//!
//! ## Pipeline
//!
//! - **Seed chain**: each epoch's seed is SHA3-256 of the previous seed and the hashes of
//!   recent blocks, so caches cannot be precomputed far ahead
//! - **Cache**: a SHA3-512 chained fill followed by three data-dependent mixing passes
//! - **Matrix extraction**: a height-specific prime selects a window of the cache, which is
//!   reinterpreted as `mat_num` signed 8-bit square matrices
//! - **Multiplication chain**: the mixing material (header || nonce) picks which matrices
//!   are multiplied over `mul_rounds` rounds
//! - **Digest**: SHA3-256 of the final matrix
//!
//! All matrix arithmetic wraps in two's complement 8-bit, so every platform agrees on the
//! digest bit for bit.
//!
//! ## Example
//!
//! ```rust
//! use aihash_core::{Aihash, AihashConfig, build_cache, meets_difficulty};
//!
//! let config = AihashConfig {
//!     mat_size: 4,
//!     mat_num: 8,
//!     mul_rounds: 4,
//!     epoch_length: 16,
//!     cache_size: 4096,
//! };
//! let engine = Aihash::new(config).unwrap();
//! let cache = build_cache(&[0u8; 32], config.cache_size).unwrap();
//!
//! let digest = engine.hash(5, &[0, 1, 2, 3, 4, 5, 6, 7], &cache).unwrap();
//! let _ = meets_difficulty(&digest, 8);
//!
//! // Mining loops build the matrix list once per height
//! let list = engine.matrix_list(5, &cache).unwrap();
//! assert_eq!(engine.hash_with_list(&list, &[0, 1, 2, 3, 4, 5, 6, 7]).unwrap(), digest);
//! ```

mod aihash;
mod cache;
mod epoch;
mod error;
mod extract;
mod matrix;
mod params;
mod seed;

pub use aihash::{Aihash, hash, meets_difficulty, meets_target};
pub use cache::{
    Cache, build_cache, build_cache_with_progress, cache_build_steps, swap_word_order,
    words_to_bytes,
};
pub use epoch::{CacheStore, EpochCaches, MemoryCacheStore};
pub use error::{AihashError, Result};
pub use extract::{MatrixList, fill_matrix_list, prime_for_height};
pub use matrix::Matrix;
pub use params::*;
pub use seed::{derive_seed, seed_for_epoch};
