//! Aihash Node Library
//!
//! Node-side plumbing around the Aihash proof-of-work.
//!
//! # Overview
//!
//! - [`config`]: JSON node configuration and data directory layout
//! - [`store`]: sled-backed persistence for epoch caches and their seeds
//! - [`miner`]: multi-threaded nonce search and proof verification
//!
//! # Example
//!
//! ```rust
//! use aihash::algorithm::{Aihash, AihashConfig, EpochCaches};
//! use aihash::miner::{difficulty_to_target, header_len, verify, Miner};
//! use std::sync::atomic::AtomicBool;
//!
//! let config = AihashConfig {
//!     mat_size: 4,
//!     mat_num: 8,
//!     mul_rounds: 8,
//!     epoch_length: 16,
//!     cache_size: 4096,
//! };
//! let caches = EpochCaches::in_memory(config).unwrap();
//! let cache = caches.cache_for_height(20, &[1u8; 32]).unwrap();
//!
//! let engine = Aihash::new(config).unwrap();
//! let miner = Miner::new(engine.clone(), &cache, 20).unwrap();
//! let header = vec![0u8; header_len(&engine)];
//! let target = difficulty_to_target(2);
//!
//! let proof = miner
//!     .search(&header, &target, 2, &AtomicBool::new(false))
//!     .unwrap()
//!     .unwrap();
//! assert!(verify(&engine, &cache, 20, &header, &proof, &target).unwrap());
//! ```

// Re-export the core algorithm
pub use aihash_core as algorithm;

pub mod config;
pub mod miner;
pub mod store;

// Convenience re-exports
pub use algorithm::{hash, meets_difficulty, meets_target, Aihash, AihashConfig};
pub use config::{Network, NodeConfig};
pub use miner::{FoundProof, Miner, MinerError};
pub use store::{seeded_cache, DiskCacheStore, OnSeedMismatch, SeedStatus};
