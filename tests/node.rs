//! End-to-end: persisted epoch caches feeding the miner and verifier

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use aihash::algorithm::{build_cache, Aihash, AihashConfig, AihashError, CacheStore, EpochCaches};
use aihash::miner::{difficulty_to_target, header_len, mixing_material, verify, Miner};
use aihash::{seeded_cache, DiskCacheStore, Network, NodeConfig, OnSeedMismatch, SeedStatus};

fn params() -> AihashConfig {
    AihashConfig {
        mat_size: 4,
        mat_num: 16,
        mul_rounds: 8,
        epoch_length: 32,
        cache_size: 8192,
    }
}

#[test]
fn test_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("caches");
    let seed = [0x42u8; 32];

    let fingerprint = {
        let caches = EpochCaches::new(params(), DiskCacheStore::open(&path).unwrap()).unwrap();
        let cache = caches.cache_for_height(70, &seed).unwrap();
        caches.store().put_seed(2, &seed).unwrap();
        caches.store().flush().unwrap();
        assert_eq!(caches.builds(), 1);
        cache.fingerprint()
    };

    let caches = EpochCaches::new(params(), DiskCacheStore::open(&path).unwrap()).unwrap();
    let cache = caches.get_or_build(2, &seed).unwrap();
    assert_eq!(caches.builds(), 0);
    assert_eq!(cache.fingerprint(), fingerprint);
    assert_eq!(*cache, build_cache(&seed, params().cache_size).unwrap());
    assert_eq!(caches.store().get_seed(2).unwrap(), Some(seed));
    assert_eq!(caches.store().epochs().unwrap(), vec![2]);
}

#[test]
fn test_concurrent_disk_builds_share_one() {
    let dir = tempfile::tempdir().unwrap();
    let store = DiskCacheStore::open(dir.path().join("caches")).unwrap();
    let caches = Arc::new(EpochCaches::new(params(), store).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let caches = Arc::clone(&caches);
            std::thread::spawn(move || caches.get_or_build(5, &[1u8; 32]).unwrap())
        })
        .collect();
    let fingerprints: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().fingerprint())
        .collect();

    assert_eq!(caches.builds(), 1);
    assert!(fingerprints.iter().all(|f| *f == fingerprints[0]));
    assert!(caches.store().get(5).unwrap().is_some());
}

fn open_disk(dir: &tempfile::TempDir) -> EpochCaches<DiskCacheStore> {
    let store = DiskCacheStore::open(dir.path().join("caches")).unwrap();
    EpochCaches::new(params(), store).unwrap()
}

#[test]
fn test_seeded_cache_reuses_matching_seed() {
    let dir = tempfile::tempdir().unwrap();
    let seed = [0x11u8; 32];

    let fingerprint = {
        let caches = open_disk(&dir);
        let cache = seeded_cache(&caches, 3, &seed, OnSeedMismatch::Reject).unwrap();
        assert_eq!(caches.builds(), 1);
        cache.fingerprint()
    };

    let caches = open_disk(&dir);
    assert_eq!(caches.store().seed_status(3, &seed).unwrap(), SeedStatus::Stored);
    let cache = seeded_cache(&caches, 3, &seed, OnSeedMismatch::Reject).unwrap();
    assert_eq!(caches.builds(), 0);
    assert_eq!(cache.fingerprint(), fingerprint);
}

#[test]
fn test_seeded_cache_rejects_other_seed() {
    let dir = tempfile::tempdir().unwrap();
    let caches = open_disk(&dir);
    let (old, new) = ([0x11u8; 32], [0x22u8; 32]);

    let stored = seeded_cache(&caches, 3, &old, OnSeedMismatch::Reject).unwrap();
    assert_eq!(caches.store().seed_status(3, &new).unwrap(), SeedStatus::Conflict);
    assert_eq!(
        seeded_cache(&caches, 3, &new, OnSeedMismatch::Reject),
        Err(AihashError::SeedMismatch { epoch: 3 })
    );

    // a second attempt with the other seed leaves the label and cache alone
    assert!(seeded_cache(&caches, 3, &new, OnSeedMismatch::Reject).is_err());
    assert_eq!(caches.store().get_seed(3).unwrap(), Some(old));
    assert_eq!(
        caches.store().get(3).unwrap().unwrap().fingerprint(),
        stored.fingerprint()
    );
    assert_eq!(caches.builds(), 1);
}

#[test]
fn test_seeded_cache_rebuilds_other_seed() {
    let dir = tempfile::tempdir().unwrap();
    let caches = open_disk(&dir);
    let (old, new) = ([0x11u8; 32], [0x22u8; 32]);

    seeded_cache(&caches, 3, &old, OnSeedMismatch::Reject).unwrap();
    let rebuilt = seeded_cache(&caches, 3, &new, OnSeedMismatch::Rebuild).unwrap();

    assert_eq!(*rebuilt, build_cache(&new, params().cache_size).unwrap());
    assert_eq!(caches.store().get_seed(3).unwrap(), Some(new));
    assert_eq!(caches.store().seed_status(3, &new).unwrap(), SeedStatus::Stored);
    assert_eq!(caches.builds(), 2);
}

#[test]
fn test_unlabelled_cache_is_not_claimed() {
    let dir = tempfile::tempdir().unwrap();
    let caches = open_disk(&dir);
    let seed = [0x33u8; 32];

    let foreign = Arc::new(build_cache(&[0x44u8; 32], params().cache_size).unwrap());
    caches.store().put(6, foreign).unwrap();

    assert_eq!(
        seeded_cache(&caches, 6, &seed, OnSeedMismatch::Reject),
        Err(AihashError::SeedMismatch { epoch: 6 })
    );
    assert_eq!(caches.store().get_seed(6).unwrap(), None);

    let cache = seeded_cache(&caches, 6, &seed, OnSeedMismatch::Rebuild).unwrap();
    assert_eq!(*cache, build_cache(&seed, params().cache_size).unwrap());
    assert_eq!(caches.store().get_seed(6).unwrap(), Some(seed));
}

#[test]
fn test_mine_then_verify() {
    let config = params();
    let caches = EpochCaches::in_memory(config).unwrap();
    let height = 45;
    let cache = caches.cache_for_height(height, &[7u8; 32]).unwrap();

    let engine = Aihash::new(config).unwrap();
    let miner = Miner::new(engine.clone(), &cache, height).unwrap();
    let header: Vec<u8> = (0..header_len(&engine) as u8).collect();
    let target = difficulty_to_target(5);

    let proof = miner
        .search(&header, &target, 3, &AtomicBool::new(false))
        .unwrap()
        .expect("difficulty 5 is always reachable");

    // verifier path recomputes the list from the cache
    assert_eq!(
        engine
            .hash(height, &mixing_material(&header, proof.nonce), &cache)
            .unwrap(),
        proof.digest
    );
    assert!(verify(&engine, &cache, height, &header, &proof, &target).unwrap());

    // another epoch's cache does not verify
    let other = caches.cache_for_height(height + 32, &[8u8; 32]).unwrap();
    assert!(!verify(&engine, &other, height, &header, &proof, &target).unwrap());
}

#[test]
fn test_node_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig::new(Network::Testnet, dir.path());
    config.save().unwrap();

    let loaded = NodeConfig::load_or_default(dir.path(), Network::Mainnet).unwrap();
    assert_eq!(loaded.network, Network::Testnet);
    assert_eq!(loaded.aihash, AihashConfig::testnet());
    assert_eq!(loaded.cache_db_path(), dir.path().join("caches"));
}
