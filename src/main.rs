//! Aihash Node CLI
//!
//! # Commands
//!
//! - `init` - Create the data directory and config
//! - `seed` - Derive the next epoch seed
//! - `cache` - Build and persist an epoch cache
//! - `hash` - Compute a single digest
//! - `verify` - Check a proof
//! - `mine` - Search for a proof (multi-threaded)
//! - `epochs` - List stored epoch caches
//! - `benchmark` - Run performance benchmark

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use aihash::algorithm::{
    build_cache, cache_build_steps, derive_seed, Aihash, Cache, EpochCaches, SEED_BYTES,
};
use aihash::config::{default_data_dir, Network, NodeConfig};
use aihash::miner::{difficulty_to_target, header_len, verify, FoundProof, Miner};
use aihash::store::{seeded_cache, DiskCacheStore, OnSeedMismatch, SeedStatus};

#[derive(Parser)]
#[command(name = "aihash")]
#[command(author = "Aihash Developers")]
#[command(version = "0.1.0")]
#[command(about = "Aihash matrix proof-of-work node")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Custom data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use testnet parameters
    #[arg(long, global = true)]
    testnet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and default config
    Init,

    /// Derive an epoch seed from the previous seed and recent block hashes
    Seed {
        /// Previous epoch seed (hex)
        #[arg(long)]
        previous: String,

        /// Recent block hash (hex), repeatable
        #[arg(long = "block")]
        blocks: Vec<String>,
    },

    /// Build and store the cache for an epoch
    Cache {
        #[arg(long)]
        epoch: u64,

        /// Epoch seed (hex)
        #[arg(long)]
        seed: String,

        /// Keep only this many newest epochs after building
        #[arg(long)]
        keep: Option<usize>,

        /// Replace an epoch already stored under a different seed
        #[arg(long)]
        rebuild: bool,
    },

    /// Compute the digest for a height and mixing material
    Hash {
        #[arg(long)]
        height: u64,

        /// Epoch seed (hex)
        #[arg(long)]
        seed: String,

        /// Mixing material (hex)
        #[arg(long)]
        material: String,
    },

    /// Verify a proof
    Verify {
        #[arg(long)]
        height: u64,

        /// Epoch seed (hex)
        #[arg(long)]
        seed: String,

        /// Block header (hex)
        #[arg(long)]
        header: String,

        #[arg(long)]
        nonce: u64,

        /// Claimed digest (hex)
        #[arg(long)]
        digest: String,

        /// Required leading zero bits (default: from config)
        #[arg(short, long)]
        difficulty: Option<u32>,
    },

    /// Search for a nonce meeting the difficulty
    Mine {
        #[arg(long)]
        height: u64,

        /// Epoch seed (hex)
        #[arg(long)]
        seed: String,

        /// Block header (hex, default: zeros of the required length)
        #[arg(long)]
        header: Option<String>,

        /// Number of threads to use (default: config, then number of CPU cores)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Target difficulty (number of leading zero bits)
        #[arg(short, long)]
        difficulty: Option<u32>,
    },

    /// List stored epoch caches
    Epochs,

    /// Run performance benchmark
    Benchmark {
        /// Number of hashes to compute
        #[arg(short, long, default_value = "100")]
        count: u32,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("aihash=info,aihash_core=info")
            }),
        )
        .init();

    let cli = Cli::parse();
    let network = if cli.testnet {
        Network::Testnet
    } else {
        Network::Mainnet
    };
    let data_dir = cli.data_dir.unwrap_or_else(|| default_data_dir(network));

    let result = match cli.command {
        Commands::Init => cmd_init(data_dir, network),
        Commands::Seed { previous, blocks } => cmd_seed(&previous, &blocks),
        Commands::Cache {
            epoch,
            seed,
            keep,
            rebuild,
        } => load_config(data_dir, network)
            .and_then(|c| cmd_cache(&c, epoch, &seed, keep, rebuild)),
        Commands::Hash {
            height,
            seed,
            material,
        } => load_config(data_dir, network).and_then(|c| cmd_hash(&c, height, &seed, &material)),
        Commands::Verify {
            height,
            seed,
            header,
            nonce,
            digest,
            difficulty,
        } => load_config(data_dir, network).and_then(|c| {
            cmd_verify(&c, height, &seed, &header, nonce, &digest, difficulty)
        }),
        Commands::Mine {
            height,
            seed,
            header,
            threads,
            difficulty,
        } => load_config(data_dir, network)
            .and_then(|c| cmd_mine(&c, height, &seed, header.as_deref(), threads, difficulty)),
        Commands::Epochs => load_config(data_dir, network).and_then(|c| cmd_epochs(&c)),
        Commands::Benchmark { count } => {
            load_config(data_dir, network).and_then(|c| cmd_benchmark(&c, count))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(data_dir: PathBuf, network: Network) -> anyhow::Result<NodeConfig> {
    NodeConfig::load_or_default(&data_dir, network)
        .with_context(|| format!("Failed to load config from {}", data_dir.display()))
}

fn open_caches(config: &NodeConfig) -> anyhow::Result<EpochCaches<DiskCacheStore>> {
    let path = config.cache_db_path();
    let store = DiskCacheStore::open(&path)
        .with_context(|| format!("Failed to open cache database at {}", path.display()))?;
    Ok(EpochCaches::new(config.aihash, store)?)
}

/// Cache for the epoch of `height`, refusing to reuse one built from another seed
fn epoch_cache(
    caches: &EpochCaches<DiskCacheStore>,
    height: u64,
    seed: &[u8; SEED_BYTES],
) -> anyhow::Result<Arc<Cache>> {
    let epoch = caches.config().epoch(height);
    seeded_cache(caches, epoch, seed, OnSeedMismatch::Reject).with_context(|| {
        format!("Rebuild epoch {} with 'aihash cache --rebuild' to use this seed", epoch)
    })
}

fn parse_hex(label: &str, value: &str) -> anyhow::Result<Vec<u8>> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).with_context(|| format!("Invalid hex for {}", label))
}

fn parse_hex32(label: &str, value: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = parse_hex(label, value)?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("{} must be 32 bytes, got {}", label, b.len()))
}

fn cmd_init(data_dir: PathBuf, network: Network) -> anyhow::Result<()> {
    let config = NodeConfig::new(network, &data_dir);
    let path = config.config_path();

    if path.exists() {
        tracing::info!(path = %path.display(), "config already exists, leaving it untouched");
        return Ok(());
    }

    config
        .save()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Initialized {} node", network);
    println!("Data dir: {}", data_dir.display());
    println!("Config:   {}", path.display());

    Ok(())
}

fn cmd_seed(previous: &str, blocks: &[String]) -> anyhow::Result<()> {
    let previous = parse_hex32("previous seed", previous)?;
    let blocks = blocks
        .iter()
        .map(|b| parse_hex32("block hash", b))
        .collect::<anyhow::Result<Vec<_>>>()?;

    println!("{}", hex::encode(derive_seed(&previous, &blocks)));

    Ok(())
}

fn cmd_cache(
    config: &NodeConfig,
    epoch: u64,
    seed_hex: &str,
    keep: Option<usize>,
    rebuild: bool,
) -> anyhow::Result<()> {
    let seed = parse_hex32("seed", seed_hex)?;
    let caches = open_caches(config)?;
    let on_mismatch = if rebuild {
        OnSeedMismatch::Rebuild
    } else {
        OnSeedMismatch::Reject
    };

    match caches.store().seed_status(epoch, &seed)? {
        SeedStatus::Stored => println!("Epoch {} already stored", epoch),
        SeedStatus::Conflict if !rebuild => anyhow::bail!(
            "Epoch {} is stored under a different seed; pass --rebuild to replace it",
            epoch
        ),
        SeedStatus::Missing | SeedStatus::Conflict => {
            let total = cache_build_steps(config.aihash.cache_size);
            let start = Instant::now();
            println!(
                "Building epoch {} cache ({} KB)...",
                epoch,
                config.aihash.cache_size / 1024
            );

            let cache = std::thread::scope(|scope| {
                let handle = scope.spawn(|| seeded_cache(&caches, epoch, &seed, on_mismatch));
                while !handle.is_finished() {
                    std::thread::sleep(Duration::from_millis(200));
                    let done = caches.progress(epoch).unwrap_or(0);
                    print!("\rProgress: {:.1}%", done as f64 * 100.0 / total as f64);
                    std::io::stdout().flush().ok();
                }
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("cache build thread panicked"))
            })??;

            println!("\rProgress: 100.0%");
            println!("Built in {:.2}s", start.elapsed().as_secs_f64());
            println!("Fingerprint: {}", hex::encode(cache.fingerprint()));
        }
    }

    let store = caches.store();
    if let Some(keep) = keep {
        for removed in store.prune(keep)? {
            println!("Pruned epoch {}", removed);
        }
    }
    store.flush()?;

    Ok(())
}

fn cmd_hash(
    config: &NodeConfig,
    height: u64,
    seed_hex: &str,
    material_hex: &str,
) -> anyhow::Result<()> {
    let seed = parse_hex32("seed", seed_hex)?;
    let material = parse_hex("material", material_hex)?;

    let caches = open_caches(config)?;
    let cache = epoch_cache(&caches, height, &seed)?;
    let digest = Aihash::new(config.aihash)?.hash(height, &material, &cache)?;

    println!("{}", hex::encode(digest));

    Ok(())
}

fn cmd_verify(
    config: &NodeConfig,
    height: u64,
    seed_hex: &str,
    header_hex: &str,
    nonce: u64,
    digest_hex: &str,
    difficulty: Option<u32>,
) -> anyhow::Result<()> {
    let seed = parse_hex32("seed", seed_hex)?;
    let header = parse_hex("header", header_hex)?;
    let digest = parse_hex32("digest", digest_hex)?;
    let difficulty = difficulty.unwrap_or(config.mining.difficulty);

    let caches = open_caches(config)?;
    let cache = epoch_cache(&caches, height, &seed)?;
    let engine = Aihash::new(config.aihash)?;
    let proof = FoundProof { nonce, digest };

    if verify(&engine, &cache, height, &header, &proof, &difficulty_to_target(difficulty))? {
        println!("Valid proof ({} bits)", difficulty);
        Ok(())
    } else {
        anyhow::bail!("Invalid proof")
    }
}

fn cmd_mine(
    config: &NodeConfig,
    height: u64,
    seed_hex: &str,
    header_hex: Option<&str>,
    threads: Option<usize>,
    difficulty: Option<u32>,
) -> anyhow::Result<()> {
    let seed = parse_hex32("seed", seed_hex)?;
    let engine = Aihash::new(config.aihash)?;
    let header = match header_hex {
        Some(h) => parse_hex("header", h)?,
        None => vec![0u8; header_len(&engine)],
    };
    let difficulty = difficulty.unwrap_or(config.mining.difficulty);
    let num_threads = threads
        .or(config.mining.threads)
        .unwrap_or_else(num_cpus::get);

    let caches = open_caches(config)?;
    let cache = epoch_cache(&caches, height, &seed)?;
    let miner = Miner::new(engine, &cache, height)?;
    let target = difficulty_to_target(difficulty);

    println!("\n=== Aihash Miner ===");
    println!("Network:    {}", config.network);
    println!("Height:     {}", height);
    println!("Epoch:      {}", config.aihash.epoch(height));
    println!("Difficulty: {} bits", difficulty);
    println!("Threads:    {}", num_threads);
    println!("Seed:       {}", hex::encode(seed));
    println!("====================\n");

    let stop = AtomicBool::new(false);
    let start = Instant::now();

    let found = std::thread::scope(|scope| {
        let handle = scope.spawn(|| miner.search(&header, &target, num_threads, &stop));

        // Monitor progress while threads work
        let mut last_report = Instant::now();
        while !handle.is_finished() {
            std::thread::sleep(Duration::from_millis(100));
            if last_report.elapsed() >= Duration::from_secs(2) {
                let elapsed = start.elapsed().as_secs_f64();
                print!(
                    "\rHashrate: {:.0} H/s | Hashes: {} | Time: {:.0}s",
                    miner.hashes() as f64 / elapsed,
                    miner.hashes(),
                    elapsed
                );
                std::io::stdout().flush().ok();
                last_report = Instant::now();
            }
        }
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("mining thread panicked"))
    })??;

    let Some(proof) = found else {
        println!("\nStopped without a proof");
        return Ok(());
    };

    let elapsed = start.elapsed().as_secs_f64();
    println!("\n\nFound valid proof!");
    println!("  Digest: {}", hex::encode(proof.digest));
    println!("  Nonce:  {}", proof.nonce);
    println!(
        "  Hashes: {} ({:.0} H/s)",
        miner.hashes(),
        miner.hashes() as f64 / elapsed
    );
    println!("\nTo verify this proof, run:");
    println!(
        concat!(
            "  aihash{} verify --height {} --seed {} --header {}",
            " --nonce {} --digest {} --difficulty {}"
        ),
        if config.network == Network::Testnet { " --testnet" } else { "" },
        height,
        hex::encode(seed),
        hex::encode(&header),
        proof.nonce,
        hex::encode(proof.digest),
        difficulty
    );

    Ok(())
}

fn cmd_epochs(config: &NodeConfig) -> anyhow::Result<()> {
    let caches = open_caches(config)?;
    let store = caches.store();
    let epochs = store.epochs()?;

    if epochs.is_empty() {
        println!("No epoch caches stored in {}", config.cache_db_path().display());
        return Ok(());
    }

    for epoch in epochs {
        let seed = store
            .get_seed(epoch)?
            .map(hex::encode)
            .unwrap_or_else(|| "-".to_string());
        println!("{:>8}  {}", epoch, seed);
    }

    Ok(())
}

fn cmd_benchmark(config: &NodeConfig, count: u32) -> anyhow::Result<()> {
    let params = config.aihash;
    let engine = Aihash::new(params)?;

    println!("Building {} KB cache...", params.cache_size / 1024);
    let start = Instant::now();
    let cache = build_cache(&[0u8; SEED_BYTES], params.cache_size)?;
    let build_time = start.elapsed();

    println!("Running benchmark with {} hashes...", count);

    let list = engine.matrix_list(1, &cache)?;
    let mut material = vec![0u8; params.mixing_material_len().max(8)];
    let offset = material.len() - 8;

    let start = Instant::now();

    for i in 0..count as u64 {
        material[offset..].copy_from_slice(&i.to_le_bytes());
        let _ = engine.hash_with_list(&list, &material)?;
    }

    let elapsed = start.elapsed();
    let hashrate = count as f64 / elapsed.as_secs_f64();

    println!("\nResults:");
    println!("  Cache build:  {:.2}s", build_time.as_secs_f64());
    println!("  Total hashes: {}", count);
    println!("  Time elapsed: {:.2}s", elapsed.as_secs_f64());
    println!("  Hashrate: {:.2} H/s", hashrate);

    println!("\nAlgorithm parameters ({}):", config.network);
    println!("  Matrix size: {}x{}", params.mat_size, params.mat_size);
    println!("  Matrices: {}", params.mat_num);
    println!("  Multiplication rounds: {}", params.mul_rounds);
    println!("  Epoch length: {}", params.epoch_length);
    println!("  Cache: {} KB", params.cache_size / 1024);

    Ok(())
}
