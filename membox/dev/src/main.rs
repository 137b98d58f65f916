use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{bail, ensure, Context};
use clap::Parser;
use membox::util::memory::Mapping;
use membox::{println, MemPool};

/// Stress a membox pool from several threads and report its state
#[derive(Parser, Debug)]
struct Options {
    /// Payload bytes per block
    #[arg(short, long, default_value_t = 32)]
    block_size: u32,

    /// Number of blocks in the pool
    #[arg(short = 'n', long, default_value_t = 1024)]
    blocks: u32,

    /// Worker threads [default: number of CPUs]
    #[arg(short, long)]
    threads: Option<usize>,

    /// Alloc/free steps per thread
    #[arg(short, long, default_value_t = 100_000)]
    iterations: usize,

    /// Dump every block header when done
    #[arg(long, default_value_t = false)]
    dump: bool,
}

fn stress(pool: &MemPool, opts: &Options, threads: usize) -> anyhow::Result<()> {
    let owned = Mutex::new(HashSet::new());
    let results: Vec<anyhow::Result<()>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|t| {
                let owned = &owned;
                s.spawn(move || worker(pool, owned, t, opts.iterations))
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap_or_else(|_| bail!("worker panicked")))
            .collect()
    });
    for r in results {
        r?;
    }
    Ok(())
}

fn worker(
    pool: &MemPool,
    owned: &Mutex<HashSet<usize>>,
    t: usize,
    iterations: usize,
) -> anyhow::Result<()> {
    let stamp = (t % 255) as u8 + 1;
    let mut seed = 0x9e37_79b9_7f4a_7c15u64 ^ (t as u64 + 1);
    let mut live = Vec::new();
    let take = |b: usize, insert: bool| -> anyhow::Result<()> {
        let mut set = owned.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        let ok = if insert { set.insert(b) } else { set.remove(&b) };
        ensure!(ok, "block {:#x} owned twice", b);
        Ok(())
    };
    for _ in 0..iterations {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        if seed % 2 == 0 {
            if let Some(mut b) = pool.alloc() {
                take(b.as_ptr() as usize, true)?;
                b.fill(stamp);
                live.push(b);
            }
        } else if !live.is_empty() {
            let b = live.swap_remove(seed as usize % live.len());
            ensure!(b.iter().all(|x| *x == stamp), "block {:p} overwritten", b.as_ptr());
            take(b.as_ptr() as usize, false)?;
            pool.free(b)?;
        }
    }
    for b in live {
        take(b.as_ptr() as usize, false)?;
        pool.free(b)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let options = Options::parse();
    let threads = options.threads.unwrap_or_else(num_cpus::get).max(1);
    // 1. Map and format the region
    let size = membox::pool::required_size(options.block_size, options.blocks)
        .context("pool size overflows")?;
    let mut mapping = Mapping::new(size)?;
    let pool = MemPool::init(&mut mapping.as_mut_slice()[..size], options.block_size)?;
    ensure!(pool.block_count() == options.blocks, "pool holds {} blocks", pool.block_count());
    println!("{:?}", pool);
    // 2. Hammer it
    let start = Instant::now();
    stress(&pool, &options, threads)?;
    let elapsed = start.elapsed();
    // 3. Everything must be back on the free list
    let stats = pool.stats();
    ensure!(stats.allocated_blocks == 0, "{} blocks leaked", stats.allocated_blocks);
    ensure!(
        pool.free_count() == stats.total_blocks,
        "free list holds {} of {} blocks",
        pool.free_count(),
        stats.total_blocks
    );
    println!(
        "{} threads x {} steps in {:?}: {:?}",
        threads, options.iterations, elapsed, stats
    );
    membox::stat::report();
    if options.dump {
        pool.dump();
    }
    Ok(())
}
