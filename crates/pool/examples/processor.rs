//! Processor pool example
//!
//! An expensive-to-construct processor is pooled and reused across scoped
//! leases. Run with `RUST_LOG=reservoir_pool=debug` to watch the pool decide
//! between reuse and construction.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use reservoir_pool::{Pool, Result, from_async};
use tracing_subscriber::EnvFilter;

static CONSTRUCTED: AtomicU32 = AtomicU32::new(0);

/// Simulates a processor with a slow constructor.
#[derive(Debug)]
struct Processor {
    id: u32,
}

impl Processor {
    async fn new() -> Result<Self> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let id = CONSTRUCTED.fetch_add(1, Ordering::SeqCst) + 1;
        println!("Complex constructor is being performed (processor #{id})");
        Ok(Self { id })
    }

    fn process(&self, work: &str) {
        println!("Processor #{} processing: {work}", self.id);
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Processor Pool Example ===\n");

    let pool = Pool::builder()
        .name("processors")
        .max_size(4)
        .acquire_timeout(Duration::from_secs(5))
        .factory(from_async(Processor::new))
        .build()?;

    // Held for the whole run, so its processor is not available to the
    // leases below.
    let processor1 = pool.acquire().await?;
    processor1.process("1: the first work!");

    {
        let processor2 = pool.acquire().await?;
        processor2.process("2: the second work!");
    } // returned to the pool here

    {
        // Reuses processor2's instance without constructing a new one.
        let processor3 = pool.acquire().await?;
        processor3.process("3: the third work!");
    }

    drop(processor1);

    let stats = pool.stats();
    println!(
        "\nConstructed {} processors for {} acquisitions ({} idle)",
        stats.created, stats.total_acquisitions, stats.idle
    );

    pool.shutdown();
    Ok(())
}
