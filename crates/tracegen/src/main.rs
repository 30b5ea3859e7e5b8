mod zipfian;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;
use zipfian::ZipfianGenerator;

/// Synthetic access-trace generator — Zipfian request streams for the
/// cache topology simulator.
///
/// Emits newline-delimited `<size> <url>` records, the layout the
/// simulator's default formatter parses.
#[derive(Parser)]
#[command(name = "tracegen")]
struct Args {
    /// Number of request lines to emit
    #[arg(long, default_value_t = 100_000)]
    requests: u64,

    /// Number of unique items in the dataset
    #[arg(long, default_value_t = 10_000)]
    num_items: u64,

    /// Zipfian alpha (skewness)
    #[arg(long, default_value_t = 0.8)]
    alpha: f64,

    /// Smallest object size in bytes
    #[arg(long, default_value_t = 1_000)]
    min_size: u64,

    /// Largest object size in bytes
    #[arg(long, default_value_t = 100_000)]
    max_size: u64,

    /// RNG seed for reproducible traces
    #[arg(long)]
    seed: Option<u64>,

    /// Output file (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Stable per-item size: an RNG seeded with the item id, so the same item
/// always has the same byte size no matter how often or in which trace it
/// appears.
fn item_size(id: u64, min_size: u64, max_size: u64) -> u64 {
    StdRng::seed_from_u64(id).gen_range(min_size..=max_size)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    ensure!(
        args.min_size <= args.max_size,
        "min size must not exceed max size"
    );
    ensure!(args.num_items > 0, "num items must be greater than 0");

    let mut generator = ZipfianGenerator::new(args.num_items, args.alpha, args.seed);

    let mut out: BufWriter<Box<dyn Write>> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            BufWriter::new(Box::new(file))
        }
        None => BufWriter::new(Box::new(io::stdout())),
    };

    tracing::info!(
        requests = args.requests,
        num_items = args.num_items,
        alpha = args.alpha,
        seed = ?args.seed,
        "generating trace"
    );

    for _ in 0..args.requests {
        let id = generator.next_id();
        let size = item_size(id, args.min_size, args.max_size);
        writeln!(out, "{size} /api/items/{id}")?;
    }
    out.flush()?;

    tracing::info!("trace complete");
    Ok(())
}
