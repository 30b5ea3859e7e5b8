mod cases;
mod driver;
mod provider;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cases::LayerConfig;

/// Multi-tier HTTP cache topology simulator.
///
/// Replays a request stream through a simulated cache topology and reports
/// per-proxy hit ratios, eviction-driven cache usage, and inter-tier
/// routing counts.
#[derive(Parser)]
#[command(name = "stratus-sim")]
struct Cli {
    /// Interval between metric snapshots, in processed requests
    #[arg(long, global = true, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    step_interval: u64,

    /// Request-stream provider (available: file)
    #[arg(short = 'p', long, global = true, default_value = "file")]
    provider: String,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Directory receiving per-proxy step records
    #[arg(long, global = true, default_value = "steps")]
    steps_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One layer of proxies in front of a shared origin
    #[command(name = "1layer", visible_alias = "1l")]
    OneLayer {
        /// Amount of proxies
        #[arg(short = 'a', long)]
        amount: usize,

        /// Cache size of each proxy, in bytes
        #[arg(short = 'c', long)]
        cache_size: u64,

        /// Source files handed to the provider
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// One layer of proxies sharding requests onto each other
    #[command(name = "1layer-sharded", visible_alias = "1ls")]
    OneLayerSharded {
        /// Amount of proxies
        #[arg(short = 'a', long)]
        amount: usize,

        /// Cache size of each proxy, in bytes
        #[arg(short = 'c', long)]
        cache_size: u64,

        /// Source files handed to the provider
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Two layers of proxies wired pairwise
    #[command(name = "2layer", visible_alias = "2l")]
    TwoLayer {
        /// Amount of proxies in the first layer
        #[arg(short = 'f', long)]
        first_amount: usize,

        /// Cache size of first-layer proxies, in bytes
        #[arg(short = 'F', long)]
        first_cache_size: u64,

        /// Amount of proxies in the second layer
        #[arg(short = 's', long)]
        second_amount: usize,

        /// Cache size of second-layer proxies, in bytes
        #[arg(short = 'S', long)]
        second_cache_size: u64,

        /// Source files handed to the provider
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Two layers, the first sharding onto the second
    #[command(name = "2layer-sharded", visible_alias = "2lsh")]
    TwoLayerSharded {
        /// Amount of proxies in the first layer
        #[arg(short = 'f', long)]
        first_amount: usize,

        /// Cache size of first-layer proxies, in bytes
        #[arg(short = 'F', long)]
        first_cache_size: u64,

        /// Amount of proxies in the second layer
        #[arg(short = 's', long)]
        second_amount: usize,

        /// Cache size of second-layer proxies, in bytes
        #[arg(short = 'S', long)]
        second_cache_size: u64,

        /// Source files handed to the provider
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON results on stdout stay machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (mut setup, sources) = match cli.command {
        Command::OneLayer {
            amount,
            cache_size,
            sources,
        } => (cases::one_layer(LayerConfig { amount, cache_size })?, sources),
        Command::OneLayerSharded {
            amount,
            cache_size,
            sources,
        } => (
            cases::one_layer_sharded(LayerConfig { amount, cache_size })?,
            sources,
        ),
        Command::TwoLayer {
            first_amount,
            first_cache_size,
            second_amount,
            second_cache_size,
            sources,
        } => (
            cases::two_layer(
                LayerConfig {
                    amount: first_amount,
                    cache_size: first_cache_size,
                },
                LayerConfig {
                    amount: second_amount,
                    cache_size: second_cache_size,
                },
            )?,
            sources,
        ),
        Command::TwoLayerSharded {
            first_amount,
            first_cache_size,
            second_amount,
            second_cache_size,
            sources,
        } => (
            cases::two_layer_sharded(
                LayerConfig {
                    amount: first_amount,
                    cache_size: first_cache_size,
                },
                LayerConfig {
                    amount: second_amount,
                    cache_size: second_cache_size,
                },
            )?,
            sources,
        ),
    };

    let mut receiver = provider::spawn(&cli.provider, sources, provider::Formatter::from_env())?;

    tracing::info!(
        fronts = setup.fronts.len(),
        proxies = setup.proxies.len(),
        step_interval = cli.step_interval,
        provider = %cli.provider,
        "simulation starting"
    );

    let processed = driver::run(
        &mut setup,
        &mut receiver,
        cli.step_interval,
        &cli.steps_dir,
    )
    .await?;

    tracing::info!(processed, "simulation finished");

    report::print(&setup, cli.json)
}
