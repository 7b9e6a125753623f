//! Sequential reference rank sort.
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use mesh_ranksort::{
    config::validate_input, constants::DEFAULT_SEED, metrics::SequentialReport,
    tools::{generate_random_array, sequential_ranking},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Rank every element of a generated collection on a single process.
#[derive(Parser, Debug)]
#[command(name = "sequential")]
struct Cli {
    /// Number of elements
    elements: usize,

    /// Smallest random value
    #[arg(allow_hyphen_values = true)]
    min: i32,

    /// Largest random value
    #[arg(allow_hyphen_values = true)]
    max: i32,

    /// Seed of the generated collection
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Only print the elapsed time in seconds (for `ranksort --sequential-time`)
    #[arg(long)]
    time_only: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    validate_input(cli.elements, cli.min, cli.max)?;

    let data = generate_random_array(cli.elements, cli.min, cli.max, cli.seed);

    let start = Instant::now();
    let ranks = sequential_ranking(&data);
    let elapsed = start.elapsed();
    debug!(nranks = ranks.len(), "Ranked collection.");

    if cli.time_only {
        println!("{:.6}", elapsed.as_secs_f64());
    } else {
        println!("{}", SequentialReport::new(cli.elements, elapsed));
    }

    Ok(())
}
