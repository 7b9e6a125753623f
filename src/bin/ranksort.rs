//! Rank sort on an in-process mesh of threads.
use anyhow::Result;
use clap::Parser;
use mesh_ranksort::{
    config::RankSortConfig,
    constants::{DEFAULT_PROCESSES, DEFAULT_SEED},
    metrics::PerformanceReport,
    ranksort::run_threaded,
    tools::sequential_ranking,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Compute the rank of every element with a p x p mesh of worker threads.
#[derive(Parser, Debug)]
#[command(name = "ranksort")]
struct Cli {
    /// Number of elements
    elements: usize,

    /// Smallest random value
    #[arg(allow_hyphen_values = true)]
    min: i32,

    /// Largest random value
    #[arg(allow_hyphen_values = true)]
    max: i32,

    /// Number of processes, must be a perfect square dividing the number of elements
    #[arg(short = 'P', long, default_value_t = DEFAULT_PROCESSES)]
    processes: usize,

    /// Seed of the generated collection
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Time of the sequential run in seconds, enables speedup figures
    #[arg(long)]
    sequential_time: Option<f64>,

    /// Print the per-phase breakdown
    #[arg(short, long)]
    verbose: bool,

    /// Print the arrays of every process
    #[arg(short, long)]
    results: bool,

    /// Compare the ranks against the sequential reference
    #[arg(long)]
    check: bool,
}

impl From<&Cli> for RankSortConfig {
    fn from(cli: &Cli) -> Self {
        RankSortConfig {
            elements: cli.elements,
            min_value: cli.min,
            max_value: cli.max,
            processes: cli.processes,
            seed: cli.seed,
            sequential_time: cli.sequential_time,
            verbose: cli.verbose,
            show_results: cli.results,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RankSortConfig::from(&cli);

    let run = run_threaded(&config)?;

    let report = PerformanceReport::new(
        config.elements,
        run.shape,
        run.timings,
        config.sequential_time,
        config.verbose,
    );
    println!("{}", report);

    for dump in &run.dumps {
        println!();
        println!("{}", dump);
    }

    if cli.check {
        if run.global_ranks == sequential_ranking(&run.global) {
            println!("Ranks match the sequential reference.");
        } else {
            error!("Ranks differ from the sequential reference.");
            std::process::exit(2);
        }
    }

    Ok(())
}
