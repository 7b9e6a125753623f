//! Rank sort on an MPI launch.
//!
//! Run with `mpirun -np 4 cargo run --example mpi_ranksort --features mpi -- 1000 1 100 -v -r`.
use clap::Parser;
use itertools::Itertools;
use mesh_ranksort::{
    comm::Collectives,
    config::RankSortConfig,
    constants::DEFAULT_SEED,
    metrics::{PerformanceReport, ProcessDump},
    mpi_comm::{gather_to_root, MpiComm},
    ranksort::{assemble_global_ranks, run_process},
    tools::{generate_random_array, sequential_ranking},
};
use mpi::{collective::SystemOperation, traits::CommunicatorCollectives};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Rank sort on a p x p mesh of MPI processes.
#[derive(Parser, Debug)]
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
    /// Time of the sequential run in seconds
    #[arg(long)]
    sequential_time: Option<f64>,
    /// Print the per-phase breakdown
    #[arg(short, long)]
    verbose: bool,
    /// Print the arrays of every process
    #[arg(short, long)]
    results: bool,
}

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // The universe is dropped, and MPI finalised, before the process exits.
    let code = {
        let universe = mpi::initialize().unwrap();
        let world = MpiComm::new(universe.world());
        run(&cli, &world)
    };

    std::process::exit(code);
}

/// Run the rank sort and return the exit code of this process.
fn run(cli: &Cli, world: &MpiComm) -> i32 {
    let rank = world.rank();
    let mut config = RankSortConfig::new(cli.elements, cli.min, cli.max)
        .with_processes(world.size())
        .with_seed(cli.seed);
    config.sequential_time = cli.sequential_time;
    config.verbose = cli.verbose;
    config.show_results = cli.results;

    // Every process validates on its own and reaches the same verdict,
    // so they all leave with the same status before any communication.
    let result = match run_process(world, &config) {
        Ok(result) => result,
        Err(err) => {
            if rank == 0 {
                error!(%err, "Invalid configuration.");
            }
            return 1;
        }
    };

    let shape = result.ctx.shape();

    // Reduce the timings to the slowest process.
    let total = result.outcome.timings.total.as_secs_f64();
    let mut max_total = 0.0;
    world
        .raw()
        .all_reduce_into(&total, &mut max_total, SystemOperation::max());

    if rank == 0 {
        let mut timings = result.outcome.timings;
        timings.total = std::time::Duration::from_secs_f64(max_total);
        let report = PerformanceReport::new(
            config.elements,
            shape,
            timings,
            config.sequential_time,
            config.verbose,
        );
        println!("{}", report);
    }

    if config.show_results {
        for index in 0..world.size() {
            if index == rank {
                println!();
                println!("{}", ProcessDump::new(&result.ctx, &result.outcome));
            }
            world.barrier();
        }
    }

    // Collect the diagonal results on root and compare with the sequential ranking.
    let local_ranks = result.outcome.global_ranks.clone().unwrap_or_default();
    let columns = vec![result.ctx.column(); local_ranks.len()];

    if let (Some(ranks), Some(columns)) = (
        gather_to_root(&local_ranks, world),
        gather_to_root(&columns, world),
    ) {
        let nlocal = config.elements / shape.side();
        let diagonal_ranks = ranks
            .chunks(nlocal)
            .zip(columns.chunks(nlocal))
            .map(|(ranks, columns)| (columns[0], ranks))
            .collect_vec();

        let global_ranks = assemble_global_ranks(config.elements, shape, diagonal_ranks);
        let global = generate_random_array(
            config.elements,
            config.min_value,
            config.max_value,
            config.seed,
        );

        assert_eq!(global_ranks, sequential_ranking(&global));
        println!("Ranks match the sequential reference.");
    }

    0
}
