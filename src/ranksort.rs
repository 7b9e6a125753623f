//! Rank sort on a square process mesh.
//!
//! Every process computes, for the elements owned by the diagonal process of
//! its row, how many elements of its own column partition are smaller or equal.
//! Summing these partial counts along the row yields the global rank of each
//! diagonal element. The diagonals of all rows together own every element
//! exactly once, so the union of the diagonal results is the complete ranking.
//!
//! The algorithm runs in five phases, each delimited by barriers on the world
//! communicator:
//!
//! 1. select the column partition from the global collection,
//! 2. broadcast the partition of the diagonal process along the row,
//! 3. sort the own partition,
//! 4. count for each broadcast value the own elements not greater than it,
//! 5. sum the counts along the row onto the diagonal process.

use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use itertools::{izip, Itertools};
use tracing::{debug, info};

use crate::{
    comm::{split_rows, Collectives, Transferable},
    config::{mesh_for, validate_input, RankSortConfig},
    error::RankSortError,
    metrics::{PhaseTimings, ProcessDump},
    thread_comm::ThreadUniverse,
    tools::{
        column_partition_indices, count_not_greater, generate_random_array, is_sorted_array,
    },
    topology::{MeshShape, ProcessContext},
};

/// Trait that each element type fed into the rank sort needs to satisfy.
pub trait RankSortable: Transferable + Ord + Display {}

impl<T: Transferable + Ord + Display> RankSortable for T {}

/// Everything a process holds after the rank sort.
pub struct RankSortOutcome<T> {
    /// The column partition as selected from the global collection.
    pub original: Vec<T>,
    /// The column partition after the local sort.
    pub sorted: Vec<T>,
    /// The partition of the diagonal process of this row.
    pub broadcast: Vec<T>,
    /// Partial counts of this process for the broadcast values.
    pub local_ranks: Vec<usize>,
    /// Global ranks of the broadcast values. Only present on diagonal processes.
    pub global_ranks: Option<Vec<usize>>,
    /// Time spent in each phase.
    pub timings: PhaseTimings,
}

/// Phase 1: select the column partition of this process.
///
/// The global collection is cut into `P` contiguous groups of `N / P` elements.
/// Group `g` belongs to column `g % p`. The partition concatenates the groups of
/// the own column in group order, so it only depends on the column and has
/// exactly `N / p` elements.
pub fn select_column_partition<T: Copy>(global: &[T], ctx: &ProcessContext) -> Vec<T> {
    let mut partition = Vec::<T>::with_capacity(global.len() / ctx.side());

    partition.extend(
        column_partition_indices(global.len(), ctx.size(), ctx.side(), ctx.column())
            .map(|index| global[index]),
    );

    partition
}

/// Phase 2: replicate the partition of the row's diagonal process.
///
/// The own partition is left untouched. The result is a new buffer that is
/// identical on every member of the row.
pub fn row_broadcast<T: Transferable, C: Collectives>(
    partition: &[T],
    ctx: &ProcessContext,
    row: &C,
) -> Vec<T> {
    // Every process has a partition of the same size. Off the diagonal the
    // content is only a placeholder that gets overwritten.
    let mut broadcast = partition.to_vec();
    row.broadcast_into(ctx.row_root(), &mut broadcast);
    broadcast
}

/// Phase 3: sort the own partition in place.
pub fn local_sort<T: Ord>(partition: &mut [T]) {
    partition.sort();
}

/// Phase 4: for each broadcast value count the elements of `sorted` not greater than it.
///
/// The counts are aligned with `broadcast`.
pub fn local_ranking<T: Ord>(sorted: &[T], broadcast: &[T]) -> Vec<usize> {
    broadcast
        .iter()
        .map(|value| count_not_greater(sorted, value))
        .collect_vec()
}

/// Phase 5: sum the partial counts of the row onto the diagonal process.
///
/// Returns `Some` on the diagonal process and `None` everywhere else.
pub fn row_reduce<C: Collectives>(
    local_ranks: &[usize],
    ctx: &ProcessContext,
    row: &C,
) -> Option<Vec<usize>> {
    row.reduce_sum(ctx.row_root(), local_ranks)
}

fn timed_phase<C: Collectives, R>(world: &C, elapsed: &mut Duration, f: impl FnOnce() -> R) -> R {
    world.barrier();
    let start = Instant::now();
    let result = f();
    world.barrier();
    *elapsed = start.elapsed();
    result
}

/// Run the five phases of the rank sort on one process.
///
/// `world` spans all processes and is only used for the barriers that delimit
/// the phases. `row` is the row group of this process as created by
/// [split_rows].
pub fn rank_sort<T: RankSortable, C: Collectives>(
    global: &[T],
    ctx: &ProcessContext,
    world: &C,
    row: &C,
) -> RankSortOutcome<T> {
    let mut timings = PhaseTimings::default();

    world.barrier();
    let start = Instant::now();

    let original = timed_phase(world, &mut timings.input, || {
        select_column_partition(global, ctx)
    });
    debug!(
        rank = ctx.rank(),
        row = ctx.row(),
        column = ctx.column(),
        nlocal = original.len(),
        "Selected column partition."
    );

    let broadcast = timed_phase(world, &mut timings.broadcast, || {
        row_broadcast(&original, ctx, row)
    });
    debug!(rank = ctx.rank(), root = ctx.row_root(), "Received row broadcast.");

    let mut sorted = original.clone();
    timed_phase(world, &mut timings.sort, || local_sort(&mut sorted));
    debug_assert!(is_sorted_array(&sorted));

    let local_ranks = timed_phase(world, &mut timings.ranking, || {
        local_ranking(&sorted, &broadcast)
    });
    debug!(rank = ctx.rank(), "Computed local ranks.");

    let global_ranks = timed_phase(world, &mut timings.reduce, || {
        row_reduce(&local_ranks, ctx, row)
    });
    debug!(
        rank = ctx.rank(),
        diagonal = ctx.is_diagonal(),
        "Reduced ranks along row."
    );

    world.barrier();
    timings.total = start.elapsed();

    RankSortOutcome {
        original,
        sorted,
        broadcast,
        local_ranks,
        global_ranks,
        timings,
    }
}

/// Result of one process within a mesh run.
pub struct ProcessResult<T> {
    /// Position of the process in the mesh.
    pub ctx: ProcessContext,
    /// Arrays and timings of the process.
    pub outcome: RankSortOutcome<T>,
}

/// Validate the configuration against the size of `world`, build the row
/// group and run the rank sort on the generated collection.
///
/// Every process performs the validation on its own before the first
/// collective operation. Since all processes see the same configuration and
/// communicator size, they all reach the same result.
pub fn run_process<C: Collectives>(
    world: &C,
    config: &RankSortConfig,
) -> Result<ProcessResult<i32>, RankSortError> {
    validate_input(config.elements, config.min_value, config.max_value)?;
    let shape = mesh_for(config.elements, world.size())?;
    let ctx = ProcessContext::new(world.rank(), shape);

    let global = generate_random_array(
        config.elements,
        config.min_value,
        config.max_value,
        config.seed,
    );

    let row = split_rows(world, &ctx)?;
    let outcome = rank_sort(&global, &ctx, world, &row);

    Ok(ProcessResult { ctx, outcome })
}

/// Scatter the results of the diagonal processes into global order.
///
/// `diagonal_ranks` yields `(column, ranks)` for every diagonal process, where
/// `ranks` is aligned with the column partition of that column.
pub fn assemble_global_ranks<'a>(
    nelements: usize,
    shape: MeshShape,
    diagonal_ranks: impl IntoIterator<Item = (usize, &'a [usize])>,
) -> Vec<usize> {
    let mut global_ranks = vec![0; nelements];

    for (column, ranks) in diagonal_ranks {
        let indices = column_partition_indices(nelements, shape.processes(), shape.side(), column);
        for (index, &rank) in izip!(indices, ranks.iter()) {
            global_ranks[index] = rank;
        }
    }

    global_ranks
}

/// Result of a complete run on the in-process mesh.
pub struct MeshRun {
    /// Shape of the mesh.
    pub shape: MeshShape,
    /// The generated global collection.
    pub global: Vec<i32>,
    /// Rank of every element of the global collection.
    pub global_ranks: Vec<usize>,
    /// Per phase maximum of the timings over all processes.
    pub timings: PhaseTimings,
    /// Process dumps ordered by process id, if requested.
    pub dumps: Vec<ProcessDump<i32>>,
}

/// Run the rank sort on a mesh of threads.
///
/// The configuration is checked before any thread is started, so an invalid
/// configuration never reaches a collective operation.
pub fn run_threaded(config: &RankSortConfig) -> Result<MeshRun, RankSortError> {
    let shape = config.validate()?;

    info!(
        nelements = config.elements,
        nprocesses = shape.processes(),
        side = shape.side(),
        "Starting rank sort."
    );

    let universe = ThreadUniverse::new(shape.processes());
    let results = universe
        .run(|world| run_process(&world, config))
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;

    let global_ranks = assemble_global_ranks(
        config.elements,
        shape,
        results.iter().filter_map(|result| {
            result
                .outcome
                .global_ranks
                .as_deref()
                .map(|ranks| (result.ctx.column(), ranks))
        }),
    );

    let timings = results
        .iter()
        .map(|result| result.outcome.timings)
        .fold(PhaseTimings::default(), |acc, timings| acc.max(&timings));

    let dumps = if config.show_results {
        results
            .iter()
            .map(|result| ProcessDump::new(&result.ctx, &result.outcome))
            .collect_vec()
    } else {
        Vec::new()
    };

    info!(total_ms = timings.total.as_secs_f64() * 1000.0, "Finished rank sort.");

    Ok(MeshRun {
        shape,
        global: generate_random_array(
            config.elements,
            config.min_value,
            config.max_value,
            config.seed,
        ),
        global_ranks,
        timings,
        dumps,
    })
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::{
        assemble_global_ranks, local_ranking, local_sort, rank_sort, select_column_partition,
    };
    use crate::{
        comm::{split_rows, Collectives},
        thread_comm::ThreadUniverse,
        tools::sequential_ranking,
        topology::{MeshShape, ProcessContext},
    };

    const VALUES: [i32; 8] = [5, 1, 4, 1, 5, 9, 2, 6];

    #[test]
    fn test_select_column_partition() {
        let shape = MeshShape::from_processes(4).unwrap();

        // Groups of two: [5, 1], [4, 1], [5, 9], [2, 6]
        let column0 = select_column_partition(&VALUES, &ProcessContext::new(0, shape));
        let column1 = select_column_partition(&VALUES, &ProcessContext::new(1, shape));
        assert_eq!(column0, vec![5, 1, 5, 9]);
        assert_eq!(column1, vec![4, 1, 2, 6]);

        // Only the column matters.
        assert_eq!(
            select_column_partition(&VALUES, &ProcessContext::new(2, shape)),
            column0
        );
        assert_eq!(
            select_column_partition(&VALUES, &ProcessContext::new(3, shape)),
            column1
        );
    }

    #[test]
    fn test_local_ranking() {
        let mut partition = vec![4, 1, 2, 6];
        local_sort(&mut partition);
        assert_eq!(partition, vec![1, 2, 4, 6]);

        let counts = local_ranking(&partition, &[5, 1, 5, 9]);
        assert_eq!(counts, vec![3, 1, 3, 4]);
    }

    #[test]
    fn test_rank_sort_small_mesh() {
        let shape = MeshShape::from_processes(4).unwrap();

        let results = ThreadUniverse::new(4).run(|world| {
            let ctx = ProcessContext::new(world.rank(), shape);
            let row = split_rows(&world, &ctx).unwrap();
            (ctx, rank_sort(&VALUES, &ctx, &world, &row))
        });

        for (ctx, outcome) in &results {
            // The broadcast buffer holds the partition of the row's diagonal.
            let diagonal_column = ctx.row();
            let expected = select_column_partition(
                &VALUES,
                &ProcessContext::new(diagonal_column * 2 + diagonal_column, shape),
            );
            assert_eq!(outcome.broadcast, expected);
            assert_eq!(outcome.global_ranks.is_some(), ctx.is_diagonal());
        }

        // Diagonal of row 0 owns [5, 1, 5, 9], diagonal of row 1 owns [4, 1, 2, 6].
        assert_eq!(results[0].1.global_ranks, Some(vec![6, 2, 6, 8]));
        assert_eq!(results[3].1.global_ranks, Some(vec![4, 2, 3, 7]));

        let global_ranks = assemble_global_ranks(
            VALUES.len(),
            shape,
            results.iter().filter_map(|(ctx, outcome)| {
                outcome
                    .global_ranks
                    .as_deref()
                    .map(|ranks| (ctx.column(), ranks))
            }),
        );

        assert_eq!(global_ranks, vec![6, 2, 4, 2, 6, 8, 3, 7]);
        assert_eq!(global_ranks, sequential_ranking(&VALUES));
    }

    #[test]
    fn test_single_process() {
        let shape = MeshShape::from_processes(1).unwrap();

        let results = ThreadUniverse::new(1).run(|world| {
            let ctx = ProcessContext::new(0, shape);
            let row = split_rows(&world, &ctx).unwrap();
            rank_sort(&VALUES, &ctx, &world, &row)
        });

        let outcome = &results[0];
        assert_eq!(outcome.original, VALUES.to_vec());
        assert_eq!(outcome.broadcast, VALUES.to_vec());
        assert_eq!(outcome.sorted, VALUES.iter().copied().sorted().collect_vec());
        assert_eq!(outcome.local_ranks, sequential_ranking(&VALUES));
        assert_eq!(outcome.global_ranks, Some(sequential_ranking(&VALUES)));
    }
}
