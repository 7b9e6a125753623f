//! Timings, operation estimates and report rendering.

use std::{
    fmt::{self, Display},
    time::Duration,
};

use itertools::Itertools;

use crate::{
    constants::{BANNER_WIDTH, DUMP_WIDTH},
    ranksort::RankSortOutcome,
    topology::{MeshShape, ProcessContext},
};

/// Wall clock time of each phase of the rank sort.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhaseTimings {
    /// Selection of the column partition.
    pub input: Duration,
    /// Row broadcast.
    pub broadcast: Duration,
    /// Local sort.
    pub sort: Duration,
    /// Local rank counting.
    pub ranking: Duration,
    /// Row reduction.
    pub reduce: Duration,
    /// Everything from the first to the last barrier.
    pub total: Duration,
}

impl PhaseTimings {
    /// Time spent in local computation (sort and ranking).
    pub fn compute(&self) -> Duration {
        self.sort + self.ranking
    }

    /// Time spent in communication (broadcast and reduce).
    pub fn communication(&self) -> Duration {
        self.broadcast + self.reduce
    }

    /// Phase-wise maximum of two timings.
    pub fn max(&self, other: &PhaseTimings) -> PhaseTimings {
        PhaseTimings {
            input: self.input.max(other.input),
            broadcast: self.broadcast.max(other.broadcast),
            sort: self.sort.max(other.sort),
            ranking: self.ranking.max(other.ranking),
            reduce: self.reduce.max(other.reduce),
            total: self.total.max(other.total),
        }
    }
}

fn floor_log2(value: u64) -> u64 {
    if value == 0 {
        0
    } else {
        value.ilog2() as u64
    }
}

/// Estimated number of comparison operations of the mesh rank sort.
///
/// Each of the `p * p` processes sorts `n / p` elements and runs `n / p` binary
/// searches on them, both counted as `m * floor(log2(m))` with `m = n / p`.
/// The arithmetic wraps on overflow, the estimate is only indicative.
pub fn estimate_operations(nelements: usize, side: usize) -> u64 {
    let nlocal = (nelements / side) as u64;
    let per_process = nlocal.wrapping_mul(floor_log2(nlocal)).wrapping_mul(2);
    let nprocesses = (side * side) as u64;
    per_process.wrapping_mul(nprocesses)
}

/// Estimated number of comparison operations of the sequential rank sort.
pub fn estimate_sequential_operations(nelements: usize) -> u64 {
    estimate_operations(nelements, 1)
}

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn percent(part: Duration, total: Duration) -> f64 {
    if total.is_zero() {
        0.0
    } else {
        part.as_secs_f64() / total.as_secs_f64() * 100.0
    }
}

/// Performance summary of a mesh run.
pub struct PerformanceReport {
    nelements: usize,
    shape: MeshShape,
    timings: PhaseTimings,
    sequential_time: Option<f64>,
    verbose: bool,
}

impl PerformanceReport {
    /// Create a new report.
    ///
    /// `sequential_time` is the time of the sequential reference in seconds.
    /// Values that are not positive are ignored.
    pub fn new(
        nelements: usize,
        shape: MeshShape,
        timings: PhaseTimings,
        sequential_time: Option<f64>,
        verbose: bool,
    ) -> Self {
        Self {
            nelements,
            shape,
            timings,
            sequential_time: sequential_time.filter(|&ts| ts > 0.0),
            verbose,
        }
    }

    /// Speedup relative to the sequential reference.
    pub fn speedup(&self) -> Option<f64> {
        self.sequential_time
            .map(|ts| ts / self.timings.total.as_secs_f64())
    }

    /// Parallel efficiency, the speedup divided by the number of processes.
    pub fn efficiency(&self) -> Option<f64> {
        self.speedup()
            .map(|speedup| speedup / self.shape.processes() as f64)
    }

    /// Estimated operations.
    pub fn operations(&self) -> u64 {
        estimate_operations(self.nelements, self.shape.side())
    }

    /// Estimated operations per second of compute time.
    pub fn operations_per_second(&self) -> f64 {
        self.operations() as f64 / self.timings.compute().as_secs_f64()
    }

    /// Processed elements per second.
    pub fn throughput(&self) -> f64 {
        self.nelements as f64 / self.timings.total.as_secs_f64()
    }

    /// CSV header matching [PerformanceReport::csv_row].
    pub fn csv_header(&self) -> String {
        let mut header = String::from("P,N,p,Tp_ms,compute_ms,comm_ms,");
        if self.sequential_time.is_some() {
            header.push_str("Ts_ms,speedup,efficiency,");
        }
        header.push_str("flops,gflops,throughput");
        header
    }

    /// One CSV line with the key figures.
    pub fn csv_row(&self) -> String {
        let mut fields = vec![
            self.shape.processes().to_string(),
            self.nelements.to_string(),
            self.shape.side().to_string(),
            format!("{:.3}", ms(self.timings.total)),
            format!("{:.3}", ms(self.timings.compute())),
            format!("{:.3}", ms(self.timings.communication())),
        ];

        if let (Some(ts), Some(speedup), Some(efficiency)) =
            (self.sequential_time, self.speedup(), self.efficiency())
        {
            fields.push(format!("{:.3}", ts * 1000.0));
            fields.push(format!("{:.3}", speedup));
            fields.push(format!("{:.3}", efficiency));
        }

        fields.push(self.operations().to_string());
        fields.push(format!("{:.3}", self.operations_per_second() / 1e9));
        fields.push(format!("{:.3}", self.throughput()));

        fields.join(",")
    }
}

impl Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "=".repeat(BANNER_WIDTH);
        let timings = &self.timings;

        writeln!(f, "{}", banner)?;
        writeln!(f, "PARALLEL RANK SORT - PERFORMANCE METRICS")?;
        writeln!(f, "{}", banner)?;

        writeln!(f, "Configuration:")?;
        writeln!(f, "  N (elements):       {}", self.nelements)?;
        writeln!(
            f,
            "  P (processes):      {} (mesh {}x{})",
            self.shape.processes(),
            self.shape.side(),
            self.shape.side()
        )?;
        writeln!(
            f,
            "  Elements/process:   {}",
            self.nelements / self.shape.side()
        )?;
        writeln!(f)?;

        writeln!(f, "Times:")?;
        writeln!(f, "  Total (Tp):         {:.3} ms", ms(timings.total))?;
        writeln!(
            f,
            "  - Compute:          {:.3} ms ({:.3}%)",
            ms(timings.compute()),
            percent(timings.compute(), timings.total)
        )?;
        writeln!(
            f,
            "  - Communication:    {:.3} ms ({:.3}%)",
            ms(timings.communication()),
            percent(timings.communication(), timings.total)
        )?;

        if self.verbose {
            writeln!(f)?;
            writeln!(f, "  Phase breakdown:")?;
            writeln!(f, "    Phase 1 (Input):    {:.3} ms", ms(timings.input))?;
            writeln!(f, "    Phase 2 (Bcast):    {:.3} ms", ms(timings.broadcast))?;
            writeln!(f, "    Phase 3 (Sort):     {:.3} ms", ms(timings.sort))?;
            writeln!(f, "    Phase 4 (Ranking):  {:.3} ms", ms(timings.ranking))?;
            writeln!(f, "    Phase 5 (Reduce):   {:.3} ms", ms(timings.reduce))?;
        }

        if let (Some(ts), Some(speedup), Some(efficiency)) =
            (self.sequential_time, self.speedup(), self.efficiency())
        {
            let ideal = self.shape.processes() as f64;
            writeln!(f)?;
            writeln!(f, "Performance:")?;
            writeln!(f, "  Ts (sequential):    {:.3} ms", ts * 1000.0)?;
            writeln!(f, "  Speedup (S):        {:.3}x", speedup)?;
            writeln!(f, "  Efficiency (E):     {:.3}%", efficiency * 100.0)?;
            writeln!(f, "  Ideal speedup:      {:.3}x", ideal)?;
            writeln!(f, "  % of ideal:         {:.3}%", speedup / ideal * 100.0)?;
        }

        let ops_per_second = self.operations_per_second();
        writeln!(f)?;
        writeln!(f, "Operations:")?;
        writeln!(f, "  Estimated:          {}", self.operations())?;
        writeln!(f, "  OP/s:               {:.3}", ops_per_second)?;
        writeln!(f, "  MOP/s:              {:.3}", ops_per_second / 1e6)?;
        writeln!(f, "  GOP/s:              {:.3}", ops_per_second / 1e9)?;

        writeln!(f)?;
        writeln!(f, "Throughput:")?;
        writeln!(f, "  Elements/s:         {:.3}", self.throughput())?;

        if !timings.communication().is_zero() {
            writeln!(f)?;
            writeln!(f, "Balance:")?;
            writeln!(
                f,
                "  Compute/Comm:       {:.3}x",
                timings.compute().as_secs_f64() / timings.communication().as_secs_f64()
            )?;
        }

        writeln!(f, "{}", banner)?;
        writeln!(f)?;
        writeln!(f, "CSV:")?;
        writeln!(f, "{}", self.csv_header())?;
        write!(f, "{}", self.csv_row())
    }
}

/// Leading entries of an array, together with its full length.
struct Excerpt<T> {
    values: Vec<T>,
    len: usize,
}

impl<T: Clone> Excerpt<T> {
    fn new(arr: &[T]) -> Self {
        Self {
            values: arr.iter().take(DUMP_WIDTH).cloned().collect_vec(),
            len: arr.len(),
        }
    }
}

impl<T: Display> Display for Excerpt<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .values
            .iter()
            .map(|value| format!("{:>4}", value))
            .join(",");
        write!(f, "[{}", values)?;
        if self.len > self.values.len() {
            write!(f, ", ...")?;
        }
        write!(f, "]")
    }
}

/// Arrays of a single process for diagnostic output.
pub struct ProcessDump<T> {
    ctx: ProcessContext,
    original: Excerpt<T>,
    sorted: Excerpt<T>,
    broadcast: Excerpt<T>,
    local_ranks: Excerpt<usize>,
    global_ranks: Option<Excerpt<usize>>,
}

impl<T: Clone> ProcessDump<T> {
    /// Capture the arrays of a process.
    pub fn new(ctx: &ProcessContext, outcome: &RankSortOutcome<T>) -> Self {
        Self {
            ctx: *ctx,
            original: Excerpt::new(&outcome.original),
            sorted: Excerpt::new(&outcome.sorted),
            broadcast: Excerpt::new(&outcome.broadcast),
            local_ranks: Excerpt::new(&outcome.local_ranks),
            global_ranks: outcome.global_ranks.as_deref().map(Excerpt::new),
        }
    }
}

impl<T: Display> Display for ProcessDump<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = "-".repeat(BANNER_WIDTH);

        writeln!(f, "{}", line)?;
        write!(
            f,
            "Process {} (row={}, col={})",
            self.ctx.rank(),
            self.ctx.row(),
            self.ctx.column()
        )?;
        if self.ctx.is_diagonal() {
            write!(f, " [DIAGONAL]")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", line)?;

        writeln!(f, "Original:       {}", self.original)?;
        writeln!(f, "Sorted:         {}", self.sorted)?;
        writeln!(f, "Broadcasted:    {}", self.broadcast)?;
        write!(f, "Local Ranking:  {}", self.local_ranks)?;
        if let Some(global_ranks) = &self.global_ranks {
            writeln!(f)?;
            write!(f, "Global Ranking: {}", global_ranks)?;
        }
        Ok(())
    }
}

/// Summary of a sequential run.
pub struct SequentialReport {
    nelements: usize,
    elapsed: Duration,
}

impl SequentialReport {
    /// Create a new report.
    pub fn new(nelements: usize, elapsed: Duration) -> Self {
        Self { nelements, elapsed }
    }
}

impl Display for SequentialReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let banner = "=".repeat(BANNER_WIDTH);
        let seconds = self.elapsed.as_secs_f64();
        let operations = estimate_sequential_operations(self.nelements);

        writeln!(f, "{}", banner)?;
        writeln!(f, "SEQUENTIAL RANK SORT - METRICS")?;
        writeln!(f, "{}", banner)?;
        writeln!(f, "N:                  {} elements", self.nelements)?;
        writeln!(f, "Time:               {:.6} ms", seconds * 1000.0)?;
        writeln!(f, "Estimated ops:      {}", operations)?;
        writeln!(f, "GOP/s:              {:.6}", operations as f64 / seconds / 1e9)?;
        writeln!(f, "Throughput:         {:.6} elem/s", self.nelements as f64 / seconds)?;
        write!(f, "{}", banner)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{estimate_operations, estimate_sequential_operations, PerformanceReport, PhaseTimings};
    use crate::topology::MeshShape;

    fn timings() -> PhaseTimings {
        PhaseTimings {
            input: Duration::from_millis(1),
            broadcast: Duration::from_millis(2),
            sort: Duration::from_millis(3),
            ranking: Duration::from_millis(4),
            reduce: Duration::from_millis(5),
            total: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_estimate_operations() {
        // m = 1024 / 2 = 512, log2(512) = 9, 2 * 512 * 9 per process, 4 processes.
        assert_eq!(estimate_operations(1024, 2), 4 * 2 * 512 * 9);
        assert_eq!(estimate_sequential_operations(1024), 2 * 1024 * 10);
        assert_eq!(estimate_sequential_operations(1), 0);
        assert_eq!(estimate_sequential_operations(0), 0);
    }

    #[test]
    fn test_compute_and_communication() {
        let timings = timings();
        assert_eq!(timings.compute(), Duration::from_millis(7));
        assert_eq!(timings.communication(), Duration::from_millis(7));

        let other = PhaseTimings {
            sort: Duration::from_millis(10),
            ..Default::default()
        };
        let max = timings.max(&other);
        assert_eq!(max.sort, Duration::from_millis(10));
        assert_eq!(max.reduce, Duration::from_millis(5));
    }

    #[test]
    fn test_speedup() {
        let shape = MeshShape::from_processes(4).unwrap();
        let report = PerformanceReport::new(1024, shape, timings(), Some(0.04), false);

        assert!((report.speedup().unwrap() - 2.0).abs() < 1e-12);
        assert!((report.efficiency().unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(
            report.csv_header(),
            "P,N,p,Tp_ms,compute_ms,comm_ms,Ts_ms,speedup,efficiency,flops,gflops,throughput"
        );
        assert!(report.csv_row().starts_with("4,1024,2,20.000,7.000,7.000,40.000,2.000,0.500,"));

        // Without a sequential time the speedup columns disappear.
        let report = PerformanceReport::new(1024, shape, timings(), Some(0.0), true);
        assert!(report.speedup().is_none());
        assert_eq!(
            report.csv_header(),
            "P,N,p,Tp_ms,compute_ms,comm_ms,flops,gflops,throughput"
        );
        assert!(report.to_string().contains("Phase 5 (Reduce):   5.000 ms"));
    }
}
