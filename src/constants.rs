//! Crate wide constants.

/// Seed used to generate the global collection on every process.
pub const DEFAULT_SEED: u64 = 42;

/// Default number of worker processes of the in-process mesh (a 2x2 mesh).
pub const DEFAULT_PROCESSES: usize = 4;

/// Number of leading entries printed per array in a process dump.
pub const DUMP_WIDTH: usize = 12;

/// Width of the separator lines in reports.
pub const BANNER_WIDTH: usize = 70;
