//! Error types.
use thiserror::Error;

/// Errors raised while setting up a rank sort.
///
/// All configuration errors are detected independently by every process
/// before the first collective operation, so every process reaches the
/// same verdict and can terminate without any partial state to unwind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankSortError {
    /// The number of elements must be positive.
    #[error("the number of elements must be positive")]
    NonPositiveElements,
    /// The value range used for generation is empty or degenerate.
    #[error("min must be smaller than max (got min = {min}, max = {max})")]
    InvalidRange {
        /// Lower bound.
        min: i32,
        /// Upper bound.
        max: i32,
    },
    /// The process count is not of the form p * p.
    #[error("the number of processes must be a perfect square (got P = {processes}; valid: 1, 4, 9, 16, 25, ...)")]
    NotPerfectSquare {
        /// Offending process count.
        processes: usize,
    },
    /// The elements cannot be split evenly across the processes.
    #[error("the number of elements must be divisible by the number of processes (N = {elements}, P = {processes})")]
    NotDivisible {
        /// Number of elements.
        elements: usize,
        /// Number of processes.
        processes: usize,
    },
    /// The transport could not build a row group.
    #[error("could not split communicator: {0}")]
    Split(String),
}
