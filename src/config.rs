//! Run configuration.

use crate::{
    constants::{DEFAULT_PROCESSES, DEFAULT_SEED},
    error::RankSortError,
    topology::MeshShape,
};

/// Boundary inputs of a rank sort run.
#[derive(Clone, Debug, PartialEq)]
pub struct RankSortConfig {
    /// Number of elements `N` in the global collection.
    pub elements: usize,
    /// Smallest value that may be generated.
    pub min_value: i32,
    /// Largest value that may be generated.
    pub max_value: i32,
    /// Number of processes `P`.
    pub processes: usize,
    /// Seed for the generation of the global collection.
    pub seed: u64,
    /// Time of the sequential reference in seconds, used for speedup.
    pub sequential_time: Option<f64>,
    /// Print the per-phase breakdown.
    pub verbose: bool,
    /// Dump the arrays of every process.
    pub show_results: bool,
}

impl RankSortConfig {
    /// Create a configuration with default seed, mesh and flags.
    pub fn new(elements: usize, min_value: i32, max_value: i32) -> Self {
        Self {
            elements,
            min_value,
            max_value,
            processes: DEFAULT_PROCESSES,
            seed: DEFAULT_SEED,
            sequential_time: None,
            verbose: false,
            show_results: false,
        }
    }

    /// Set the number of processes.
    pub fn with_processes(mut self, processes: usize) -> Self {
        self.processes = processes;
        self
    }

    /// Set the generation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration and return the mesh shape.
    ///
    /// The checks are ordered as in the command line tools: element count,
    /// value range, mesh shape and finally divisibility.
    pub fn validate(&self) -> Result<MeshShape, RankSortError> {
        validate_input(self.elements, self.min_value, self.max_value)?;
        mesh_for(self.elements, self.processes)
    }
}

/// Check the element count and generation range.
pub fn validate_input(elements: usize, min_value: i32, max_value: i32) -> Result<(), RankSortError> {
    if elements == 0 {
        return Err(RankSortError::NonPositiveElements);
    }

    if min_value >= max_value {
        return Err(RankSortError::InvalidRange {
            min: min_value,
            max: max_value,
        });
    }

    Ok(())
}

/// Check that `processes` forms a square mesh that evenly splits `elements`.
pub fn mesh_for(elements: usize, processes: usize) -> Result<MeshShape, RankSortError> {
    let shape = MeshShape::from_processes(processes)?;

    if elements % processes != 0 {
        return Err(RankSortError::NotDivisible {
            elements,
            processes,
        });
    }

    Ok(shape)
}

#[cfg(test)]
mod test {
    use super::RankSortConfig;
    use crate::error::RankSortError;

    #[test]
    fn test_valid_config() {
        let shape = RankSortConfig::new(18, 1, 100)
            .with_processes(9)
            .validate()
            .unwrap();
        assert_eq!(shape.side(), 3);
    }

    #[test]
    fn test_not_divisible() {
        let err = RankSortConfig::new(10, 1, 100)
            .with_processes(4)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            RankSortError::NotDivisible {
                elements: 10,
                processes: 4
            }
        );
    }

    #[test]
    fn test_rejected_inputs() {
        assert_eq!(
            RankSortConfig::new(0, 1, 100).validate(),
            Err(RankSortError::NonPositiveElements)
        );
        assert_eq!(
            RankSortConfig::new(16, 5, 5).validate(),
            Err(RankSortError::InvalidRange { min: 5, max: 5 })
        );
        assert_eq!(
            RankSortConfig::new(16, 1, 5).with_processes(8).validate(),
            Err(RankSortError::NotPerfectSquare { processes: 8 })
        );
    }
}
