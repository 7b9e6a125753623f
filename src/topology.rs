//! Layout of the processes in a square mesh.
//!
//! A mesh of `P = p * p` processes is viewed as a `p x p` grid. The process with
//! linear id `id` sits at `(row, column) = (id / p, id % p)`. All collective
//! operations of the rank sort are scoped to a row. The diagonal member of a row
//! (`row == column`) is the root of the row broadcast and of the row reduction.

use crate::error::RankSortError;

/// Convert a linear process id into its `(row, column)` position.
pub fn rank_to_position(rank: usize, side: usize) -> (usize, usize) {
    (rank / side, rank % side)
}

/// Return true if the process sits on the diagonal of the mesh.
pub fn is_diagonal(rank: usize, side: usize) -> bool {
    let (row, column) = rank_to_position(rank, side);
    row == column
}

/// Linear id of the diagonal process of a given row.
pub fn diagonal_of_row(row: usize, side: usize) -> usize {
    row * side + row
}

/// Exact integer square root, if `value` is a perfect square.
pub fn exact_sqrt(value: usize) -> Option<usize> {
    // Start from the float estimate and correct for rounding in both directions.
    let mut root = (value as f64).sqrt() as usize;
    // A square that overflows is larger than any `usize`.
    while root.checked_mul(root).map_or(true, |square| square > value) {
        root -= 1;
    }
    while (root + 1)
        .checked_mul(root + 1)
        .is_some_and(|square| square <= value)
    {
        root += 1;
    }

    if root.checked_mul(root) == Some(value) {
        Some(root)
    } else {
        None
    }
}

/// Shape of a validated mesh.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeshShape {
    side: usize,
}

impl MeshShape {
    /// Create the mesh for a given number of processes.
    ///
    /// Fails if the number of processes is not a positive perfect square.
    pub fn from_processes(processes: usize) -> Result<Self, RankSortError> {
        match exact_sqrt(processes) {
            Some(side) if side > 0 => Ok(Self { side }),
            _ => Err(RankSortError::NotPerfectSquare { processes }),
        }
    }

    /// Side length `p` of the mesh.
    pub fn side(&self) -> usize {
        self.side
    }

    /// Total number of processes `P = p * p`.
    pub fn processes(&self) -> usize {
        self.side * self.side
    }

    /// Linear ids of the processes in a row, ordered by column.
    pub fn row_members(&self, row: usize) -> impl Iterator<Item = usize> {
        let side = self.side;
        (0..side).map(move |column| row * side + column)
    }

    /// Linear ids of all diagonal processes, ordered by row.
    pub fn diagonal(&self) -> impl Iterator<Item = usize> {
        let side = self.side;
        (0..side).map(move |row| diagonal_of_row(row, side))
    }
}

/// Identity of a process within the mesh.
///
/// This is passed explicitly into each phase of the rank sort. Note that
/// `rank` here is the linear process id and has nothing to do with the
/// statistical rank of an element.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProcessContext {
    rank: usize,
    shape: MeshShape,
}

impl ProcessContext {
    /// Create a new context.
    pub fn new(rank: usize, shape: MeshShape) -> Self {
        debug_assert!(rank < shape.processes());
        Self { rank, shape }
    }

    /// Linear process id.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Total number of processes.
    pub fn size(&self) -> usize {
        self.shape.processes()
    }

    /// Side length of the mesh.
    pub fn side(&self) -> usize {
        self.shape.side()
    }

    /// Mesh shape.
    pub fn shape(&self) -> MeshShape {
        self.shape
    }

    /// Row of the process.
    pub fn row(&self) -> usize {
        self.rank / self.side()
    }

    /// Column of the process.
    pub fn column(&self) -> usize {
        self.rank % self.side()
    }

    /// True if this process is the root of its row.
    pub fn is_diagonal(&self) -> bool {
        is_diagonal(self.rank, self.side())
    }

    /// Position of the row root inside the row group.
    ///
    /// Row groups are ordered by column, so this is the row index itself.
    pub fn row_root(&self) -> usize {
        self.row()
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::{diagonal_of_row, exact_sqrt, is_diagonal, rank_to_position, MeshShape};
    use crate::error::RankSortError;

    #[test]
    fn test_rank_to_position() {
        assert_eq!(rank_to_position(0, 3), (0, 0));
        assert_eq!(rank_to_position(5, 3), (1, 2));
        assert_eq!(rank_to_position(7, 3), (2, 1));
        assert_eq!(rank_to_position(0, 1), (0, 0));
    }

    #[test]
    fn test_diagonal() {
        let side = 4;
        let diagonal = (0..side * side)
            .filter(|&rank| is_diagonal(rank, side))
            .collect_vec();
        assert_eq!(diagonal, vec![0, 5, 10, 15]);

        for row in 0..side {
            assert!(is_diagonal(diagonal_of_row(row, side), side));
        }
    }

    #[test]
    fn test_mesh_shape() {
        for side in 1..40 {
            let shape = MeshShape::from_processes(side * side).unwrap();
            assert_eq!(shape.side(), side);
        }

        for processes in [0, 2, 3, 5, 8, 10, 15, 17, 24] {
            assert_eq!(
                MeshShape::from_processes(processes),
                Err(RankSortError::NotPerfectSquare { processes })
            );
        }
    }

    #[test]
    fn test_rows_cover_mesh() {
        let shape = MeshShape::from_processes(9).unwrap();
        let members = (0..shape.side())
            .flat_map(|row| shape.row_members(row))
            .collect_vec();
        assert_eq!(members, (0..9).collect_vec());
        assert_eq!(shape.diagonal().collect_vec(), vec![0, 4, 8]);
    }

    #[test]
    fn test_exact_sqrt_large() {
        assert_eq!(exact_sqrt(1 << 40), Some(1 << 20));
        assert_eq!(exact_sqrt((1 << 40) + 1), None);
    }

    #[test]
    fn test_huge_process_count_is_rejected() {
        let side = (1_usize << (usize::BITS / 2)) - 1;
        assert_eq!(exact_sqrt(side * side), Some(side));
        assert_eq!(exact_sqrt(usize::MAX), None);
        assert_eq!(
            MeshShape::from_processes(usize::MAX),
            Err(RankSortError::NotPerfectSquare {
                processes: usize::MAX
            })
        );
    }
}
