//! Group communication used by the rank sort.
//!
//! The algorithm only needs a handful of blocking collectives. They are
//! collected in the [Collectives] trait so that the same phase functions run
//! on top of MPI or on top of the in-process thread mesh.

use std::ops::Add;

use num::traits::Zero;

use crate::{error::RankSortError, topology::ProcessContext};

/// Types that can be sent through a communicator.
#[cfg(feature = "mpi")]
pub trait Transferable: mpi::traits::Equivalence + Copy + Send + Sync + 'static {}

#[cfg(feature = "mpi")]
impl<T: mpi::traits::Equivalence + Copy + Send + Sync + 'static> Transferable for T {}

/// Types that can be sent through a communicator.
#[cfg(not(feature = "mpi"))]
pub trait Transferable: Copy + Send + Sync + 'static {}

#[cfg(not(feature = "mpi"))]
impl<T: Copy + Send + Sync + 'static> Transferable for T {}

/// Types that can be summed by a reduction.
pub trait Summable: Transferable + Zero + Add<Output = Self> {}

impl<T: Transferable + Zero + Add<Output = T>> Summable for T {}

/// Blocking collective operations on a group of processes.
///
/// Every member of the group must call the same operation with the same
/// root before any member returns. There is no timeout: a member that never
/// arrives blocks the whole group.
pub trait Collectives: Sized {
    /// Id of this process within the group.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    /// Wait until all members of the group have arrived.
    fn barrier(&self);

    /// Replicate `buf` of the process `root` into `buf` on every member.
    ///
    /// All members must pass buffers of the same length.
    fn broadcast_into<T: Transferable>(&self, root: usize, buf: &mut [T]);

    /// Element-wise sum of `send` across the group, delivered to `root`.
    ///
    /// Returns `Some` on the root and `None` on every other member.
    fn reduce_sum<T: Summable>(&self, root: usize, send: &[T]) -> Option<Vec<T>>;

    /// Split the group into subgroups.
    ///
    /// Members passing the same `color` form one subgroup. Inside a subgroup the
    /// members are ordered by `key` and then by their id in the parent group.
    fn split(&self, color: usize, key: usize) -> Result<Self, RankSortError>;
}

/// Create the row group of a process in a validated mesh.
///
/// The row index is the color and the column index the key, so the id of a
/// process inside its row group equals its column.
pub fn split_rows<C: Collectives>(
    world: &C,
    ctx: &ProcessContext,
) -> Result<C, RankSortError> {
    let row = world.split(ctx.row(), ctx.column())?;
    debug_assert_eq!(row.rank(), ctx.column());
    debug_assert_eq!(row.size(), ctx.side());
    Ok(row)
}
