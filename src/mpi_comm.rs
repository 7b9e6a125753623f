//! MPI backend.
//!
//! Wraps an MPI communicator so that the rank sort runs unchanged on a real
//! MPI launch. The process count is taken from the launch environment.

use mpi::{
    collective::SystemOperation,
    datatype::PartitionMut,
    topology::{Color, SimpleCommunicator},
    traits::{Communicator, CommunicatorCollectives, Equivalence, Root},
};

use crate::{
    comm::{Collectives, Summable, Transferable},
    error::RankSortError,
};

/// Communicator backed by MPI.
pub struct MpiComm {
    comm: SimpleCommunicator,
}

impl MpiComm {
    /// Wrap an existing MPI communicator.
    pub fn new(comm: SimpleCommunicator) -> Self {
        Self { comm }
    }

    /// Access the underlying MPI communicator.
    pub fn raw(&self) -> &SimpleCommunicator {
        &self.comm
    }
}

impl Collectives for MpiComm {
    fn rank(&self) -> usize {
        self.comm.rank() as usize
    }

    fn size(&self) -> usize {
        self.comm.size() as usize
    }

    fn barrier(&self) {
        self.comm.barrier();
    }

    fn broadcast_into<T: Transferable>(&self, root: usize, buf: &mut [T]) {
        self.comm
            .process_at_rank(root as i32)
            .broadcast_into(buf);
    }

    fn reduce_sum<T: Summable>(&self, root: usize, send: &[T]) -> Option<Vec<T>> {
        let root_process = self.comm.process_at_rank(root as i32);

        if self.rank() == root {
            let mut recv = vec![T::zero(); send.len()];
            root_process.reduce_into_root(send, &mut recv[..], SystemOperation::sum());
            Some(recv)
        } else {
            root_process.reduce_into(send, SystemOperation::sum());
            None
        }
    }

    fn split(&self, color: usize, key: usize) -> Result<Self, RankSortError> {
        self.comm
            .split_by_color_with_key(Color::with_value(color as i32), key as i32)
            .map(MpiComm::new)
            .ok_or_else(|| RankSortError::Split(format!("no communicator for color {}", color)))
    }
}

/// Compute displacements from a vector of counts.
///
/// For counts `[3, 4, 5]` the displacements are `[0, 3, 7]`.
pub fn displacements(counts: &[i32]) -> Vec<i32> {
    counts
        .iter()
        .scan(0, |acc, &x| {
            let tmp = *acc;
            *acc += x;
            Some(tmp)
        })
        .collect()
}

/// Gather distributed array to the root rank.
///
/// The arrays may have different lengths on each process (including zero).
/// The result is a `Vec<T>` on root and `None` on all other ranks.
pub fn gather_to_root<T: Equivalence + Copy + Default>(arr: &[T], comm: &MpiComm) -> Option<Vec<T>> {
    let comm = comm.raw();
    let n = arr.len() as i32;
    let root_process = comm.process_at_rank(0);

    if comm.rank() == 0 {
        // We first communicate the length of the array to root.
        let mut counts = vec![0_i32; comm.size() as usize];
        root_process.gather_into_root(&n, &mut counts[..]);

        let nelements = counts.iter().sum::<i32>() as usize;
        let mut gathered = vec![T::default(); nelements];
        let displs = displacements(&counts);

        let mut partition = PartitionMut::new(&mut gathered[..], counts, &displs[..]);
        root_process.gather_varcount_into_root(arr, &mut partition);

        Some(gathered)
    } else {
        root_process.gather_into(&n);
        root_process.gather_varcount_into(arr);
        None
    }
}
