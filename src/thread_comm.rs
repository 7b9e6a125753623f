//! In-process mesh where every process is an OS thread.
//!
//! Each group owns a barrier and one exchange slot per member. A collective
//! deposits the local contribution into the own slot, waits for the group,
//! reads what it needs from the other slots and waits again before returning.
//! The second rendezvous guarantees that no member overwrites its slot while
//! another member is still reading it.

use std::{
    any::Any,
    panic,
    sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError},
    thread,
};

use itertools::{izip, Itertools};

use crate::{
    comm::{Collectives, Summable, Transferable},
    error::RankSortError,
};

type Slot = Mutex<Option<Box<dyn Any + Send>>>;

struct Group {
    barrier: Barrier,
    slots: Vec<Slot>,
}

impl Group {
    fn new(size: usize) -> Self {
        Self {
            barrier: Barrier::new(size),
            slots: (0..size).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn size(&self) -> usize {
        self.slots.len()
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, Option<Box<dyn Any + Send>>> {
    // A poisoned slot only means another member panicked while holding it.
    // The group is lost anyway, the data itself is still consistent.
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Communicator of a group of threads.
pub struct ThreadComm {
    rank: usize,
    group: Arc<Group>,
}

impl ThreadComm {
    fn deposit<V: Send + 'static>(&self, value: Option<V>) {
        *lock(&self.group.slots[self.rank]) = value.map(|v| Box::new(v) as Box<dyn Any + Send>);
    }

    /// Call `f` on the content of the slot of member `index`, if present.
    fn read_slot<V: 'static, R>(&self, index: usize, f: impl FnOnce(&V) -> R) -> Option<R> {
        let slot = lock(&self.group.slots[index]);
        slot.as_ref()
            .and_then(|value| value.downcast_ref::<V>())
            .map(f)
    }

    /// Deposit `value`, synchronise, run `read` and synchronise again.
    fn rendezvous<V: Send + 'static, R>(&self, value: Option<V>, read: impl FnOnce(&Self) -> R) -> R {
        self.deposit(value);
        self.group.barrier.wait();
        let result = read(self);
        self.group.barrier.wait();
        result
    }

    /// Gather one value from every member on every member.
    pub fn all_gather<V: Clone + Send + 'static>(&self, value: V) -> Vec<V> {
        self.rendezvous(Some(value), |comm| {
            (0..comm.size())
                .filter_map(|index| comm.read_slot::<V, V>(index, V::clone))
                .collect_vec()
        })
    }
}

impl Collectives for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.group.size()
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }

    fn broadcast_into<T: Transferable>(&self, root: usize, buf: &mut [T]) {
        assert!(root < self.size());
        let value = (self.rank == root).then(|| buf.to_vec());

        self.rendezvous(value, |comm| {
            if comm.rank != root {
                comm.read_slot::<Vec<T>, _>(root, |data| buf.copy_from_slice(data));
            }
        });
    }

    fn reduce_sum<T: Summable>(&self, root: usize, send: &[T]) -> Option<Vec<T>> {
        assert!(root < self.size());

        self.rendezvous(Some(send.to_vec()), |comm| {
            if comm.rank != root {
                return None;
            }

            let mut sum = vec![T::zero(); send.len()];
            for index in 0..comm.size() {
                comm.read_slot::<Vec<T>, _>(index, |contribution| {
                    assert_eq!(contribution.len(), sum.len());
                    for (acc, &value) in izip!(sum.iter_mut(), contribution.iter()) {
                        *acc = *acc + value;
                    }
                });
            }
            Some(sum)
        })
    }

    fn split(&self, color: usize, key: usize) -> Result<Self, RankSortError> {
        let requests = self.all_gather((color, key));

        if requests.len() != self.size() {
            return Err(RankSortError::Split(format!(
                "expected {} split requests, received {}",
                self.size(),
                requests.len()
            )));
        }

        let members = (0..self.size())
            .filter(|&index| requests[index].0 == color)
            .sorted_by_key(|&index| (requests[index].1, index))
            .collect_vec();

        // The leader is the first member of the new group. It creates the shared
        // state and everybody in the group picks it up from the leader's slot.
        let leader = members[0];
        let new_group = (self.rank == leader).then(|| Arc::new(Group::new(members.len())));
        let group = self.rendezvous(new_group, |comm| {
            comm.read_slot::<Arc<Group>, _>(leader, Arc::clone)
        });

        let group = group.ok_or_else(|| {
            RankSortError::Split(format!("no group published by leader {}", leader))
        })?;

        let rank = members
            .iter()
            .position(|&index| index == self.rank)
            .ok_or_else(|| RankSortError::Split(format!("rank {} not in its group", self.rank)))?;

        Ok(Self { rank, group })
    }
}

/// Launcher for a mesh of threads.
pub struct ThreadUniverse {
    size: usize,
}

impl ThreadUniverse {
    /// Create a universe with `size` processes.
    pub fn new(size: usize) -> Self {
        assert!(size > 0);
        Self { size }
    }

    /// Number of processes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `f` on every process and return the results ordered by process id.
    ///
    /// Every process receives a communicator spanning the whole universe.
    /// A panic on any process is propagated once all threads have finished.
    pub fn run<F, R>(&self, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let world = Arc::new(Group::new(self.size));
        let f = &f;

        thread::scope(|scope| {
            let handles = (0..self.size)
                .map(|rank| {
                    let comm = ThreadComm {
                        rank,
                        group: Arc::clone(&world),
                    };
                    scope.spawn(move || f(comm))
                })
                .collect_vec();

            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(payload) => panic::resume_unwind(payload),
                })
                .collect_vec()
        })
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::ThreadUniverse;
    use crate::comm::Collectives;

    #[test]
    fn test_broadcast() {
        let results = ThreadUniverse::new(5).run(|comm| {
            let mut buf = vec![comm.rank() as i32; 3];
            comm.broadcast_into(2, &mut buf);
            buf
        });

        for buf in results {
            assert_eq!(buf, vec![2, 2, 2]);
        }
    }

    #[test]
    fn test_reduce_sum() {
        let results = ThreadUniverse::new(4).run(|comm| {
            let send = vec![comm.rank(), 1, 10 * comm.rank()];
            comm.reduce_sum(1, &send)
        });

        for (rank, result) in results.into_iter().enumerate() {
            if rank == 1 {
                assert_eq!(result, Some(vec![6, 4, 60]));
            } else {
                assert!(result.is_none());
            }
        }
    }

    #[test]
    fn test_split_by_color() {
        // Split six processes by parity and reverse the order inside each group.
        let results = ThreadUniverse::new(6).run(|comm| {
            let sub = comm.split(comm.rank() % 2, 10 - comm.rank()).unwrap();
            let sum = sub.reduce_sum(0, &[comm.rank()]);
            (sub.rank(), sub.size(), sum)
        });

        let ranks = results.iter().map(|r| r.0).collect_vec();
        assert_eq!(ranks, vec![2, 2, 1, 1, 0, 0]);
        assert!(results.iter().all(|r| r.1 == 3));

        // The roots are world ranks 4 and 5.
        assert_eq!(results[4].2, Some(vec![6]));
        assert_eq!(results[5].2, Some(vec![9]));
    }

    #[test]
    fn test_repeated_collectives() {
        let results = ThreadUniverse::new(3).run(|comm| {
            let mut total = 0;
            for round in 0..50 {
                let mut buf = [comm.rank() + round];
                comm.broadcast_into(round % 3, &mut buf);
                comm.barrier();
                total += buf[0];
            }
            total
        });

        let expected = (0..50).map(|round| round % 3 + round).sum::<usize>();
        assert!(results.iter().all(|&total| total == expected));
    }

    #[test]
    fn test_all_gather() {
        let results = ThreadUniverse::new(4).run(|comm| comm.all_gather(comm.rank() * 2));
        for gathered in results {
            assert_eq!(gathered, vec![0, 2, 4, 6]);
        }
    }
}
