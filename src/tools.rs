//! Utility routines.

use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Get a seeded rng
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Generate the global collection.
///
/// Draws `nelements` integers uniformly from the closed interval `[min_value, max_value]`.
/// The result only depends on the arguments, so every process can generate the
/// identical collection instead of receiving it from a root.
pub fn generate_random_array(
    nelements: usize,
    min_value: i32,
    max_value: i32,
    seed: u64,
) -> Vec<i32> {
    let mut rng = seeded_rng(seed);
    let mut result = Vec::<i32>::with_capacity(nelements);

    for _ in 0..nelements {
        result.push(rng.gen_range(min_value..=max_value));
    }

    result
}

/// Number of elements in `sorted` that are smaller or equal to `value`.
///
/// `sorted` must be sorted in ascending order.
pub fn count_not_greater<T: Ord>(sorted: &[T], value: &T) -> usize {
    sorted.partition_point(|elem| elem <= value)
}

/// Sequential reference ranking.
///
/// Returns for every element the number of elements in `arr` that are smaller
/// or equal to it. Equal elements share their rank.
pub fn sequential_ranking<T: Ord + Clone>(arr: &[T]) -> Vec<usize> {
    let mut sorted = arr.to_vec();
    sorted.sort();

    arr.iter()
        .map(|value| count_not_greater(&sorted, value))
        .collect_vec()
}

/// Global indices of the elements making up the partition of a column.
///
/// The collection of `nelements` elements is split into `nprocesses` contiguous
/// groups. Group `g` belongs to column `g % side`. The indices are returned in
/// the order in which the column partition stores the elements.
pub fn column_partition_indices(
    nelements: usize,
    nprocesses: usize,
    side: usize,
    column: usize,
) -> impl Iterator<Item = usize> {
    let group_size = nelements / nprocesses;

    (0..nprocesses)
        .filter(move |group| group % side == column)
        .flat_map(move |group| group * group_size..(group + 1) * group_size)
}

/// Return true if the array is sorted in ascending order.
pub fn is_sorted_array<T: PartialOrd>(arr: &[T]) -> bool {
    arr.iter().tuple_windows().all(|(elem1, elem2)| elem1 <= elem2)
}

#[cfg(test)]
mod test {
    use itertools::Itertools;

    use super::{
        column_partition_indices, count_not_greater, generate_random_array, sequential_ranking,
    };

    #[test]
    fn test_count_not_greater() {
        let sorted = [1, 1, 2, 4, 5, 5, 6, 9];

        assert_eq!(count_not_greater(&sorted, &0), 0);
        assert_eq!(count_not_greater(&sorted, &1), 2);
        assert_eq!(count_not_greater(&sorted, &3), 3);
        assert_eq!(count_not_greater(&sorted, &5), 6);
        assert_eq!(count_not_greater(&sorted, &9), 8);
        assert_eq!(count_not_greater(&sorted, &10), 8);
        assert_eq!(count_not_greater::<i32>(&[], &10), 0);
    }

    #[test]
    fn test_sequential_ranking() {
        // Ranks are counts of elements smaller or equal, so ties share a rank.
        let arr = [5, 1, 4, 1, 5, 9, 2, 6];
        assert_eq!(sequential_ranking(&arr), vec![6, 2, 4, 2, 6, 8, 3, 7]);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let first = generate_random_array(1000, -20, 20, 42);
        let second = generate_random_array(1000, -20, 20, 42);
        let other = generate_random_array(1000, -20, 20, 43);

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.iter().all(|value| (-20..=20).contains(value)));
        // Both end points are reachable.
        assert!(first.contains(&-20));
        assert!(first.contains(&20));
    }

    #[test]
    fn test_column_partition_indices() {
        // 18 elements on a 3x3 mesh: groups of two, three groups per column.
        let column = column_partition_indices(18, 9, 3, 1).collect_vec();
        assert_eq!(column, vec![2, 3, 8, 9, 14, 15]);

        let all = (0..3)
            .flat_map(|column| column_partition_indices(18, 9, 3, column))
            .sorted()
            .collect_vec();
        assert_eq!(all, (0..18).collect_vec());
    }
}
