//! Utility routines.

use std::{cmp::Ordering, ops::Sub};

use itertools::Itertools;
use mpi::{
    collective::SystemOperation,
    datatype::PartitionMut,
    traits::{CommunicatorCollectives, Equivalence},
};
use num::traits::Zero;

/// Inclusive running sum.
///
/// For the array `[1, 3, 5, 7]` the output will be `[1, 4, 9, 16]`.
pub fn prefix_sum<T: Zero + Copy>(values: &[T]) -> Vec<T> {
    values
        .iter()
        .scan(T::zero(), |state, &x| {
            *state = *state + x;
            Some(*state)
        })
        .collect_vec()
}

/// Find the position of the element closest to `target` in a non-decreasing sequence.
///
/// If two elements are equally close the one that comes first in the sequence wins.
/// Returns `None` for an empty sequence.
pub fn find_nearest<T>(sorted: &[T], target: T) -> Option<usize>
where
    T: Copy + PartialOrd + Sub<Output = T>,
{
    if sorted.is_empty() {
        return None;
    }

    // First element that is not smaller than the target.
    let upper = sorted.partition_point(|&value| value < target);

    if upper == 0 {
        return Some(0);
    }

    // First occurrence of the largest value below the target.
    let below = sorted[upper - 1];
    let lower = sorted.partition_point(|&value| value < below);

    if upper == sorted.len() {
        return Some(lower);
    }

    if sorted[upper] - target < target - below {
        Some(upper)
    } else {
        Some(lower)
    }
}

/// Find the minimal element under the strict ordering `less`.
///
/// If several elements are minimal the one closest to the middle index
/// `len / 2` is returned, and of two equally centered minima the first one.
/// Returns `None` for an empty sequence.
pub fn middle_most_min_element<T, F>(values: &[T], less: F) -> Option<usize>
where
    F: Fn(&T, &T) -> bool,
{
    let mut min = 0;
    for (index, value) in values.iter().enumerate().skip(1) {
        if less(value, &values[min]) {
            min = index;
        }
    }

    let middle = values.len() / 2;
    let min_value = values.get(min)?;

    values
        .iter()
        .enumerate()
        .filter(|(_, value)| !less(min_value, value))
        .map(|(index, _)| index)
        .min_by_key(|&index| index.abs_diff(middle))
}

/// Ratio of the largest load to the mean load.
///
/// A perfectly balanced distribution has imbalance `1`.
pub fn imbalance(loads: &[f64]) -> f64 {
    if loads.is_empty() {
        return 1.0;
    }
    let total = loads.iter().sum::<f64>();
    if total == 0.0 {
        return 1.0;
    }
    let max = loads
        .iter()
        .copied()
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .unwrap_or(0.0);

    max * loads.len() as f64 / total
}

/// Compute the load imbalance across all ranks from the local load of each rank.
pub fn global_imbalance<C: CommunicatorCollectives>(local_load: f64, comm: &C) -> f64 {
    let mut max_load = 0.0;
    let mut total_load = 0.0;

    comm.all_reduce_into(&local_load, &mut max_load, SystemOperation::max());
    comm.all_reduce_into(&local_load, &mut total_load, SystemOperation::sum());

    if total_load == 0.0 {
        1.0
    } else {
        max_load * comm.size() as f64 / total_load
    }
}

/// Gather array to all processes.
///
/// Returns the concatenation of all local arrays in rank order
/// together with the number of elements contributed by each rank.
pub fn gather_to_all<T, C>(arr: &[T], comm: &C) -> (Vec<T>, Vec<i32>)
where
    T: Equivalence + Default + Clone,
    C: CommunicatorCollectives,
{
    // First we need to broadcast the individual sizes on each process.

    let size = comm.size();

    let local_len = arr.len() as i32;

    let mut counts = vec![0; size as usize];

    comm.all_gather_into(&local_len, &mut counts[..]);

    let recv_len = counts.iter().sum::<i32>() as usize;

    let mut recvbuffer = vec![T::default(); recv_len];

    let recv_displs = displacements(&counts);

    {
        let mut receive_partition =
            PartitionMut::new(&mut recvbuffer[..], &counts[..], &recv_displs[..]);

        comm.all_gather_varcount_into(arr, &mut receive_partition);
    }

    (recvbuffer, counts)
}

/// Compute displacements from a vector of counts.
///
/// This is useful for global MPI varcount operations. Let
/// count [ 3, 4, 5]. Then the corresponding displacements are
/// [0, 3, 7]. Note that the last element `5` is ignored.
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

#[cfg(test)]
mod test {
    use super::{displacements, find_nearest, imbalance, middle_most_min_element, prefix_sum};

    #[test]
    fn test_prefix_sum() {
        assert_eq!(prefix_sum(&[1, 3, 5, 7]), vec![1, 4, 9, 16]);
        assert!(prefix_sum::<f64>(&[]).is_empty());
    }

    #[test]
    fn test_find_nearest() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(find_nearest(&values, 2.0), Some(1));
        assert_eq!(find_nearest(&values, 2.6), Some(2));
        assert_eq!(find_nearest(&values, -5.0), Some(0));
        assert_eq!(find_nearest(&values, 10.0), Some(3));

        // Equal distance: the earlier element wins.
        assert_eq!(find_nearest(&[1.0, 3.0], 2.0), Some(0));

        // Repeated values resolve to their first occurrence.
        assert_eq!(find_nearest(&[1.0, 2.0, 2.0, 2.0, 5.0], 2.4), Some(1));
        assert_eq!(find_nearest(&[1.0, 2.0, 2.0, 2.0, 5.0], 4.0), Some(4));
        assert_eq!(find_nearest(&[0.0, 0.0, 0.0], 1.0), Some(0));

        assert_eq!(find_nearest::<f64>(&[], 1.0), None);
    }

    #[test]
    fn test_middle_most_min_element() {
        let less = |a: &i32, b: &i32| a < b;

        assert_eq!(middle_most_min_element(&[4, 2, 3], less), Some(1));
        assert_eq!(middle_most_min_element(&[1, 5, 1, 5, 1], less), Some(2));

        // Minima at 1, 3 and 4 with middle 2: 1 and 3 are equally centered.
        assert_eq!(middle_most_min_element(&[3, 1, 2, 1, 1], less), Some(1));

        assert_eq!(middle_most_min_element(&[7, 7, 7, 7], less), Some(2));
        assert_eq!(middle_most_min_element::<i32, _>(&[], less), None);
    }

    #[test]
    fn test_imbalance() {
        assert_eq!(imbalance(&[2.0, 2.0, 2.0]), 1.0);
        assert_eq!(imbalance(&[1.0, 3.0]), 1.5);
        assert_eq!(imbalance(&[]), 1.0);
    }

    #[test]
    fn test_displacements() {
        assert_eq!(displacements(&[3, 4, 5]), vec![0, 3, 7]);
    }
}
