//! Read access to an array that is distributed across ranks.

use mpi::traits::{CommunicatorCollectives, Equivalence};

use crate::{
    error::{Error, Result},
    tools::gather_to_all,
};

/// A distributed array whose local parts are readable from every rank.
///
/// Each rank contributes its local values. After construction, which is a
/// collective operation, the value at any local index of any rank can be read.
pub struct GlobalVector<T> {
    values: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: Equivalence + Default + Clone> GlobalVector<T> {
    /// Collect the local arrays of all ranks of `comm`.
    ///
    /// All ranks must call this. The data of every rank is available on return.
    pub fn new<C: CommunicatorCollectives>(comm: &C, local: &[T]) -> Self {
        let (values, counts) = gather_to_all(local, comm);

        Self {
            values,
            offsets: offsets(counts.iter().map(|&count| count as usize)),
        }
    }
}

impl<T: Clone> GlobalVector<T> {
    /// Assemble from the already collected arrays of all ranks, in rank order.
    pub fn from_rank_data(per_rank: Vec<Vec<T>>) -> Self {
        let offsets = offsets(per_rank.iter().map(|values| values.len()));
        let values = per_rank.into_iter().flatten().collect();

        Self { values, offsets }
    }

    /// Number of ranks that contributed.
    pub fn nranks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of elements owned by `rank`.
    pub fn size(&self, rank: usize) -> Result<usize> {
        self.rank_values(rank).map(|values| values.len())
    }

    /// The local array of `rank`.
    pub fn rank_values(&self, rank: usize) -> Result<&[T]> {
        if rank >= self.nranks() {
            return Err(Error::IndexOutOfRange {
                index: rank,
                len: self.nranks(),
            });
        }
        Ok(&self.values[self.offsets[rank]..self.offsets[rank + 1]])
    }

    /// Element `index` of the local array of `rank`.
    pub fn value_at(&self, rank: usize, index: usize) -> Result<T> {
        let values = self.rank_values(rank)?;
        values.get(index).cloned().ok_or(Error::IndexOutOfRange {
            index,
            len: values.len(),
        })
    }
}

fn offsets(counts: impl Iterator<Item = usize>) -> Vec<usize> {
    std::iter::once(0)
        .chain(counts.scan(0, |acc, count| {
            *acc += count;
            Some(*acc)
        }))
        .collect()
}

#[cfg(test)]
mod test {
    use super::GlobalVector;

    #[test]
    fn test_rank_access() {
        let global = GlobalVector::from_rank_data(vec![vec![1, 2], vec![], vec![3, 4, 5]]);

        assert_eq!(global.nranks(), 3);
        assert_eq!(global.size(0).unwrap(), 2);
        assert_eq!(global.size(1).unwrap(), 0);
        assert_eq!(global.size(2).unwrap(), 3);

        assert_eq!(global.value_at(0, 1).unwrap(), 2);
        assert_eq!(global.value_at(2, 0).unwrap(), 3);
        assert_eq!(global.rank_values(2).unwrap(), &[3, 4, 5]);
    }

    #[test]
    fn test_out_of_range() {
        let global = GlobalVector::from_rank_data(vec![vec![1.0, 2.0], vec![3.0]]);

        assert!(global.value_at(0, 2).is_err());
        assert!(global.value_at(1, 1).is_err());
        assert!(global.value_at(2, 0).is_err());
        assert!(global.size(2).is_err());
    }
}
