//! Crate wide constants.

/// Number of grid axes.
pub const NDIMS: usize = 3;

/// Rank that builds the tree in the parallel construction.
pub const ROOT_RANK: i32 = 0;

/// Fraction of the processes that the fast splitting sends to the left child.
pub const FAST_SPLIT_TARGET: f64 = 0.5;

/// Relative cost added for every process of difference between the two
/// process subsets of a quality splitting.
pub const PROCESS_IMBALANCE_PENALTY: f64 = 0.01;
