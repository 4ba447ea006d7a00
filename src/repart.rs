//! Initial partitioning and weighted repartitioning.

use mpi::{collective::SystemOperation, traits::CommunicatorCollectives};
use tracing::info;

use crate::{
    builder::{make_parttree, make_parttree_par},
    error::{Error, Result},
    geometry::{linearize, Coord, GridBox},
    global_vector::GlobalVector,
    parttree::PartTreeStorage,
    splitting::{fast_splitting, quality_splitting},
};

/// Uniform partition of the box `[0, box_extent)` for `size` processes.
///
/// Every cell has load one. This is the bootstrap partition before any
/// load has been measured and needs no communication.
pub fn initial_part_par(size: usize, box_extent: Coord) -> Result<PartTreeStorage> {
    let domain = GridBox::from_extent(box_extent)?;
    info!(size, %domain, "initial partition");

    make_parttree(size, domain, |_| Ok(1.0), fast_splitting)
}

/// Load of a global cell, read from the local weights of its current owner.
///
/// The weights of each rank are stored in row-major order of the rank's subdomain.
fn cell_weight<T>(tree: &PartTreeStorage, weights: &GlobalVector<T>, cell: Coord) -> Result<T>
where
    T: Clone,
{
    let leaf = tree.node_of_cell(cell)?;
    let bounds = leaf.bounds();
    let index = linearize(bounds.to_local(cell), bounds.extent())?;

    weights.value_at(leaf.rank() as usize, index)
}

/// Rebuild a partition from per-rank cell weights that are already collected.
///
/// `cell_weights` holds for every rank of `tree` the weights of its subdomain
/// cells in row-major order. The new tree covers the same domain.
pub fn repart_parttree(
    tree: &PartTreeStorage,
    cell_weights: &GlobalVector<f64>,
) -> Result<PartTreeStorage> {
    let domain = tree.domain()?;
    check_weight_counts(tree, cell_weights)?;

    info!(nproc = tree.nproc(), %domain, "repartition");

    make_parttree(
        tree.nproc(),
        domain,
        |cell| cell_weight(tree, cell_weights, cell),
        quality_splitting,
    )
}

fn check_weight_counts<T: Clone>(tree: &PartTreeStorage, weights: &GlobalVector<T>) -> Result<()> {
    if weights.nranks() != tree.nproc() {
        return Err(Error::InvalidArgument(format!(
            "weights of {} ranks for a tree of {} ranks",
            weights.nranks(),
            tree.nproc()
        )));
    }

    for leaf in tree.leaves() {
        let rank = leaf.rank() as usize;
        if weights.size(rank)? != leaf.bounds().volume() {
            return Err(Error::InvalidArgument(format!(
                "rank {} has {} weights for {} cells",
                rank,
                weights.size(rank)?,
                leaf.bounds().volume()
            )));
        }
    }

    Ok(())
}

/// Rebuild the partition of all ranks of `comm` from measured cell weights.
///
/// Each rank passes the weights of the cells of its current subdomain in
/// row-major order. The tree is built on rank 0 with [quality_splitting] and
/// distributed, so all ranks return the same tree. All ranks must call this.
pub fn repart_parttree_par<C: CommunicatorCollectives>(
    tree: &PartTreeStorage,
    comm: &C,
    cell_weights: &[f64],
) -> Result<PartTreeStorage> {
    let domain = tree.domain()?;

    if tree.nproc() != comm.size() as usize {
        return Err(Error::InvalidArgument(format!(
            "tree for {} ranks used on a communicator of size {}",
            tree.nproc(),
            comm.size()
        )));
    }

    let expected = tree.subdomain(comm.rank() as usize)?.volume();
    let consistent = check_all(cell_weights.len() == expected, comm);
    if !consistent {
        return Err(Error::InvalidArgument(format!(
            "cell weights do not match the subdomain sizes (rank {}: {} weights for {} cells)",
            comm.rank(),
            cell_weights.len(),
            expected
        )));
    }

    let global_load = GlobalVector::new(comm, cell_weights);

    info!(rank = comm.rank(), nproc = tree.nproc(), %domain, "parallel repartition");

    make_parttree_par(
        comm,
        domain,
        |cell| cell_weight(tree, &global_load, cell),
        quality_splitting,
    )
}

/// Return true on all ranks if `local` is true on every rank.
fn check_all<C: CommunicatorCollectives>(local: bool, comm: &C) -> bool {
    let mut global = false;
    comm.all_reduce_into(&local, &mut global, SystemOperation::logical_and());
    global
}

/// Sum of the load of each leaf, indexed by rank.
pub fn leaf_loads<L>(tree: &PartTreeStorage, mut load: L) -> Result<Vec<f64>>
where
    L: FnMut(Coord) -> Result<f64>,
{
    let nproc = tree.nproc();
    let mut loads = vec![0.0; nproc];
    for leaf in tree.leaves() {
        let rank = leaf.rank() as usize;
        let slot = loads
            .get_mut(rank)
            .ok_or(Error::IndexOutOfRange { index: rank, len: nproc })?;
        for cell in leaf.bounds().cells() {
            *slot += load(cell)?;
        }
    }

    Ok(loads)
}

/// Lay out a global cell function as the per-rank weight arrays of `tree`.
///
/// The result is what each rank passes to [repart_parttree_par], collected for all ranks.
pub fn rank_weights<T, F>(tree: &PartTreeStorage, mut weight: F) -> Vec<Vec<T>>
where
    F: FnMut(Coord) -> T,
{
    tree.leaves()
        .map(|leaf| leaf.bounds().cells().map(&mut weight).collect())
        .collect()
}
