//! Recursive construction of partition trees.

use mpi::traits::{CommunicatorCollectives, Root};
use tracing::{debug, trace};

use crate::{
    constants::ROOT_RANK,
    error::{Error, Result},
    geometry::{Coord, GridBox},
    marshall::{marshall, unmarshall},
    parttree::{PartTreeStorage, PartTreeWriter},
};

/// Build a partition tree of `domain` for `nproc` processes.
///
/// `load` evaluates the load of a single cell and `split` decides how the load
/// profile along the cut axis is divided (see [crate::splitting]). The root of
/// the returned tree covers `domain` and owns the ranks `[0, nproc)`.
///
/// Each node is cut along its longest axis. If the cut proposed by `split`
/// would leave one child with fewer cells than processes it is moved until
/// both children have enough cells. If no such cut exists for the proposed
/// process split, the cut is kept and the process split is moved instead.
pub fn make_parttree<L, S>(
    nproc: usize,
    domain: GridBox,
    mut load: L,
    split: S,
) -> Result<PartTreeStorage>
where
    L: FnMut(Coord) -> Result<f64>,
    S: Fn(&[f64], usize) -> Result<(usize, usize)>,
{
    if nproc < 1 {
        return Err(Error::InvalidArgument(
            "a partition needs at least one process".to_string(),
        ));
    }
    if i32::try_from(nproc).is_err() {
        return Err(Error::InvalidArgument(format!(
            "{} processes exceed the rank range",
            nproc
        )));
    }
    let volume = domain.checked_volume().ok_or_else(|| {
        Error::InvalidArgument(format!("domain {} has too many cells", domain))
    })?;
    if volume < nproc {
        return Err(Error::InvalidArgument(format!(
            "domain {} has {} cells for {} processes",
            domain, volume, nproc
        )));
    }

    debug!(nproc, %domain, "building partition tree");

    let mut writer = PartTreeWriter::default();
    build_subtree(&mut writer, 0, nproc as i32, domain, &mut load, &split)?;

    let tree = writer.finish();
    debug_assert!(tree.validate().is_ok());

    Ok(tree)
}

fn build_subtree<L, S>(
    writer: &mut PartTreeWriter,
    pstart: i32,
    pend: i32,
    bounds: GridBox,
    load: &mut L,
    split: &S,
) -> Result<()>
where
    L: FnMut(Coord) -> Result<f64>,
    S: Fn(&[f64], usize) -> Result<(usize, usize)>,
{
    if pend - pstart == 1 {
        trace!(rank = pstart, %bounds, "leaf");
        writer.push_leaf(pstart, bounds);
        return Ok(());
    }

    let id = writer.push_inner(pstart, pend, bounds);
    let nproc = (pend - pstart) as usize;

    let (axis, coord, nproc_left) = choose_cut(bounds, nproc, load, split)?;
    debug!(
        node = id,
        axis,
        coord,
        nproc_left,
        nproc,
        %bounds,
        "split"
    );
    writer.set_split(id, axis, coord, nproc_left as i32);

    let (left, right) = bounds.split(axis, coord)?;
    let psplit = pstart + nproc_left as i32;

    build_subtree(writer, pstart, psplit, left, load, split)?;
    build_subtree(writer, psplit, pend, right, load, split)
}

/// Determine axis, split coordinate and number of left processes of a node.
fn choose_cut<L, S>(
    bounds: GridBox,
    nproc: usize,
    load: &mut L,
    split: &S,
) -> Result<(usize, i32, usize)>
where
    L: FnMut(Coord) -> Result<f64>,
    S: Fn(&[f64], usize) -> Result<(usize, usize)>,
{
    let axis = bounds.longest_axis();
    let nslices = bounds.extent()[axis] as usize;
    if nslices < 2 {
        return Err(Error::InvalidArgument(format!(
            "cannot divide {} among {} processes",
            bounds, nproc
        )));
    }

    let profile = load_profile(bounds, axis, load)?;
    let (cut, nproc_left) = split(&profile, nproc)?;

    if nproc_left < 1 || nproc_left >= nproc {
        return Err(Error::InvalidArgument(format!(
            "splitting sends {} of {} processes to the left",
            nproc_left, nproc
        )));
    }
    if cut >= nslices {
        return Err(Error::IndexOutOfRange {
            index: cut,
            len: nslices,
        });
    }

    // Every child needs at least one cell per process. With `cross` cells
    // per slice the left child needs ceil(nproc_left / cross) slices.
    let cross = bounds.volume() / nslices;
    let min_left = nproc_left.div_ceil(cross);
    let min_right = (nproc - nproc_left).div_ceil(cross);

    let (slices_left, nproc_left) = if min_left + min_right <= nslices {
        ((cut + 1).clamp(min_left, nslices - min_right), nproc_left)
    } else {
        // No cut fits this process split. Keep the cut and move processes instead.
        let slices_left = (cut + 1).clamp(1, nslices - 1);
        let capacity_left = slices_left * cross;
        let capacity_right = (nslices - slices_left) * cross;
        let lower = nproc.saturating_sub(capacity_right).max(1);
        let upper = capacity_left.min(nproc - 1);
        trace!(axis, nproc_left, lower, upper, %bounds, "process split adjusted");
        (slices_left, nproc_left.clamp(lower, upper))
    };

    let coord = bounds.lu()[axis] + slices_left as i32;

    Ok((axis, coord, nproc_left))
}

/// Sum of the load over each slice of `bounds` orthogonal to `axis`.
fn load_profile<L>(bounds: GridBox, axis: usize, load: &mut L) -> Result<Vec<f64>>
where
    L: FnMut(Coord) -> Result<f64>,
{
    let mut profile = vec![0.0; bounds.extent()[axis] as usize];
    let offset = bounds.lu()[axis];

    for cell in bounds.cells() {
        profile[(cell[axis] - offset) as usize] += load(cell)?;
    }

    Ok(profile)
}

/// Build a partition tree for all ranks of `comm`.
///
/// The tree is built on rank 0, which is the only rank that evaluates `load`.
/// The result is serialized and broadcast, so that every rank returns an
/// identical tree. All ranks must call this.
///
/// If the construction fails on rank 0 every rank returns an error.
pub fn make_parttree_par<C, L, S>(
    comm: &C,
    domain: GridBox,
    load: L,
    split: S,
) -> Result<PartTreeStorage>
where
    C: CommunicatorCollectives,
    L: FnMut(Coord) -> Result<f64>,
    S: Fn(&[f64], usize) -> Result<(usize, usize)>,
{
    let root_process = comm.process_at_rank(ROOT_RANK);

    if comm.rank() == ROOT_RANK {
        let tree = make_parttree(comm.size() as usize, domain, load, split);

        // A negative length tells the other ranks that construction failed.
        let mut buffer = match &tree {
            Ok(tree) => marshall(tree),
            Err(_) => Vec::new(),
        };
        let mut nbytes: i64 = if tree.is_ok() {
            buffer.len() as i64
        } else {
            -1
        };

        root_process.broadcast_into(&mut nbytes);
        if nbytes >= 0 {
            root_process.broadcast_into(&mut buffer[..]);
            debug!(nbytes, "broadcast partition tree");
        }

        tree
    } else {
        let mut nbytes: i64 = 0;
        root_process.broadcast_into(&mut nbytes);

        if nbytes < 0 {
            return Err(Error::Collective(format!(
                "partition tree construction failed on rank {}",
                ROOT_RANK
            )));
        }

        let mut buffer = vec![0u8; nbytes as usize];
        root_process.broadcast_into(&mut buffer[..]);

        unmarshall(&buffer)
    }
}
