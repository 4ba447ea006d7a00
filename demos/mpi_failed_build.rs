//! Check that a failed tree construction is reported on every rank.

use bempp_kdpart::{
    builder::make_parttree_par, geometry::GridBox, splitting::fast_splitting, Error,
};
use mpi::traits::Communicator;

pub fn main() {
    tracing_subscriber::fmt::init();

    // Initialise MPI
    let universe = mpi::initialize().unwrap();

    // Get the world communicator
    let comm = universe.world();
    let rank = comm.rank();
    let size = comm.size();

    // One cell less than there are ranks.
    let too_small = GridBox::from_extent([size - 1, 1, 1]).unwrap();
    let result = make_parttree_par(&comm, too_small, |_| Ok(1.0), fast_splitting);

    if rank == 0 {
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    } else {
        assert!(matches!(result, Err(Error::Collective(_))));
    }

    // A load function that fails on the root when more than one rank takes part.
    let domain = GridBox::from_extent([4 * size, 2, 2]).unwrap();
    let result = make_parttree_par(
        &comm,
        domain,
        |_| Err(Error::IndexOutOfRange { index: 0, len: 0 }),
        fast_splitting,
    );

    match (rank, size) {
        (_, 1) => assert!(result.is_ok()),
        (0, _) => assert!(matches!(result, Err(Error::IndexOutOfRange { .. }))),
        _ => assert!(matches!(result, Err(Error::Collective(_)))),
    }

    // The ranks are still in step after the failures.
    let tree = make_parttree_par(&comm, domain, |_| Ok(1.0), fast_splitting).unwrap();
    assert_eq!(tree.nproc(), size as usize);

    if rank == 0 {
        println!("Failed constructions reported on all {} ranks.", size);
    }
}
