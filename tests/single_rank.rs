//! Collective entry points on a single rank world.
//!
//! MPI can only be initialised once per process, so all checks run in one test.

use bempp_kdpart::{
    builder::make_parttree_par,
    geometry::GridBox,
    initial_part_par,
    Error, repart_parttree_par,
    splitting::fast_splitting,
    tools::{gather_to_all, global_imbalance},
    GlobalVector,
};
use mpi::traits::Communicator;

#[test]
fn test_collectives_on_single_rank() {
    let universe = mpi::initialize().unwrap();
    let comm = universe.world();
    assert_eq!(comm.size(), 1);

    // Gathering on one rank returns the local data.
    let (values, counts) = gather_to_all(&[1.0, 2.0, 3.0], &comm);
    assert_eq!(values, vec![1.0, 2.0, 3.0]);
    assert_eq!(counts, vec![3]);

    let global = GlobalVector::new(&comm, &[4, 5]);
    assert_eq!(global.nranks(), 1);
    assert_eq!(global.value_at(0, 1).unwrap(), 5);
    assert!(global.value_at(0, 2).is_err());

    assert_eq!(global_imbalance(7.0, &comm), 1.0);

    // A single rank owns the whole domain.
    let domain = GridBox::from_extent([4, 3, 2]).unwrap();
    let tree = make_parttree_par(&comm, domain, |_| Ok(1.0), fast_splitting).unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.domain().unwrap(), domain);

    // A failed construction on the root returns the original error and
    // leaves the broadcast protocol usable for the next call.
    let empty = GridBox::from_extent([0, 3, 2]).unwrap();
    assert!(matches!(
        make_parttree_par(&comm, empty, |_| Ok(1.0), fast_splitting),
        Err(Error::InvalidArgument(_))
    ));
    let huge = GridBox::from_extent([i32::MAX; 3]).unwrap();
    assert!(matches!(
        make_parttree_par(&comm, huge, |_| Ok(1.0), fast_splitting),
        Err(Error::InvalidArgument(_))
    ));
    let rebuilt = make_parttree_par(&comm, domain, |_| Ok(1.0), fast_splitting).unwrap();
    assert_eq!(rebuilt, tree);

    let tree = initial_part_par(1, [4, 3, 2]).unwrap();
    let weights = (0..24).map(|i| i as f64).collect::<Vec<_>>();
    let new_tree = repart_parttree_par(&tree, &comm, &weights).unwrap();
    assert_eq!(new_tree, tree);

    // Weights that do not match the subdomain are rejected.
    assert!(repart_parttree_par(&tree, &comm, &weights[..23]).is_err());

    // A tree for more ranks than the communicator has is rejected.
    let wide = initial_part_par(2, [4, 3, 2]).unwrap();
    assert!(repart_parttree_par(&wide, &comm, &weights[..12]).is_err());
}
