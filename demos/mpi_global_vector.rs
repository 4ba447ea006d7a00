//! Read the local arrays of all ranks through a global vector.

use bempp_kdpart::GlobalVector;
use mpi::traits::Communicator;

pub fn main() {
    tracing_subscriber::fmt::init();

    // Initialise MPI
    let universe = mpi::initialize().unwrap();

    // Get the world communicator
    let comm = universe.world();
    let rank = comm.rank() as usize;
    let size = comm.size() as usize;

    // Rank `r` owns `r + 1` elements with values `100 * r + i`.
    let local = (0..rank + 1)
        .map(|index| (100 * rank + index) as i32)
        .collect::<Vec<_>>();

    let global = GlobalVector::new(&comm, &local);

    assert_eq!(global.nranks(), size);
    for other in 0..size {
        assert_eq!(global.size(other).unwrap(), other + 1);
        for index in 0..=other {
            assert_eq!(
                global.value_at(other, index).unwrap(),
                (100 * other + index) as i32
            );
        }
        assert!(global.value_at(other, other + 1).is_err());
    }

    if rank == 0 {
        println!("Global vector over {} ranks verified.", size);
    }
}
