//! Compute the uniform bootstrap partition and check that it is the same on all ranks.

use bempp_kdpart::{initial_part_par, marshall::marshall, tools::gather_to_all};
use mpi::traits::Communicator;

pub fn main() {
    tracing_subscriber::fmt::init();

    // Initialise MPI
    let universe = mpi::initialize().unwrap();

    // Get the world communicator
    let comm = universe.world();
    let rank = comm.rank();
    let size = comm.size() as usize;

    let extent = [32, 24, 16];

    // Every rank computes the partition locally. No communication is needed.
    let tree = initial_part_par(size, extent).unwrap();
    tree.validate().unwrap();

    let my_box = tree.subdomain(rank as usize).unwrap();
    println!("Rank {} owns {} ({} cells).", rank, my_box, my_box.volume());

    // Compare the serialized trees of all ranks.
    let bytes = marshall(&tree);
    let (all_bytes, counts) = gather_to_all(&bytes, &comm);

    for (other, chunk) in all_bytes.chunks(bytes.len()).enumerate() {
        assert_eq!(counts[other] as usize, bytes.len());
        assert_eq!(chunk, &bytes[..]);
    }

    if rank == 0 {
        let cells = extent.iter().product::<i32>() as usize;
        println!(
            "Partition of {} cells into {} subdomains is identical on all ranks.",
            cells, size
        );
    }
}
