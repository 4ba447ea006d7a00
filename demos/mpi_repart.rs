//! Repartition a grid with a moving load peak over several steps.

use bempp_kdpart::{
    geometry::{delinearize, linearize, Coord},
    initial_part_par, repart_parttree_par,
    tools::global_imbalance,
    vtk::export_to_vtk,
};
use mpi::traits::Communicator;
use rand::prelude::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Cell cost with a peak that travels along the x axis.
fn cost(cell: Coord, step: usize, noise: &[f64]) -> f64 {
    let peak = (4 * step) as f64;
    let dx = cell[0] as f64 - peak;
    let index = linearize(cell, EXTENT).unwrap();
    1.0 + 20.0 * (-dx * dx / 32.0).exp() + noise[index]
}

const EXTENT: Coord = [32, 32, 32];

pub fn main() {
    tracing_subscriber::fmt::init();

    // Initialise MPI
    let universe = mpi::initialize().unwrap();

    // Get the world communicator
    let comm = universe.world();
    let rank = comm.rank();

    // The same seed on all ranks gives every rank the same global noise field.
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let noise = (0..32 * 32 * 32)
        .map(|_| rng.gen_range(0.0..0.5))
        .collect::<Vec<f64>>();

    let mut tree = initial_part_par(comm.size() as usize, EXTENT).unwrap();

    for step in 0..8 {
        // Each rank measures the cost of its own cells in row-major order.
        let my_box = tree.subdomain(rank as usize).unwrap();
        let weights = my_box
            .cells()
            .map(|cell| cost(cell, step, &noise))
            .collect::<Vec<_>>();

        let before = global_imbalance(weights.iter().sum(), &comm);

        // Locate the most expensive local cell from its position in the weights.
        let (heaviest, &max_cost) = weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        let offset = delinearize(heaviest, my_box.extent()).unwrap();
        let lu = my_box.lu();
        let heaviest_cell = [lu[0] + offset[0], lu[1] + offset[1], lu[2] + offset[2]];
        assert!(my_box.contains(heaviest_cell));
        assert_eq!(cost(heaviest_cell, step, &noise), max_cost);

        let new_tree = repart_parttree_par(&tree, &comm, &weights).unwrap();

        // Repartitioning with the same weights gives the same tree.
        let again = repart_parttree_par(&tree, &comm, &weights).unwrap();
        assert_eq!(new_tree, again);

        let new_box = new_tree.subdomain(rank as usize).unwrap();
        let new_load = new_box
            .cells()
            .map(|cell| cost(cell, step, &noise))
            .sum::<f64>();
        let after = global_imbalance(new_load, &comm);

        if rank == 0 {
            println!(
                "Step {}: imbalance {:.3} before and {:.3} after repartitioning.",
                step, before, after
            );
        }

        tree = new_tree;
    }

    if rank == 0 {
        export_to_vtk(&tree, "partition.vtk").unwrap();
        println!("Final partition written to partition.vtk.");
    }
}
