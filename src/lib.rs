//! k-d tree domain decomposition of structured 3d grids across MPI ranks
#![cfg_attr(feature = "strict", deny(warnings), deny(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod builder;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod global_vector;
pub mod marshall;
pub mod parttree;
pub mod repart;
pub mod splitting;
pub mod tools;
pub mod vtk;

pub use error::{Error, Result};
pub use geometry::{Coord, GridBox};
pub use global_vector::GlobalVector;
pub use parttree::{NodeView, PartTreeStorage};
pub use repart::{initial_part_par, repart_parttree, repart_parttree_par};
