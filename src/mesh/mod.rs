//! The decorated tetrahedralization: arena storage, handles, local traversal
//! and the mutation primitives the remeshing operators are built from.

pub use handles::{CellHandle, Facet, VertexHandle};
pub use triangulation::Triangulation;

mod handles;
mod mutate;
mod triangulation;
