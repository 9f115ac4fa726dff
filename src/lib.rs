//! # tetrem
//!
//! Adaptive tetrahedral remeshing via local mesh operations.
//!
//! The remesher takes a tetrahedralization decorated with subdomain labels
//! and drives its edge lengths toward a target sizing by looping four local
//! operators — long-edge split, short-edge collapse, quality flips and
//! dimension-aware smoothing — while preserving tagged features: subdomain
//! boundaries, constrained edges and corners. A protective layer of
//! "imaginary" cells is wrapped around the domain first, so boundary facets
//! need no special handling inside the operators.
#![forbid(unsafe_code)]
#![deny(unused, clippy::incompatible_msrv)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

pub use complex::MeshComplex;
pub use error::{Rejection, RemeshError};
pub use mesh::{CellHandle, Facet, Triangulation, VertexHandle};
pub use remesher::{RemeshOutcome, RemeshStatus, Remesher, remesh};
pub use types::{OUTSIDE, Subdomain, Tetrahedron3, Vertex3};

mod collapse;
mod complex;
mod error;
mod flip;
mod imaginary;
mod mesh;
pub mod metrics;
mod predicates;
mod queue;
mod remesher;
mod smooth;
mod split;
mod types;
