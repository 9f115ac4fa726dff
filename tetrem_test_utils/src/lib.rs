//! Mesh fixtures and samplers for tetrem tests
#![forbid(unsafe_code)]
#![deny(unused)]
#![warn(clippy::all, clippy::missing_const_for_fn)]

use rand::{distr::Uniform, prelude::Distribution};
use rand_distr::Normal;
use std::ops::RangeInclusive;

pub type Vertex3 = [f64; 3];

/// A regular tetrahedron with the requested edge length, positively oriented.
///
/// Returns the vertex list and a single cell as vertex indices.
pub fn regular_tet(edge_length: f64) -> (Vec<Vertex3>, Vec<[usize; 4]>) {
    let s = edge_length / (2.0 * 2.0_f64.sqrt());
    let points = vec![
        [s, s, s],
        [s, -s, -s],
        [-s, -s, s],
        [-s, s, -s],
    ];
    (points, vec![[0, 1, 2, 3]])
}

/// Two tetrahedra sharing the facet `(0, 1, 2)`, apexes on either side.
///
/// `height` is the apex distance from the shared plane; small values give a
/// pair of slivers.
pub fn facet_pair(height: f64) -> (Vec<Vertex3>, Vec<[usize; 4]>) {
    let third = 1.0 / 3.0;
    let points = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [third, third, height],
        [third, third, -height],
    ];
    (points, vec![[0, 1, 2, 3], [0, 2, 1, 4]])
}

/// Samples `n` vertices in 3D space from the [Uniform] distribution.
///
/// If no range is specified, the unit-cube centered around the origin is used, `[-0.5, 0.5]`.
pub fn sample_vertices_3d(n: usize, range: Option<RangeInclusive<f64>>) -> Vec<Vertex3> {
    let mut rng = rand::rng();
    let range = range.unwrap_or(-0.5..=0.5);
    let uniform = Uniform::try_from(range).expect("Expected range with a greater start then end");

    let mut vertices: Vec<[f64; 3]> = Vec::with_capacity(n);
    for _ in 0..n {
        let x = uniform.sample(&mut rng);
        let y = uniform.sample(&mut rng);
        let z = uniform.sample(&mut rng);

        vertices.push([x, y, z]);
    }

    vertices
}

/// Displaces a point by Gaussian noise with the given standard deviation.
pub fn jitter(p: Vertex3, std_dev: f64) -> Vertex3 {
    let mut rng = rand::rng();
    let normal = Normal::new(0.0, std_dev).unwrap();

    [
        p[0] + normal.sample(&mut rng),
        p[1] + normal.sample(&mut rng),
        p[2] + normal.sample(&mut rng),
    ]
}
