//! Inexact geometric measures: lengths, volumes, element quality.
//!
//! Exact sidedness tests live in [crate::predicates]; everything here is
//! floating-point and only used for measuring, never for topological
//! decisions.

use crate::types::{Tetrahedron3, Vertex3};
use nalgebra::{Matrix3, Vector3};

/// The six edges of a tetrahedron as `(i, j, k, l)`: the edge runs from
/// vertex `i` to vertex `j`, with `k` and `l` the two remaining vertices.
pub(crate) const TET_EDGES: [(usize, usize, usize, usize); 6] = [
    (0, 1, 2, 3),
    (0, 2, 1, 3),
    (0, 3, 1, 2),
    (1, 2, 0, 3),
    (1, 3, 0, 2),
    (2, 3, 0, 1),
];

#[inline]
pub fn squared_distance(a: &Vertex3, b: &Vertex3) -> f64 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    dx * dx + dy * dy + dz * dz
}

#[inline]
pub fn midpoint(a: &Vertex3, b: &Vertex3) -> Vertex3 {
    [
        0.5 * (a[0] + b[0]),
        0.5 * (a[1] + b[1]),
        0.5 * (a[2] + b[2]),
    ]
}

#[inline]
fn vec3(p: &Vertex3) -> Vector3<f64> {
    Vector3::new(p[0], p[1], p[2])
}

/// Signed volume of the tetrahedron `(a, b, c, d)`.
///
/// Positive iff `d` lies on the positive side of the plane through `a, b, c`.
pub fn signed_volume(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    let m = Matrix3::from_columns(&[vec3(b) - vec3(a), vec3(c) - vec3(a), vec3(d) - vec3(a)]);
    m.determinant() / 6.0
}

/// Normal of the triangle `(a, b, c)`, not normalized.
///
/// The magnitude is twice the triangle area, which makes the raw value usable
/// as an area weight.
pub fn facet_normal(a: &Vertex3, b: &Vertex3, c: &Vertex3) -> Vector3<f64> {
    (vec3(b) - vec3(a)).cross(&(vec3(c) - vec3(a)))
}

/// Minimum dihedral angle of a tetrahedron, in degrees.
///
/// Degenerate elements report `0.0`, the worst possible value.
pub fn min_dihedral_angle(tet: &Tetrahedron3) -> f64 {
    let mut min_angle = f64::MAX;

    for &(i, j, k, l) in &TET_EDGES {
        let e = vec3(&tet[j]) - vec3(&tet[i]);
        let n1 = e.cross(&(vec3(&tet[k]) - vec3(&tet[i])));
        let n2 = e.cross(&(vec3(&tet[l]) - vec3(&tet[i])));

        let denom = n1.norm() * n2.norm();
        if denom == 0.0 {
            return 0.0;
        }

        let cos = (n1.dot(&n2) / denom).clamp(-1.0, 1.0);
        min_angle = min_angle.min(cos.acos().to_degrees());
    }

    min_angle
}

/// Element quality used by flip acceptance and smoothing: the minimum
/// dihedral angle. Larger is better.
#[inline]
pub fn quality(tet: &Tetrahedron3) -> f64 {
    min_dihedral_angle(tet)
}

/// Reflects `p` across the plane through `a, b, c`.
pub fn reflect_across_plane(p: &Vertex3, a: &Vertex3, b: &Vertex3, c: &Vertex3) -> Option<Vertex3> {
    let n = facet_normal(a, b, c);
    let norm2 = n.norm_squared();
    if norm2 == 0.0 {
        return None;
    }

    let d = (vec3(p) - vec3(a)).dot(&n) / norm2;
    let r = vec3(p) - n * (2.0 * d);
    Some([r.x, r.y, r.z])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_corner_tet_volume() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        let d = [0.0, 0.0, 1.0];

        let v = signed_volume(&a, &b, &c, &d);
        assert!((v - 1.0 / 6.0).abs() < 1e-12);
        assert!((signed_volume(&a, &c, &b, &d) + 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn regular_tet_min_dihedral() {
        // All six dihedral angles of the regular tetrahedron are acos(1/3).
        let s = 1.0;
        let tet = [
            [s, s, s],
            [s, -s, -s],
            [-s, -s, s],
            [-s, s, -s],
        ];

        let expected = (1.0_f64 / 3.0).acos().to_degrees();
        assert!((min_dihedral_angle(&tet) - expected).abs() < 1e-9);
    }

    #[test]
    fn flat_tet_has_zero_quality() {
        let tet = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.5, 0.0],
        ];

        assert!(quality(&tet) < 1e-9);
    }

    #[test]
    fn reflection_mirrors_across_plane() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        let p = [0.2, 0.3, 0.7];

        let r = reflect_across_plane(&p, &a, &b, &c).unwrap();
        assert!((r[0] - 0.2).abs() < 1e-12);
        assert!((r[1] - 0.3).abs() < 1e-12);
        assert!((r[2] + 0.7).abs() < 1e-12);
    }
}
