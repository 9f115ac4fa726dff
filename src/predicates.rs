//! Geometric predicates abstraction.
//!
//! With feature `geogram` (default): uses [geogram_predicates] (FFI to C++ geogram).
//!
//! With feature `robust`: uses pure-Rust [robust], for targets where the FFI
//! backend is unavailable.
//!
//! Both backends are normalized to the same convention: `orient_3d(a, b, c, d)`
//! is positive iff `d` lies on the positive side of the plane through
//! `a, b, c`, i.e. iff the tetrahedron `(a, b, c, d)` has positive signed
//! volume. This matches the sign of [crate::metrics::signed_volume].

use crate::types::Vertex3;

// Exactly one of geogram or robust must be enabled.
#[cfg(not(any(feature = "geogram", feature = "robust")))]
compile_error!(
    "Exactly one of features 'geogram' or 'robust' must be enabled. Use default (geogram) or --no-default-features --features 'std,robust'."
);

#[cfg(all(feature = "geogram", feature = "robust"))]
compile_error!(
    "Features 'geogram' and 'robust' are mutually exclusive. For the pure-Rust backend use --no-default-features --features 'std,robust'."
);

#[cfg(all(feature = "geogram", not(feature = "robust")))]
mod imp {
    use super::*;
    use geogram_predicates as gp;

    #[inline]
    pub fn orient_3d(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> i8 {
        let r = -gp::orient_3d(a, b, c, d);
        if r > 0i16 {
            1
        } else if r < 0i16 {
            -1
        } else {
            0
        }
    }
}

#[cfg(all(feature = "robust", not(feature = "geogram")))]
mod imp {
    use super::*;
    use robust::{Coord3D, orient3d};

    #[inline]
    fn coord3(p: &Vertex3) -> Coord3D<f64> {
        Coord3D {
            x: p[0],
            y: p[1],
            z: p[2],
        }
    }

    #[inline]
    pub fn orient_3d(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> i8 {
        let r = -orient3d(coord3(a), coord3(b), coord3(c), coord3(d));
        if r > 0.0 {
            1
        } else if r < 0.0 {
            -1
        } else {
            0
        }
    }
}

// Re-export so call sites can use crate::predicates::orient_3d.
pub use imp::orient_3d;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::signed_volume;
    use tetrem_test_utils::sample_vertices_3d;

    #[test]
    fn orient_agrees_with_volume_on_random_tetrahedra() {
        let points = sample_vertices_3d(400, None);
        for quad in points.chunks_exact(4) {
            let volume = signed_volume(&quad[0], &quad[1], &quad[2], &quad[3]);
            if volume.abs() < 1e-12 {
                continue;
            }
            let expected = if volume > 0.0 { 1 } else { -1 };
            assert_eq!(orient_3d(&quad[0], &quad[1], &quad[2], &quad[3]), expected);
        }
    }

    #[test]
    fn orient_matches_signed_volume() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        let above = [0.3, 0.3, 1.0];
        let below = [0.3, 0.3, -1.0];

        assert_eq!(orient_3d(&a, &b, &c, &above), 1);
        assert!(signed_volume(&a, &b, &c, &above) > 0.0);

        assert_eq!(orient_3d(&a, &b, &c, &below), -1);
        assert!(signed_volume(&a, &b, &c, &below) < 0.0);
    }

    #[test]
    fn orient_detects_coplanarity() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 1.0, 0.0];
        let on_plane = [0.25, 0.25, 0.0];

        assert_eq!(orient_3d(&a, &b, &c, &on_plane), 0);
    }
}
