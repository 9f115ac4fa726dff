//! Long-edge subdivision.

use crate::complex::MeshComplex;
use crate::metrics;
use crate::queue::LengthEntry;
use std::collections::BinaryHeap;

/// Splits every eligible finite edge longer than `emax` at its midpoint,
/// longest first, until none remains. Returns the number of splits applied.
///
/// With `protect_boundaries`, edges on complex facets or complex edges are
/// left alone. Edges that touch no selected subdomain (exterior or purely
/// scaffold edges) are never split.
pub(crate) fn split_long_edges(
    cx: &mut MeshComplex,
    emax2: f64,
    protect_boundaries: bool,
) -> usize {
    let mut heap: BinaryHeap<LengthEntry> = BinaryHeap::new();
    for (a, b) in cx.triangulation().finite_edges() {
        let len2 =
            metrics::squared_distance(&cx.triangulation().point(a), &cx.triangulation().point(b));
        if len2 > emax2 {
            heap.push(LengthEntry::new(len2, a, b));
        }
    }

    let mut applied = 0;
    while let Some(entry) = heap.pop() {
        let tri = cx.triangulation();
        let (a, b) = (entry.a, entry.b);
        if !tri.is_live_vertex(a) || !tri.is_live_vertex(b) {
            continue;
        }
        if tri.find_edge_cell(a.idx, b.idx).is_none() {
            continue;
        }
        // reevaluate geometry on pop; the queue is lazy
        let len2 = metrics::squared_distance(&tri.point(a), &tri.point(b));
        if len2 <= emax2 {
            continue;
        }
        if !cx.edge_touches_real(a.idx, b.idx) {
            continue;
        }
        let dim = cx.edge_dimension(a, b);
        if protect_boundaries && dim < 3 {
            continue;
        }

        let p = metrics::midpoint(&tri.point(a), &tri.point(b));
        let m = match cx.tri_mut().insert_in_edge(a, b, p) {
            Ok(m) => m,
            Err(reason) => {
                log::trace!("split of {a}-{b} rejected: {reason}");
                continue;
            }
        };
        cx.split_constraint(a.idx, b.idx, m.idx);
        cx.tri_mut().set_in_dimension(m, dim);
        applied += 1;

        let tri = cx.triangulation();
        for u in tri.vertices_around_vertex(m.idx) {
            if u == tri.infinite_vertex().idx {
                continue;
            }
            let uh = tri.vertex_handle(u);
            let len2 = metrics::squared_distance(&tri.point(m), &tri.point(uh));
            if len2 > emax2 {
                heap.push(LengthEntry::new(len2, m, uh));
            }
        }
    }

    if applied > 0 {
        log::debug!("split: {applied} edges subdivided");
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangulation;
    use crate::types::OUTSIDE;
    use tetrem_test_utils::regular_tet;

    fn complex_with_edge_length(edge: f64, subdomain: u32) -> MeshComplex {
        let (points, cells) = regular_tet(edge);
        let tri = Triangulation::from_cells(&points, &cells, &[subdomain]).unwrap();
        MeshComplex::init(tri, |t, c| t.subdomain(c) != OUTSIDE, |_, _, _| false)
    }

    #[test]
    fn splits_until_no_long_edge_remains() {
        let mut cx = complex_with_edge_length(3.0, 1);
        let emax = 4.0 / 3.0;
        let emax2 = emax * emax;

        let applied = split_long_edges(&mut cx, emax2, false);
        assert!(applied > 0);
        assert!(cx.is_valid());

        let tri = cx.triangulation();
        for (a, b) in tri.finite_edges() {
            if !cx.edge_touches_real(a.idx, b.idx) {
                continue;
            }
            let len2 = metrics::squared_distance(&tri.point(a), &tri.point(b));
            assert!(len2 <= emax2, "edge {a}-{b} still too long");
        }
    }

    #[test]
    fn midpoints_inherit_the_edge_dimension() {
        let mut cx = complex_with_edge_length(3.0, 1);
        let before: Vec<_> = cx.triangulation().finite_vertices().collect();

        split_long_edges(&mut cx, (4.0 / 3.0) * (4.0 / 3.0), false);

        // a lone tetrahedron has no feature edges, so midpoints classify as
        // surface (on a subdivided hull facet) or volume, never lower
        let tri = cx.triangulation();
        for v in tri.finite_vertices() {
            if before.contains(&v) {
                continue;
            }
            assert!(tri.in_dimension(v) >= 2, "midpoint {v} over-classified");
        }
        assert!(cx.is_valid());
    }

    #[test]
    fn protection_skips_boundary_edges() {
        let mut cx = complex_with_edge_length(3.0, 1);
        // every edge of a single tetrahedron lies on the boundary
        let applied = split_long_edges(&mut cx, 0.01, true);
        assert_eq!(applied, 0);
        assert_eq!(cx.triangulation().num_vertices(), 4);
    }

    #[test]
    fn in_range_mesh_is_untouched() {
        let mut cx = complex_with_edge_length(1.0, 1);
        let applied = split_long_edges(&mut cx, (4.0 / 3.0) * (4.0 / 3.0), false);
        assert_eq!(applied, 0);
    }
}
