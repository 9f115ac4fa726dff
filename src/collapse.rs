//! Short-edge collapse.

use crate::complex::MeshComplex;
use crate::error::Rejection;
use crate::mesh::{Facet, VertexHandle};
use crate::metrics;
use crate::queue::LengthEntry;
use crate::types::Subdomain;
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Collapses every eligible finite edge shorter than `emin`, shortest first.
/// Returns the number of collapses applied.
///
/// The merge direction is constrained: a corner is always the target, a
/// lower-dimensional endpoint is always the target, and with
/// `protect_boundaries` a boundary edge may only collapse within its own
/// surface or feature curve. Candidates are rejected when they would change
/// topology (link condition), invert a cell, create an over-long edge, or
/// erase subdomain structure around the survivor.
pub(crate) fn collapse_short_edges(
    cx: &mut MeshComplex,
    emin2: f64,
    emax2: f64,
    protect_boundaries: bool,
) -> usize {
    let mut heap: BinaryHeap<Reverse<LengthEntry>> = BinaryHeap::new();
    for (a, b) in cx.triangulation().finite_edges() {
        let len2 =
            metrics::squared_distance(&cx.triangulation().point(a), &cx.triangulation().point(b));
        if len2 < emin2 {
            heap.push(Reverse(LengthEntry::new(len2, a, b)));
        }
    }

    let mut applied = 0;
    while let Some(Reverse(entry)) = heap.pop() {
        let tri = cx.triangulation();
        let (a, b) = (entry.a, entry.b);
        if !tri.is_live_vertex(a) || !tri.is_live_vertex(b) {
            continue;
        }
        if tri.find_edge_cell(a.idx, b.idx).is_none() {
            continue;
        }
        let len2 = metrics::squared_distance(&tri.point(a), &tri.point(b));
        if len2 >= emin2 {
            continue;
        }
        if !cx.edge_touches_real(a.idx, b.idx) {
            continue;
        }

        let corner_a = cx.is_corner(a);
        let corner_b = cx.is_corner(b);
        let da = tri.in_dimension(a);
        let db = tri.in_dimension(b);

        let mut directions: SmallVec<[(VertexHandle, VertexHandle); 2]> = SmallVec::new();
        if corner_a && corner_b {
            continue; // merging two corners always destroys one
        } else if corner_a {
            directions.push((b, a));
        } else if corner_b {
            directions.push((a, b));
        } else if da < db {
            directions.push((b, a));
        } else if db < da {
            directions.push((a, b));
        } else {
            directions.push((a, b));
            directions.push((b, a));
        }

        for (src, tgt) in directions {
            match try_collapse(cx, src, tgt, emax2, protect_boundaries) {
                Ok(()) => {
                    applied += 1;
                    let tri = cx.triangulation();
                    for u in tri.vertices_around_vertex(tgt.idx) {
                        if u == tri.infinite_vertex().idx {
                            continue;
                        }
                        let uh = tri.vertex_handle(u);
                        let len2 = metrics::squared_distance(&tri.point(tgt), &tri.point(uh));
                        if len2 < emin2 {
                            heap.push(Reverse(LengthEntry::new(len2, tgt, uh)));
                        }
                    }
                    break;
                }
                Err(reason) => {
                    log::trace!("collapse {src} -> {tgt} rejected: {reason}");
                }
            }
        }
    }

    if applied > 0 {
        log::debug!("collapse: {applied} edges merged");
    }
    applied
}

fn try_collapse(
    cx: &mut MeshComplex,
    src: VertexHandle,
    tgt: VertexHandle,
    emax2: f64,
    protect_boundaries: bool,
) -> Result<(), Rejection> {
    let tri = cx.triangulation();
    let sdim = tri.in_dimension(src);
    let tdim = tri.in_dimension(tgt);
    let edge_dim = cx.edge_dimension(src, tgt);

    let ring = tri
        .cells_around_edge(src.idx, tgt.idx)
        .ok_or(Rejection::Missing)?;

    if protect_boundaries {
        if edge_dim <= 2 {
            // a boundary edge may only collapse within its own stratum
            if sdim != tdim || sdim != edge_dim {
                return Err(Rejection::Protected);
            }
            if edge_dim == 1 {
                // feature curves must stay locally chains
                if cx.curve_degree(src.idx) != 2 || cx.curve_degree(tgt.idx) != 2 {
                    return Err(Rejection::Protected);
                }
            } else {
                // the boundary surface around the edge must be a manifold
                // strip: exactly two complex facets, and no surface pinch
                let mut apexes: SmallVec<[u32; 4]> = SmallVec::new();
                for &c in &ring {
                    let (Some(ss), Some(ts)) = (
                        tri.vertex_slot(c, src.idx),
                        tri.vertex_slot(c, tgt.idx),
                    ) else {
                        continue;
                    };
                    for j in 0..4 {
                        if j == ss || j == ts {
                            continue;
                        }
                        let f = Facet {
                            cell: tri.cell_handle(c),
                            i: j as u8,
                        };
                        if cx.is_complex_facet(f) {
                            let third = (0..4)
                                .find(|&k| k != j && k != ss && k != ts)
                                .ok_or(Rejection::Topology)?;
                            let x = tri.cd(c).vertices[third];
                            if !apexes.contains(&x) {
                                apexes.push(x);
                            }
                        }
                    }
                }
                if apexes.len() != 2 {
                    return Err(Rejection::Protected);
                }
                let src_surface = cx.surface_neighbors(src.idx);
                let tgt_surface = cx.surface_neighbors(tgt.idx);
                for &x in &src_surface {
                    if x != tgt.idx && tgt_surface.contains(&x) && !apexes.contains(&x) {
                        return Err(Rejection::Protected);
                    }
                }
            }
        } else if sdim <= 2 {
            // removing a boundary vertex through the volume tears the surface
            return Err(Rejection::Protected);
        }
    }

    debug_assert!(sdim >= tdim, "direction selection must aim at the lower stratum");

    // the survivor must keep every subdomain it and the source touch
    let mut before: SmallVec<[Subdomain; 8]> = cx.incident_labels(src.idx);
    for s in cx.incident_labels(tgt.idx) {
        if !before.contains(&s) {
            before.push(s);
        }
    }
    let mut after: SmallVec<[Subdomain; 8]> = SmallVec::new();
    let tri = cx.triangulation();
    for v in [src.idx, tgt.idx] {
        for c in tri.cells_around_vertex(v) {
            if ring.contains(&c) {
                continue;
            }
            let s = {
                let label = cx.cell_label(c);
                if label == cx.imaginary_index() { crate::types::OUTSIDE } else { label }
            };
            if !after.contains(&s) {
                after.push(s);
            }
        }
    }
    if after.len() < before.len() {
        return Err(Rejection::FeatureLoss);
    }

    // no collapse that immediately needs a re-split
    let target_point = tri.point(tgt);
    for u in tri.vertices_around_vertex(src.idx) {
        if u == tgt.idx || u == tri.infinite_vertex().idx {
            continue;
        }
        let p = tri.vd(u).point;
        if metrics::squared_distance(&target_point, &p) > emax2 {
            return Err(Rejection::Overstretch);
        }
    }

    // link condition and cell orientation are enforced by the primitive
    cx.tri_mut().remove_vertex_toward(src, tgt)?;
    cx.transfer_constraints(src.idx, tgt.idx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangulation;
    use crate::types::OUTSIDE;
    use tetrem_test_utils::{facet_pair, regular_tet};

    fn select_tagged(t: &Triangulation, c: crate::mesh::CellHandle) -> bool {
        t.subdomain(c) != OUTSIDE
    }

    fn tet_with_interior_vertex() -> MeshComplex {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let c = tri.finite_cells().next().unwrap();
        let pts = tri.cell_vertices(c).map(|v| tri.point(v));
        let mut centroid = [0.0; 3];
        for p in pts {
            for (o, x) in centroid.iter_mut().zip(p) {
                *o += x / 4.0;
            }
        }
        let m = tri.insert_in_cell(c, centroid).unwrap();
        tri.set_in_dimension(m, 3);
        MeshComplex::init(tri, select_tagged, |_, _, _| false)
    }

    #[test]
    fn interior_vertex_merges_into_the_boundary() {
        let mut cx = tet_with_interior_vertex();
        // the centroid edges are short, the boundary edges are not
        let applied = collapse_short_edges(&mut cx, 0.64, 100.0, false);

        assert_eq!(applied, 1);
        assert!(cx.is_valid());
        assert_eq!(cx.triangulation().num_finite_cells(), 1);
        assert_eq!(cx.triangulation().num_vertices(), 4);
    }

    #[test]
    fn collapse_rejected_when_it_would_overstretch() {
        let mut cx = tet_with_interior_vertex();
        // surviving edges would measure ~1.0, far above emax
        let applied = collapse_short_edges(&mut cx, 0.64, 0.25, false);

        assert_eq!(applied, 0);
        assert_eq!(cx.triangulation().num_vertices(), 5);
        assert!(cx.is_valid());
    }

    #[test]
    fn protected_boundary_survives_aggressive_thresholds() {
        let (points, cells) = facet_pair(0.7);
        let tri = Triangulation::from_cells(&points, &cells, &[1, 2]).unwrap();
        let mut cx = MeshComplex::init(tri, select_tagged, |_, _, _| false);

        let facets_before = cx
            .triangulation()
            .finite_facets()
            .into_iter()
            .filter(|&f| cx.is_complex_facet(f))
            .count();

        // every edge is below the threshold, yet nothing may collapse
        let applied = collapse_short_edges(&mut cx, 100.0, 1000.0, true);
        assert_eq!(applied, 0);
        assert!(cx.is_valid());

        let facets_after = cx
            .triangulation()
            .finite_facets()
            .into_iter()
            .filter(|&f| cx.is_complex_facet(f))
            .count();
        assert_eq!(facets_before, facets_after);
    }
}
