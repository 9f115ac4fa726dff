//! Dimension-aware vertex smoothing.
//!
//! Each vertex is relocated within the stratum it belongs to: volume vertices
//! toward the centroid of their one-ring, surface vertices tangentially along
//! their boundary patch, curve vertices along their feature chain. Corners
//! never move. A relocation is kept only when every incident finite cell
//! stays positively oriented and the minimum incident element quality does
//! not decrease.

use crate::complex::MeshComplex;
use crate::mesh::VertexHandle;
use crate::metrics;
use crate::predicates;
use crate::types::{Tetrahedron3, Vertex3};
use nalgebra::Vector3;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// One smoothing pass over every eligible vertex. Returns the number of
/// vertices actually relocated.
pub(crate) fn smooth_vertices(cx: &mut MeshComplex) -> usize {
    let candidates: Vec<VertexHandle> = cx
        .triangulation()
        .finite_vertices()
        .filter(|&v| (1..=3).contains(&cx.triangulation().in_dimension(v)))
        .collect();

    let mut moved = 0;
    for v in candidates {
        let dim = cx.triangulation().in_dimension(v);
        let target = match dim {
            3 => volume_target(cx, v),
            2 => surface_target(cx, v),
            1 => curve_target(cx, v),
            _ => None,
        };
        let Some(target) = target else {
            continue;
        };

        let current = cx.triangulation().point(v);
        let displacement2 = metrics::squared_distance(&current, &target);
        if displacement2 <= f64::EPSILON * (1.0 + metrics::squared_distance(&[0.0; 3], &current)) {
            continue;
        }

        if accept_move(cx, v, &target) {
            cx.tri_mut().set_point(v.idx, target);
            moved += 1;
        }
    }

    if moved > 0 {
        log::debug!("smooth: {moved} vertices relocated");
    }
    moved
}

/// Centroid of the one-ring over selected cells.
fn volume_target(cx: &MeshComplex, v: VertexHandle) -> Option<Vertex3> {
    let tri = cx.triangulation();
    let mut acc = Vector3::zeros();
    let mut seen: SmallVec<[u32; 32]> = SmallVec::new();

    for c in tri.cells_around_vertex(v.idx) {
        if !cx.is_real_label(cx.cell_label(c)) {
            continue;
        }
        for &u in &tri.cd(c).vertices {
            if u != v.idx && !seen.contains(&u) {
                seen.push(u);
                let p = tri.vd(u).point;
                acc += Vector3::new(p[0], p[1], p[2]);
            }
        }
    }

    if seen.is_empty() {
        return None;
    }
    let c = acc / seen.len() as f64;
    Some([c.x, c.y, c.z])
}

/// Centroid of the same-surface neighbors, projected back onto the tangent
/// plane estimated from the incident complex-facet normals.
fn surface_target(cx: &MeshComplex, v: VertexHandle) -> Option<Vertex3> {
    let tri = cx.triangulation();
    let neighbors = cx.surface_neighbors(v.idx);
    if neighbors.is_empty() {
        return None;
    }

    let mut acc = Vector3::zeros();
    for &u in &neighbors {
        let p = tri.vd(u).point;
        acc += Vector3::new(p[0], p[1], p[2]);
    }
    let centroid = acc / neighbors.len() as f64;

    // area-weighted normal over each incident complex facet, counted once
    // and sign-aligned to the first
    let mut normal = Vector3::zeros();
    let mut seen: FxHashSet<[u32; 3]> = FxHashSet::default();
    for c in tri.cells_around_vertex(v.idx) {
        let Some(slot) = tri.vertex_slot(c, v.idx) else {
            continue;
        };
        for j in 0..4 {
            if j == slot {
                continue;
            }
            let f = crate::mesh::Facet {
                cell: tri.cell_handle(c),
                i: j as u8,
            };
            if !cx.is_complex_facet(f) {
                continue;
            }
            let verts = tri.facet_verts_raw(c, j);
            let mut key = verts;
            key.sort_unstable();
            if !seen.insert(key) {
                continue;
            }
            let [a, b, w] = verts.map(|u| tri.vd(u).point);
            let mut n = metrics::facet_normal(&a, &b, &w);
            if n.dot(&normal) < 0.0 {
                n = -n;
            }
            normal += n;
        }
    }
    let norm = normal.norm();
    if norm == 0.0 {
        return None;
    }
    let normal = normal / norm;

    let p = tri.point(v);
    let offset = centroid - Vector3::new(p[0], p[1], p[2]);
    let projected = centroid - normal * normal.dot(&offset);
    Some([projected.x, projected.y, projected.z])
}

/// Midpoint of the two neighbors along the feature chain.
fn curve_target(cx: &MeshComplex, v: VertexHandle) -> Option<Vertex3> {
    let tri = cx.triangulation();
    let mut chain: SmallVec<[u32; 4]> = SmallVec::new();
    for u in tri.vertices_around_vertex(v.idx) {
        if u == tri.infinite_vertex().idx {
            continue;
        }
        if cx.is_complex_edge(v, tri.vertex_handle(u)) {
            chain.push(u);
        }
    }
    if chain.len() != 2 {
        return None;
    }
    Some(metrics::midpoint(
        &tri.vd(chain[0]).point,
        &tri.vd(chain[1]).point,
    ))
}

/// Whether relocating `v` keeps every incident finite cell positive and the
/// minimum incident selected-cell quality from decreasing.
fn accept_move(cx: &MeshComplex, v: VertexHandle, target: &Vertex3) -> bool {
    let tri = cx.triangulation();
    let mut old_quality = f64::INFINITY;
    let mut new_quality = f64::INFINITY;

    for c in tri.cells_around_vertex(v.idx) {
        if tri.contains_infinite(c) {
            continue;
        }
        let vs = tri.cd(c).vertices;
        let old_pts: Tetrahedron3 = vs.map(|u| tri.vd(u).point);
        let new_pts: Tetrahedron3 =
            core::array::from_fn(|k| if vs[k] == v.idx { *target } else { old_pts[k] });

        if predicates::orient_3d(&new_pts[0], &new_pts[1], &new_pts[2], &new_pts[3]) <= 0 {
            return false;
        }
        if cx.is_real_label(cx.cell_label(c)) {
            old_quality = old_quality.min(metrics::quality(&old_pts));
            new_quality = new_quality.min(metrics::quality(&new_pts));
        }
    }

    new_quality >= old_quality
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangulation;
    use crate::types::OUTSIDE;
    use tetrem_test_utils::regular_tet;

    fn select_tagged(t: &Triangulation, c: crate::mesh::CellHandle) -> bool {
        t.subdomain(c) != OUTSIDE
    }

    #[test]
    fn an_optimal_element_is_left_alone() {
        let (points, cells) = regular_tet(1.0);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let mut cx = MeshComplex::init(tri, select_tagged, |_, _, _| false);

        let before: Vec<_> = cx
            .triangulation()
            .finite_vertices()
            .map(|v| cx.triangulation().point(v))
            .collect();
        let moved = smooth_vertices(&mut cx);
        let after: Vec<_> = cx
            .triangulation()
            .finite_vertices()
            .map(|v| cx.triangulation().point(v))
            .collect();

        assert_eq!(moved, 0);
        assert_eq!(before, after);
    }

    #[test]
    fn interior_vertex_relaxes_toward_the_ring_centroid() {
        let (points, cells) = regular_tet(2.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let c = tri.finite_cells().next().unwrap();
        let pts = tri.cell_vertices(c).map(|v| tri.point(v));
        let mut centroid = [0.0; 3];
        for p in pts {
            for (o, x) in centroid.iter_mut().zip(p) {
                *o += x / 4.0;
            }
        }
        // off-center interior vertex; rejected samples land outside the cell
        let (m, jittered) = loop {
            let candidate = tetrem_test_utils::jitter(centroid, 0.05);
            if let Ok(m) = tri.insert_in_cell(c, candidate) {
                break (m, candidate);
            }
        };
        tri.set_in_dimension(m, 3);
        let mut cx = MeshComplex::init(tri, select_tagged, |_, _, _| false);

        let quality_before = cx.par_min_quality();
        let moved = smooth_vertices(&mut cx);
        assert!(moved >= 1);
        assert!(cx.is_valid());
        assert!(cx.par_min_quality() >= quality_before);

        let after = cx.triangulation().point(m);
        assert!(
            metrics::squared_distance(&after, &centroid)
                < metrics::squared_distance(&jittered, &centroid)
        );
    }

    #[test]
    fn corners_never_move() {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        for v in tri.finite_vertices().collect::<Vec<_>>() {
            tri.set_in_dimension(v, 0);
        }
        let mut cx = MeshComplex::init(tri, select_tagged, |_, _, _| false);

        let before: Vec<_> = cx
            .triangulation()
            .finite_vertices()
            .map(|v| cx.triangulation().point(v))
            .collect();
        assert_eq!(smooth_vertices(&mut cx), 0);
        let after: Vec<_> = cx
            .triangulation()
            .finite_vertices()
            .map(|v| cx.triangulation().point(v))
            .collect();
        assert_eq!(before, after);
    }
}
