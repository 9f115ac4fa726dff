//! Quality-driven topological flips.
//!
//! Both flip directions are tried greedily and accepted only on strict
//! improvement of the minimum dihedral angle over the affected cells, so
//! every pass makes measurable progress and the phase terminates.

use crate::complex::MeshComplex;
use crate::metrics;
use crate::types::Tetrahedron3;
use smallvec::SmallVec;

/// Runs flip passes until one applies nothing. Returns the total number of
/// flips applied.
pub(crate) fn flip_pass(cx: &mut MeshComplex) -> usize {
    let mut total = 0;
    loop {
        let applied = flip_edges_3_2(cx) + flip_facets_2_3(cx);
        if applied == 0 {
            break;
        }
        total += applied;
    }
    if total > 0 {
        log::debug!("flip: {total} flips applied");
    }
    total
}

fn cell_points(cx: &MeshComplex, c: u32) -> Tetrahedron3 {
    cx.triangulation()
        .cd(c)
        .vertices
        .map(|v| cx.triangulation().vd(v).point)
}

/// Scans interior edges with a ring of exactly three equal-subdomain cells.
fn flip_edges_3_2(cx: &mut MeshComplex) -> usize {
    let edges = cx.triangulation().finite_edges();
    let mut applied = 0;

    for (a, b) in edges {
        let tri = cx.triangulation();
        if !tri.is_live_vertex(a) || !tri.is_live_vertex(b) {
            continue;
        }
        if cx.is_complex_edge(a, b) {
            continue;
        }
        let Some(ring) = tri.cells_around_edge(a.idx, b.idx) else {
            continue;
        };
        if ring.len() != 3 || ring.iter().any(|&c| tri.contains_infinite(c)) {
            continue;
        }
        let label = tri.cd(ring[0]).subdomain;
        if !cx.is_real_label(label) || ring.iter().any(|&c| tri.cd(c).subdomain != label) {
            continue;
        }

        let mut xs: SmallVec<[u32; 3]> = SmallVec::new();
        for &c in &ring {
            for &u in &tri.cd(c).vertices {
                if u != a.idx && u != b.idx && !xs.contains(&u) {
                    xs.push(u);
                }
            }
        }
        if xs.len() != 3 {
            continue;
        }

        let old_quality = ring
            .iter()
            .map(|&c| metrics::quality(&cell_points(cx, c)))
            .fold(f64::INFINITY, f64::min);

        let px = [
            tri.vd(xs[0]).point,
            tri.vd(xs[1]).point,
            tri.vd(xs[2]).point,
        ];
        let side_a = [px[0], px[1], px[2], tri.point(a)];
        let side_b = [px[0], px[1], px[2], tri.point(b)];
        let new_quality = metrics::quality(&side_a).min(metrics::quality(&side_b));
        if new_quality <= old_quality {
            continue;
        }

        if let Err(reason) = cx.tri_mut().flip_3_2(a, b) {
            log::trace!("3-2 flip of {a}-{b} rejected: {reason}");
        } else {
            applied += 1;
        }
    }

    applied
}

/// Scans interior facets between two equal-subdomain cells.
fn flip_facets_2_3(cx: &mut MeshComplex) -> usize {
    let facets = cx.triangulation().finite_facets();
    let mut applied = 0;

    for f in facets {
        let tri = cx.triangulation();
        if !tri.is_live_cell(f.cell) || tri.is_infinite_cell(f.cell) {
            continue;
        }
        let mirror = tri.mirror_facet(f);
        if tri.is_infinite_cell(mirror.cell) {
            continue;
        }
        let label = tri.subdomain(f.cell);
        if label != tri.subdomain(mirror.cell) || !cx.is_real_label(label) {
            continue;
        }

        let p = tri.cell_vertices(f.cell)[f.i as usize];
        let q = tri.cell_vertices(mirror.cell)[mirror.i as usize];

        let old_quality = metrics::quality(&cell_points(cx, f.cell.idx))
            .min(metrics::quality(&cell_points(cx, mirror.cell.idx)));

        let fv = tri.facet_vertices(f).map(|v| tri.point(v));
        let (pp, pq) = (tri.point(p), tri.point(q));
        let mut new_quality = f64::INFINITY;
        for k in 0..3 {
            let candidate = [fv[k], fv[(k + 1) % 3], pq, pp];
            new_quality = new_quality.min(metrics::quality(&candidate));
        }
        if new_quality <= old_quality {
            continue;
        }

        if let Err(reason) = cx.tri_mut().flip_2_3(f) {
            log::trace!("2-3 flip of {f} rejected: {reason}");
        } else {
            applied += 1;
        }
    }

    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangulation;
    use crate::types::OUTSIDE;

    fn wedge_ring() -> MeshComplex {
        // three thin wedges around a tall interior edge; the 3-to-2 flip
        // replaces them with two well-shaped cells over the equator triangle
        let h = 0.866_025_403_784_438_6;
        let points = vec![
            [0.0, 0.0, 1.5],
            [0.0, 0.0, -1.5],
            [1.0, 0.0, 0.0],
            [-0.5, h, 0.0],
            [-0.5, -h, 0.0],
        ];
        let cells = vec![[0, 1, 2, 3], [0, 1, 3, 4], [0, 1, 4, 2]];
        let tri = Triangulation::from_cells(&points, &cells, &[1, 1, 1]).unwrap();
        MeshComplex::init(tri, |t, c| t.subdomain(c) != OUTSIDE, |_, _, _| false)
    }

    #[test]
    fn three_to_two_improves_the_wedge_ring() {
        let mut cx = wedge_ring();
        let before = cx.par_min_quality();

        let applied = flip_pass(&mut cx);

        assert_eq!(applied, 1);
        assert!(cx.is_valid());
        assert_eq!(cx.triangulation().num_finite_cells(), 2);
        assert!(cx.par_min_quality() > before);
    }

    #[test]
    fn flips_never_cycle() {
        // running the pass again on the flipped configuration must be a no-op:
        // the reverse flip cannot also be a strict improvement
        let mut cx = wedge_ring();
        flip_pass(&mut cx);
        assert_eq!(flip_pass(&mut cx), 0);
        assert!(cx.is_valid());
    }

    #[test]
    fn subdomain_interfaces_are_never_flipped() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0 / 3.0, 1.0 / 3.0, 1.0],
            [1.0 / 3.0, 1.0 / 3.0, -1.0],
        ];
        let cells = vec![[0, 1, 2, 3], [0, 2, 1, 4]];
        let tri = Triangulation::from_cells(&points, &cells, &[1, 2]).unwrap();
        let mut cx = MeshComplex::init(tri, |t, c| t.subdomain(c) != OUTSIDE, |_, _, _| false);

        assert_eq!(flip_pass(&mut cx), 0);
        assert_eq!(cx.triangulation().num_finite_cells(), 2);
    }
}
