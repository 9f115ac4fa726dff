//! The protective layer of imaginary cells.
//!
//! Wrapping the domain in one layer of tagged scaffold cells turns every real
//! boundary facet into an interior facet, so the local operators need no
//! boundary special cases. The layer is added before the remeshing loop and
//! removed from the complex afterwards; the triangulation keeps the scaffold
//! geometry.

use crate::complex::MeshComplex;
use crate::mesh::Facet;
use crate::metrics;
use crate::types::OUTSIDE;

/// Materializes the layer.
///
/// Every complex facet whose exterior side is an infinite cell gets a fresh
/// vertex, placed by reflecting the facet's interior opposite vertex across
/// the facet plane, inserted into the infinite cell; the finite child is
/// tagged imaginary. An exterior side that is already a finite `OUTSIDE`
/// cell is tagged directly, which makes re-adding a previously stripped
/// layer restore the identical cell count and tag pattern.
///
/// Returns the number of cells added to the layer.
pub(crate) fn add_layer(cx: &mut MeshComplex) -> usize {
    let mut boundary: Vec<Facet> = Vec::new();
    for f in cx.triangulation().finite_facets() {
        if !cx.is_complex_facet(f) {
            continue;
        }
        let (s1, s2) = cx.facet_labels(f);
        // orient the facet so its cell is on the selected side
        if cx.is_real_label(s1) && !cx.is_real_label(s2) {
            boundary.push(f);
        } else if cx.is_real_label(s2) && !cx.is_real_label(s1) {
            boundary.push(cx.triangulation().mirror_facet(f));
        }
    }

    let imaginary = cx.imaginary_index();
    let mut added = 0;

    for f in boundary {
        let mirror = cx.triangulation().mirror_facet(f);
        let outside = mirror.cell;

        if !cx.triangulation().is_infinite_cell(outside) {
            if cx.triangulation().subdomain(outside) == OUTSIDE {
                cx.tri_mut().set_subdomain(outside, imaginary);
                added += 1;
            }
            continue;
        }

        let [a, b, c] = cx.triangulation().facet_vertices(f).map(|v| {
            cx.triangulation().point(v)
        });
        let opposite = cx.triangulation().cell_vertices(f.cell)[f.i as usize];
        let inner = cx.triangulation().point(opposite);
        let Some(outside_point) = metrics::reflect_across_plane(&inner, &a, &b, &c) else {
            continue;
        };

        match cx.tri_mut().insert_in_cell(outside, outside_point) {
            Ok(fresh) => {
                let tri = cx.tri_mut();
                tri.set_in_dimension(fresh, 3);
                let scaffold: Vec<_> = tri
                    .cells_around_vertex(fresh.idx)
                    .iter()
                    .map(|&c| tri.cell_handle(c))
                    .filter(|&c| !tri.is_infinite_cell(c))
                    .collect();
                for cell in scaffold {
                    tri.set_subdomain(cell, imaginary);
                    added += 1;
                }
            }
            Err(reason) => {
                log::debug!("skipping scaffold cell on {f}: {reason}");
            }
        }
    }

    log::debug!("protective layer: {added} imaginary cells");
    added
}

/// Removes the layer from the complex by relabelling imaginary cells as
/// exterior. The scaffold vertices and cells stay in the triangulation.
pub(crate) fn strip_layer(cx: &mut MeshComplex) -> usize {
    let imaginary = cx.imaginary_index();
    let layer: Vec<_> = cx
        .triangulation()
        .finite_cells()
        .filter(|&c| cx.triangulation().subdomain(c) == imaginary)
        .collect();
    let stripped = layer.len();
    for c in layer {
        cx.tri_mut().set_subdomain(c, OUTSIDE);
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Triangulation;
    use crate::types::OUTSIDE;
    use tetrem_test_utils::regular_tet;

    fn build_complex() -> MeshComplex {
        let (points, cells) = regular_tet(1.0);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        MeshComplex::init(tri, |t, c| t.subdomain(c) != OUTSIDE, |_, _, _| false)
    }

    #[test]
    fn layer_covers_every_boundary_facet() {
        let mut cx = build_complex();
        let boundary_before: Vec<_> = cx
            .triangulation()
            .finite_facets()
            .into_iter()
            .filter(|&f| cx.is_complex_facet(f))
            .collect();
        assert_eq!(boundary_before.len(), 4);

        let added = add_layer(&mut cx);
        assert_eq!(added, 4);
        assert!(cx.is_valid());

        // every complex facet now has two finite incident cells
        let tri = cx.triangulation();
        for f in tri.finite_facets() {
            if cx.is_complex_facet(f) {
                assert!(!tri.is_infinite_cell(f.cell));
                assert!(!tri.is_infinite_cell(tri.mirror_facet(f).cell));
            }
        }
        // the boundary is still exactly four complex facets
        let boundary_after = tri
            .finite_facets()
            .into_iter()
            .filter(|&f| cx.is_complex_facet(f))
            .count();
        assert_eq!(boundary_after, 4);
    }

    #[test]
    fn strip_then_add_restores_the_same_layer() {
        let mut cx = build_complex();
        add_layer(&mut cx);

        let cells_before = cx.triangulation().num_cells();
        let layer_before: Vec<u32> = cx
            .triangulation()
            .finite_cells()
            .filter(|&c| cx.triangulation().subdomain(c) == cx.imaginary_index())
            .map(|c| c.index() as u32)
            .collect();
        assert_eq!(layer_before.len(), 4);

        let stripped = strip_layer(&mut cx);
        assert_eq!(stripped, 4);
        assert!(cx.is_valid());

        let re_added = add_layer(&mut cx);
        assert_eq!(re_added, 4);
        assert_eq!(cx.triangulation().num_cells(), cells_before);
        let layer_after: Vec<u32> = cx
            .triangulation()
            .finite_cells()
            .filter(|&c| cx.triangulation().subdomain(c) == cx.imaginary_index())
            .map(|c| c.index() as u32)
            .collect();
        assert_eq!(layer_before, layer_after);
    }
}
