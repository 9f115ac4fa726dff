//! The complex: subdomain tags, boundary facets, feature edges and corners
//! overlaid on the triangulation.
//!
//! Complex facets and edges are derived from the cell tags (plus the
//! caller-declared constrained edges and corners), so the classification can
//! never drift out of sync with the triangulation.

use crate::mesh::{CellHandle, Facet, Triangulation, VertexHandle};
use crate::metrics;
use crate::types::{OUTSIDE, Subdomain, Tetrahedron3};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

const fn edge_key(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

/// A triangulation decorated with domain structure.
pub struct MeshComplex {
    tri: Triangulation,
    /// Caller-declared feature edges, as canonical vertex index pairs.
    constrained: FxHashSet<(u32, u32)>,
    corners: FxHashSet<u32>,
    /// Reserved label of the protective cell layer, `max subdomain + 1`.
    imaginary: Subdomain,
}

impl MeshComplex {
    /// Builds the complex over an adopted triangulation.
    ///
    /// Cells refused by `cell_selector` are relabelled `OUTSIDE`. Vertex
    /// dimensions are seeded from the selected cells and lowered along
    /// boundary facets, feature edges and corners. A mesh without any
    /// selected subdomain is accepted with a warning; remeshing it is
    /// unlikely to do anything useful.
    pub fn init<S, E>(mut tri: Triangulation, cell_selector: S, edge_is_constrained: E) -> Self
    where
        S: Fn(&Triangulation, CellHandle) -> bool,
        E: Fn(&Triangulation, VertexHandle, VertexHandle) -> bool,
    {
        let mut max_si = 0;
        let deselected: Vec<CellHandle> = tri
            .finite_cells()
            .filter(|&c| !cell_selector(&tri, c))
            .collect();
        for c in deselected {
            tri.set_subdomain(c, OUTSIDE);
        }
        for c in tri.finite_cells() {
            max_si = max_si.max(tri.subdomain(c));
        }
        if max_si == 0 {
            log::warn!("no cell belongs to any subdomain; remeshing is likely to fail");
        }

        // volume seed for every still unclassified vertex
        let unclassified: Vec<VertexHandle> = tri
            .finite_vertices()
            .filter(|&v| tri.in_dimension(v) < 0)
            .collect();
        for v in unclassified {
            tri.set_in_dimension(v, 3);
        }

        let mut cx = Self {
            tri,
            constrained: FxHashSet::default(),
            corners: FxHashSet::default(),
            imaginary: max_si + 1,
        };

        // lower to surface dimension along subdomain boundaries
        for f in cx.tri.finite_facets() {
            if cx.is_complex_facet(f) {
                for v in cx.tri.facet_vertices(f) {
                    cx.lower_dimension(v, 2);
                }
            }
        }

        // feature edges: declared by the caller, or bounding more than two
        // subdomains
        let mut complex_edges: Vec<(VertexHandle, VertexHandle)> = Vec::new();
        for (a, b) in cx.tri.finite_edges() {
            if edge_is_constrained(&cx.tri, a, b) {
                cx.constrained.insert(edge_key(a.idx, b.idx));
            }
            if cx.is_complex_edge(a, b) {
                complex_edges.push((a, b));
            }
        }
        for &(a, b) in &complex_edges {
            cx.lower_dimension(a, 1);
            cx.lower_dimension(b, 1);
        }

        // corners: marked on input, or meeting more than two feature edges
        let mut edge_degree: FxHashMap<u32, u32> = FxHashMap::default();
        for &(a, b) in &complex_edges {
            *edge_degree.entry(a.idx).or_default() += 1;
            *edge_degree.entry(b.idx).or_default() += 1;
        }
        let corner_candidates: Vec<VertexHandle> = cx
            .tri
            .finite_vertices()
            .filter(|v| {
                cx.tri.in_dimension(*v) == 0
                    || edge_degree.get(&v.idx).copied().unwrap_or(0) > 2
            })
            .collect();
        for v in corner_candidates {
            cx.register_corner(v.idx);
        }

        cx
    }

    /// The underlying triangulation.
    pub const fn triangulation(&self) -> &Triangulation {
        &self.tri
    }

    pub(crate) const fn tri_mut(&mut self) -> &mut Triangulation {
        &mut self.tri
    }

    /// The reserved subdomain label of the protective layer.
    pub const fn imaginary_index(&self) -> Subdomain {
        self.imaginary
    }

    /// Hands the triangulation back to the caller.
    pub fn finalize(self) -> Triangulation {
        self.tri
    }

    fn lower_dimension(&mut self, v: VertexHandle, dim: i8) {
        let current = self.tri.in_dimension(v);
        if current < 0 || current > dim {
            self.tri.set_in_dimension(v, dim);
        }
    }

    pub(crate) fn register_corner(&mut self, v: u32) {
        self.corners.insert(v);
        let handle = self.tri.vertex_handle(v);
        self.tri.set_in_dimension(handle, 0);
    }

    /// Whether the vertex is a corner of the complex.
    pub fn is_corner(&self, v: VertexHandle) -> bool {
        self.corners.contains(&v.idx)
    }

    /// Subdomain label of a cell by arena index, with infinite cells reading
    /// as `OUTSIDE`.
    pub(crate) fn cell_label(&self, c: u32) -> Subdomain {
        if self.tri.contains_infinite(c) {
            OUTSIDE
        } else {
            self.tri.cd(c).subdomain
        }
    }

    /// Label with the protective layer folded into the exterior; feature
    /// classification must not change when the layer appears or disappears.
    fn folded_label(&self, c: u32) -> Subdomain {
        let s = self.cell_label(c);
        if s == self.imaginary { OUTSIDE } else { s }
    }

    pub(crate) fn is_real_label(&self, s: Subdomain) -> bool {
        s != OUTSIDE && s != self.imaginary
    }

    /// Labels on the two sides of a facet.
    pub(crate) fn facet_labels(&self, f: Facet) -> (Subdomain, Subdomain) {
        let mirror = self.tri.mirror_facet(f);
        (self.cell_label(f.cell.idx), self.cell_label(mirror.cell.idx))
    }

    /// A facet is complex when its sides carry different labels, except at
    /// the outer skin of the protective layer.
    pub fn is_complex_facet(&self, f: Facet) -> bool {
        let (s1, s2) = self.facet_labels(f);
        if s1 == s2 {
            return false;
        }
        let skin = (s1 == self.imaginary && s2 == OUTSIDE)
            || (s2 == self.imaginary && s1 == OUTSIDE);
        !skin
    }

    /// An edge is complex when the caller constrained it or when it bounds
    /// more than two subdomains.
    pub fn is_complex_edge(&self, a: VertexHandle, b: VertexHandle) -> bool {
        if self.constrained.contains(&edge_key(a.idx, b.idx)) {
            return true;
        }
        self.edge_label_count(a.idx, b.idx) > 2
    }

    fn edge_label_count(&self, a: u32, b: u32) -> usize {
        let Some(ring) = self.tri.cells_around_edge(a, b) else {
            return 0;
        };
        let mut labels: SmallVec<[Subdomain; 8]> = SmallVec::new();
        for &c in &ring {
            let s = self.folded_label(c);
            if !labels.contains(&s) {
                labels.push(s);
            }
        }
        labels.len()
    }

    /// Rewrites the constraint on `(a, b)` to its two halves around `m`.
    pub(crate) fn split_constraint(&mut self, a: u32, b: u32, m: u32) {
        if self.constrained.remove(&edge_key(a, b)) {
            self.constrained.insert(edge_key(a, m));
            self.constrained.insert(edge_key(m, b));
        }
    }

    /// Moves every constraint incident to `src` onto `tgt`.
    pub(crate) fn transfer_constraints(&mut self, src: u32, tgt: u32) {
        let moved: Vec<(u32, u32)> = self
            .constrained
            .iter()
            .filter(|&&(x, y)| x == src || y == src)
            .copied()
            .collect();
        for (x, y) in moved {
            self.constrained.remove(&(x, y));
            let other = if x == src { y } else { x };
            if other != tgt {
                self.constrained.insert(edge_key(other, tgt));
            }
        }
    }

    /// Whether the edge lies on a complex facet.
    pub fn edge_on_complex_facet(&self, a: VertexHandle, b: VertexHandle) -> bool {
        let Some(ring) = self.tri.cells_around_edge(a.idx, b.idx) else {
            return false;
        };
        for &c in &ring {
            let (Some(sa), Some(sb)) = (
                self.tri.vertex_slot(c, a.idx),
                self.tri.vertex_slot(c, b.idx),
            ) else {
                continue;
            };
            for j in 0..4 {
                if j == sa || j == sb {
                    continue;
                }
                let f = Facet {
                    cell: self.tri.cell_handle(c),
                    i: j as u8,
                };
                if self.is_complex_facet(f) {
                    return true;
                }
            }
        }
        false
    }

    /// Dimension of the lowest complex element an edge lies on: 1 for a
    /// complex edge, 2 on a complex facet, 3 in a volume.
    pub fn edge_dimension(&self, a: VertexHandle, b: VertexHandle) -> i8 {
        if self.is_complex_edge(a, b) {
            1
        } else if self.edge_on_complex_facet(a, b) {
            2
        } else {
            3
        }
    }

    /// Whether any cell of the edge ring belongs to a selected subdomain.
    pub(crate) fn edge_touches_real(&self, a: u32, b: u32) -> bool {
        let Some(ring) = self.tri.cells_around_edge(a, b) else {
            return false;
        };
        ring.iter().any(|&c| self.is_real_label(self.cell_label(c)))
    }

    /// Distinct folded labels of the cells incident to a vertex.
    pub(crate) fn incident_labels(&self, v: u32) -> SmallVec<[Subdomain; 8]> {
        let mut labels: SmallVec<[Subdomain; 8]> = SmallVec::new();
        for c in self.tri.cells_around_vertex(v) {
            let s = self.folded_label(c);
            if !labels.contains(&s) {
                labels.push(s);
            }
        }
        labels
    }

    /// Number of complex edges meeting at a vertex.
    pub(crate) fn curve_degree(&self, v: u32) -> usize {
        let handle = self.tri.vertex_handle(v);
        self.tri
            .vertices_around_vertex(v)
            .iter()
            .filter(|&&u| {
                u != self.tri.infinite_vertex().idx
                    && self.is_complex_edge(handle, self.tri.vertex_handle(u))
            })
            .count()
    }

    /// Vertices sharing a complex facet with `v`.
    pub(crate) fn surface_neighbors(&self, v: u32) -> SmallVec<[u32; 16]> {
        let mut out: SmallVec<[u32; 16]> = SmallVec::new();
        for c in self.tri.cells_around_vertex(v) {
            let Some(slot) = self.tri.vertex_slot(c, v) else {
                continue;
            };
            for j in 0..4 {
                if j == slot {
                    continue;
                }
                let f = Facet {
                    cell: self.tri.cell_handle(c),
                    i: j as u8,
                };
                if self.is_complex_facet(f) {
                    for u in self.tri.facet_verts_raw(c, j) {
                        if u != v && !out.contains(&u) {
                            out.push(u);
                        }
                    }
                }
            }
        }
        out
    }

    /// Whether every measurable edge has reached the target length window.
    ///
    /// Complex edges, edges on complex facets and edges outside the selected
    /// subdomains are not measured.
    pub fn resolution_reached(&self, emin2: f64, emax2: f64) -> bool {
        let edges = self.tri.finite_edges();
        edges.par_iter().all(|&(a, b)| {
            if !self.edge_touches_real(a.idx, b.idx) {
                return true;
            }
            if self.is_complex_edge(a, b) || self.edge_on_complex_facet(a, b) {
                return true;
            }
            let len2 = metrics::squared_distance(&self.tri.point(a), &self.tri.point(b));
            (emin2..=emax2).contains(&len2)
        })
    }

    /// Minimum element quality over the selected subdomains, in parallel.
    pub fn par_min_quality(&self) -> f64 {
        let cells: Vec<Tetrahedron3> = self
            .tri
            .finite_cells()
            .filter(|&c| self.is_real_label(self.tri.subdomain(c)))
            .map(|c| self.tri.cell_vertices(c).map(|v| self.tri.point(v)))
            .collect();
        cells
            .par_iter()
            .map(metrics::quality)
            .reduce(|| f64::INFINITY, f64::min)
    }

    /// Audits the triangulation and every tag invariant, logging violations.
    pub fn is_valid(&self) -> bool {
        if !self.tri.is_valid() {
            return false;
        }
        let mut valid = true;

        for v in self.tri.finite_vertices() {
            let dim = self.tri.in_dimension(v);
            if !(0..=3).contains(&dim) {
                log::error!("vertex {v}: unclassified dimension {dim}");
                valid = false;
            }
        }

        for f in self.tri.finite_facets() {
            if self.is_complex_facet(f) {
                for v in self.tri.facet_vertices(f) {
                    if self.tri.in_dimension(v) > 2 {
                        log::error!("vertex {v}: lies on a complex facet but has volume dimension");
                        valid = false;
                    }
                }
            }
        }

        for (a, b) in self.tri.finite_edges() {
            if self.is_complex_edge(a, b) {
                for v in [a, b] {
                    if self.tri.in_dimension(v) > 1 {
                        log::error!("vertex {v}: lies on a complex edge but has dimension > 1");
                        valid = false;
                    }
                }
            }
        }

        for &c in &self.corners {
            let v = self.tri.vertex_handle(c);
            if self.tri.in_dimension(v) != 0 {
                log::error!("vertex {v}: registered corner with nonzero dimension");
                valid = false;
            }
        }

        valid
    }
}

impl std::fmt::Display for MeshComplex {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "MeshComplex over {} ({} constrained edges, {} corners)",
            self.tri,
            self.constrained.len(),
            self.corners.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OUTSIDE;
    use tetrem_test_utils::{facet_pair, regular_tet};

    fn no_constraints(_: &Triangulation, _: VertexHandle, _: VertexHandle) -> bool {
        false
    }

    fn select_tagged(t: &Triangulation, c: CellHandle) -> bool {
        t.subdomain(c) != OUTSIDE
    }

    #[test]
    fn single_tet_vertices_classify_as_surface() {
        let (points, cells) = regular_tet(1.0);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let cx = MeshComplex::init(tri, select_tagged, no_constraints);

        assert_eq!(cx.imaginary_index(), 2);
        assert!(cx.is_valid());
        for v in cx.triangulation().finite_vertices() {
            assert_eq!(cx.triangulation().in_dimension(v), 2);
        }
    }

    #[test]
    fn two_subdomains_make_the_shared_facet_complex() {
        let (points, cells) = facet_pair(0.7);
        let tri = Triangulation::from_cells(&points, &cells, &[1, 2]).unwrap();
        let cx = MeshComplex::init(tri, select_tagged, no_constraints);

        assert_eq!(cx.imaginary_index(), 3);
        assert!(cx.is_valid());

        let tri = cx.triangulation();
        let complex_facets: Vec<Facet> = tri
            .finite_facets()
            .into_iter()
            .filter(|&f| cx.is_complex_facet(f))
            .collect();
        // the shared interior facet plus the six hull facets
        assert_eq!(complex_facets.len(), 7);

        // the rim of the shared facet bounds subdomains 1, 2 and the
        // exterior, so its edges are features and their endpoints curve
        // vertices
        for (a, b) in tri.finite_edges() {
            let rim = tri.in_dimension(a) == 1 && tri.in_dimension(b) == 1;
            assert_eq!(cx.is_complex_edge(a, b), rim && cx.edge_dimension(a, b) == 1);
        }
        let curve_vertices = tri
            .finite_vertices()
            .filter(|&v| tri.in_dimension(v) == 1)
            .count();
        assert_eq!(curve_vertices, 3);
        let apexes = tri
            .finite_vertices()
            .filter(|&v| tri.in_dimension(v) == 2)
            .count();
        assert_eq!(apexes, 2);
    }

    #[test]
    fn input_corners_are_registered() {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let corner = tri.finite_vertices().next().unwrap();
        tri.set_in_dimension(corner, 0);

        let cx = MeshComplex::init(tri, select_tagged, no_constraints);
        assert!(cx.is_corner(corner));
        assert_eq!(cx.triangulation().in_dimension(corner), 0);
        assert!(cx.is_valid());
    }

    #[test]
    fn constrained_edges_become_features() {
        let (points, cells) = regular_tet(1.0);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let (a, b) = tri.finite_edges()[0];

        let cx = MeshComplex::init(tri, select_tagged, move |_, u, v| {
            (u, v) == (a, b) || (u, v) == (b, a)
        });
        assert!(cx.is_complex_edge(a, b));
        assert_eq!(cx.edge_dimension(a, b), 1);
        assert_eq!(cx.triangulation().in_dimension(a), 1);
        assert!(cx.is_valid());
    }
}
