use super::handles::{CellHandle, Facet, VertexHandle};
use crate::metrics::TET_EDGES;
use crate::predicates;
use crate::types::{OUTSIDE, Subdomain, Vertex3};
use anyhow::{Result, bail};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

/// For each facet index within a cell, the local vertex slots forming the
/// facet opposite that index.
///
/// The triples are ordered so that in a positively oriented cell the opposite
/// vertex sees the facet positively; mirrored facets therefore read as
/// reversed cyclic permutations of each other.
pub(crate) const FACET_VERTICES: [[usize; 3]; 4] = [[1, 3, 2], [0, 2, 3], [0, 3, 1], [0, 1, 2]];

/// Marks an unset arena reference.
pub(super) const NULL: u32 = u32::MAX;

#[derive(Debug)]
pub(crate) struct VertexData {
    pub(crate) point: Vertex3,
    /// Dimension of the lowest-dimensional complex element this vertex
    /// belongs to: 0 corner, 1 feature edge, 2 surface, 3 volume interior,
    /// -1 not yet classified.
    pub(crate) in_dimension: i8,
    /// One incident cell, for local traversal.
    pub(crate) cell: u32,
    pub(crate) generation: u32,
    pub(crate) alive: bool,
}

#[derive(Debug)]
pub(crate) struct CellData {
    pub(crate) vertices: [u32; 4],
    /// Neighbor `i` is the cell sharing the facet opposite vertex `i`.
    pub(crate) neighbors: [u32; 4],
    pub(crate) subdomain: Subdomain,
    pub(crate) generation: u32,
    pub(crate) alive: bool,
}

/// A decorated tetrahedralization.
///
/// Vertices and cells live in index arenas with free-lists; handles carry a
/// generation so that deleting an element invalidates stale references. One
/// distinguished vertex at infinity closes the convex hull: every facet has
/// exactly two incident cells at all times.
#[derive(Debug)]
pub struct Triangulation {
    pub(super) vertices: Vec<VertexData>,
    pub(super) cells: Vec<CellData>,
    pub(super) free_vertices: Vec<u32>,
    pub(super) free_cells: Vec<u32>,
    pub(super) infinite: u32,
    pub(super) num_live_vertices: usize,
    pub(super) num_live_cells: usize,
}

impl Default for Triangulation {
    fn default() -> Self {
        Self::new()
    }
}

impl Triangulation {
    /// An empty triangulation holding only the infinite vertex.
    pub fn new() -> Self {
        let infinite = VertexData {
            point: [0.0; 3],
            in_dimension: -1,
            cell: NULL,
            generation: 0,
            alive: true,
        };

        Self {
            vertices: vec![infinite],
            cells: Vec::new(),
            free_vertices: Vec::new(),
            free_cells: Vec::new(),
            infinite: 0,
            num_live_vertices: 1,
            num_live_cells: 0,
        }
    }

    /// Adopts an externally produced tetrahedralization.
    ///
    /// `cells` are vertex index quadruples into `points`; negatively oriented
    /// cells are reoriented in place. The convex hull is closed with infinite
    /// cells, and neighbor relations are derived by facet matching.
    ///
    /// ## Errors
    /// Fails on degenerate cells, facets shared by more than two cells,
    /// non-manifold hull edges, out-of-range or unreferenced vertices.
    pub fn from_cells(
        points: &[Vertex3],
        cells: &[[usize; 4]],
        subdomains: &[Subdomain],
    ) -> Result<Self> {
        if cells.is_empty() {
            bail!("at least one cell is required");
        }
        if cells.len() != subdomains.len() {
            bail!("one subdomain label per cell is required");
        }

        let mut tri = Self::new();
        let offset = 1u32; // slot 0 is the infinite vertex

        for &p in points {
            tri.vertices.push(VertexData {
                point: p,
                in_dimension: -1,
                cell: NULL,
                generation: 0,
                alive: true,
            });
        }
        tri.num_live_vertices += points.len();

        let mut referenced = vec![false; points.len()];
        for (ci, (&quad, &subdomain)) in cells.iter().zip(subdomains).enumerate() {
            let mut vs = [0u32; 4];
            for (slot, &v) in quad.iter().enumerate() {
                if v >= points.len() {
                    bail!("cell {ci} references vertex {v} out of range");
                }
                referenced[v] = true;
                vs[slot] = v as u32 + offset;
            }

            let pts = vs.map(|v| tri.vertices[v as usize].point);
            match predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) {
                0 => bail!("cell {ci} is degenerate"),
                -1 => vs.swap(2, 3),
                _ => {}
            }

            tri.cells.push(CellData {
                vertices: vs,
                neighbors: [NULL; 4],
                subdomain,
                generation: 0,
                alive: true,
            });
        }
        if let Some(v) = referenced.iter().position(|&r| !r) {
            bail!("vertex {v} is not referenced by any cell");
        }

        // neighbors by facet matching
        let mut facets: FxHashMap<[u32; 3], SmallVec<[(u32, usize); 2]>> = FxHashMap::default();
        for (ci, cell) in tri.cells.iter().enumerate() {
            for (i, triple) in FACET_VERTICES.iter().enumerate() {
                let mut key = triple.map(|k| cell.vertices[k]);
                key.sort_unstable();
                let entry = facets.entry(key).or_default();
                if entry.len() == 2 {
                    bail!("facet shared by more than two cells");
                }
                entry.push((ci as u32, i));
            }
        }

        let mut hull: Vec<(u32, usize)> = Vec::new();
        for entries in facets.values() {
            match entries[..] {
                [(c0, i0), (c1, i1)] => {
                    tri.cells[c0 as usize].neighbors[i0] = c1;
                    tri.cells[c1 as usize].neighbors[i1] = c0;
                }
                [(c0, i0)] => hull.push((c0, i0)),
                _ => unreachable!(),
            }
        }

        // close the hull: one infinite cell per boundary facet, ordered so
        // that substituting an outside point for the infinite vertex yields a
        // positively oriented cell
        let mut hull_edges: FxHashMap<[u32; 2], SmallVec<[(u32, usize); 2]>> = FxHashMap::default();
        for &(c, i) in &hull {
            let [p, q, r] = FACET_VERTICES[i].map(|k| tri.cells[c as usize].vertices[k]);
            let inf_idx = tri.cells.len() as u32;
            tri.cells.push(CellData {
                vertices: [p, r, q, tri.infinite],
                neighbors: [NULL, NULL, NULL, c],
                subdomain: OUTSIDE,
                generation: 0,
                alive: true,
            });
            tri.cells[c as usize].neighbors[i] = inf_idx;

            // facets 0..3 of the infinite cell contain the infinite vertex;
            // key them by their two finite vertices
            for (j, triple) in FACET_VERTICES.iter().enumerate().take(3) {
                let mut key: [u32; 2] = [0; 2];
                let mut n = 0;
                for &k in triple {
                    let v = tri.cells[inf_idx as usize].vertices[k];
                    if v != tri.infinite {
                        key[n] = v;
                        n += 1;
                    }
                }
                key.sort_unstable();
                let entry = hull_edges.entry(key).or_default();
                if entry.len() == 2 {
                    bail!("non-manifold hull edge");
                }
                entry.push((inf_idx, j));
            }
        }
        for entries in hull_edges.values() {
            match entries[..] {
                [(c0, i0), (c1, i1)] => {
                    tri.cells[c0 as usize].neighbors[i0] = c1;
                    tri.cells[c1 as usize].neighbors[i1] = c0;
                }
                _ => bail!("hull edge with a single incident hull facet"),
            }
        }

        tri.num_live_cells = tri.cells.len();
        for ci in 0..tri.cells.len() {
            for slot in 0..4 {
                let v = tri.cells[ci].vertices[slot];
                tri.vertices[v as usize].cell = ci as u32;
            }
        }

        Ok(tri)
    }

    /// The distinguished vertex closing the convex hull.
    pub fn infinite_vertex(&self) -> VertexHandle {
        self.vertex_handle(self.infinite)
    }

    /// Number of live finite vertices.
    pub const fn num_vertices(&self) -> usize {
        self.num_live_vertices - 1
    }

    /// Number of live cells, infinite ones included.
    pub const fn num_cells(&self) -> usize {
        self.num_live_cells
    }

    /// Number of live finite cells.
    pub fn num_finite_cells(&self) -> usize {
        self.finite_cells().count()
    }

    pub(crate) fn vertex_handle(&self, idx: u32) -> VertexHandle {
        VertexHandle {
            idx,
            generation: self.vertices[idx as usize].generation,
        }
    }

    pub(crate) fn cell_handle(&self, idx: u32) -> CellHandle {
        CellHandle {
            idx,
            generation: self.cells[idx as usize].generation,
        }
    }

    /// Whether the handle still refers to a live vertex.
    pub fn is_live_vertex(&self, v: VertexHandle) -> bool {
        self.vertices.get(v.index()).is_some_and(|d| d.alive && d.generation == v.generation)
    }

    /// Whether the handle still refers to a live cell.
    pub fn is_live_cell(&self, c: CellHandle) -> bool {
        self.cells.get(c.index()).is_some_and(|d| d.alive && d.generation == c.generation)
    }

    pub(crate) fn vd(&self, idx: u32) -> &VertexData {
        &self.vertices[idx as usize]
    }

    pub(crate) fn cd(&self, idx: u32) -> &CellData {
        &self.cells[idx as usize]
    }

    /// Position of a finite vertex.
    pub fn point(&self, v: VertexHandle) -> Vertex3 {
        self.vd(v.idx).point
    }

    pub(crate) fn set_point(&mut self, v: u32, p: Vertex3) {
        self.vertices[v as usize].point = p;
    }

    /// Complex dimension of the vertex; see [VertexData::in_dimension].
    pub fn in_dimension(&self, v: VertexHandle) -> i8 {
        self.vd(v.idx).in_dimension
    }

    /// Sets the complex dimension of a vertex.
    ///
    /// Callers mark input corners by setting dimension `0` before remeshing;
    /// every other value is managed by the complex itself.
    pub fn set_in_dimension(&mut self, v: VertexHandle, dim: i8) {
        self.vertices[v.index()].in_dimension = dim;
    }

    /// Subdomain label of a cell.
    pub fn subdomain(&self, c: CellHandle) -> Subdomain {
        self.cd(c.idx).subdomain
    }

    /// Relabels a cell.
    pub fn set_subdomain(&mut self, c: CellHandle, subdomain: Subdomain) {
        self.cells[c.index()].subdomain = subdomain;
    }

    /// The four vertices of a cell.
    pub fn cell_vertices(&self, c: CellHandle) -> [VertexHandle; 4] {
        self.cd(c.idx).vertices.map(|v| self.vertex_handle(v))
    }

    /// The cell sharing the facet opposite vertex `i`.
    pub fn neighbor(&self, c: CellHandle, i: usize) -> CellHandle {
        self.cell_handle(self.cd(c.idx).neighbors[i])
    }

    /// Whether the cell references the infinite vertex.
    pub fn is_infinite_cell(&self, c: CellHandle) -> bool {
        self.contains_infinite(c.idx)
    }

    pub(crate) fn contains_infinite(&self, c: u32) -> bool {
        self.cd(c).vertices.contains(&self.infinite)
    }

    /// The three vertices of a facet, in consistent orientation.
    pub fn facet_vertices(&self, f: Facet) -> [VertexHandle; 3] {
        self.facet_verts_raw(f.cell.idx, f.i as usize)
            .map(|v| self.vertex_handle(v))
    }

    pub(crate) fn facet_verts_raw(&self, c: u32, i: usize) -> [u32; 3] {
        FACET_VERTICES[i].map(|k| self.cd(c).vertices[k])
    }

    /// The same facet, viewed from its other incident cell.
    pub fn mirror_facet(&self, f: Facet) -> Facet {
        let n = self.cd(f.cell.idx).neighbors[f.i as usize];
        let j = self.mirror_index(f.cell.idx, n);
        Facet {
            cell: self.cell_handle(n),
            i: j as u8,
        }
    }

    /// Slot in `n` whose neighbor pointer refers back to `c`.
    pub(crate) fn mirror_index(&self, c: u32, n: u32) -> usize {
        self.cd(n)
            .neighbors
            .iter()
            .position(|&m| m == c)
            .expect("neighbor pointers must be involutive")
    }

    pub(crate) fn vertex_slot(&self, c: u32, v: u32) -> Option<usize> {
        self.cd(c).vertices.iter().position(|&u| u == v)
    }

    /// Iterates over live finite vertices.
    pub fn finite_vertices(&self) -> impl Iterator<Item = VertexHandle> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(i, d)| d.alive && *i as u32 != self.infinite)
            .map(|(i, d)| VertexHandle {
                idx: i as u32,
                generation: d.generation,
            })
    }

    /// Iterates over all live cells, infinite ones included.
    pub fn all_cells(&self) -> impl Iterator<Item = CellHandle> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, d)| d.alive)
            .map(|(i, d)| CellHandle {
                idx: i as u32,
                generation: d.generation,
            })
    }

    /// Iterates over live finite cells.
    pub fn finite_cells(&self) -> impl Iterator<Item = CellHandle> + '_ {
        self.all_cells().filter(|&c| !self.is_infinite_cell(c))
    }

    /// All finite facets, each reported once from its lower-index cell.
    ///
    /// A finite facet may still have an infinite incident cell (a hull
    /// facet); only the facet's own vertices must be finite.
    pub fn finite_facets(&self) -> Vec<Facet> {
        let mut out = Vec::new();
        for (ci, cell) in self.cells.iter().enumerate() {
            if !cell.alive {
                continue;
            }
            for i in 0..4 {
                if cell.neighbors[i] < ci as u32 {
                    continue;
                }
                let finite = FACET_VERTICES[i]
                    .iter()
                    .all(|&k| cell.vertices[k] != self.infinite);
                if finite {
                    out.push(Facet {
                        cell: self.cell_handle(ci as u32),
                        i: i as u8,
                    });
                }
            }
        }
        out
    }

    /// All finite edges as canonically ordered vertex pairs, each once.
    pub fn finite_edges(&self) -> Vec<(VertexHandle, VertexHandle)> {
        let mut seen: FxHashSet<(u32, u32)> = FxHashSet::default();
        let mut out = Vec::new();
        for cell in &self.cells {
            if !cell.alive {
                continue;
            }
            for &(i, j, _, _) in &TET_EDGES {
                let (u, v) = (cell.vertices[i], cell.vertices[j]);
                if u == self.infinite || v == self.infinite {
                    continue;
                }
                let key = if u < v { (u, v) } else { (v, u) };
                if seen.insert(key) {
                    out.push((self.vertex_handle(key.0), self.vertex_handle(key.1)));
                }
            }
        }
        out
    }

    /// All live cells incident to `v`, gathered by flooding neighbor links.
    pub(crate) fn cells_around_vertex(&self, v: u32) -> SmallVec<[u32; 32]> {
        let mut out: SmallVec<[u32; 32]> = SmallVec::new();
        out.push(self.vd(v).cell);

        let mut cursor = 0;
        while cursor < out.len() {
            let c = out[cursor];
            cursor += 1;

            let slot = self.vertex_slot(c, v).expect("incident cell must contain its vertex");
            for j in 0..4 {
                if j == slot {
                    continue;
                }
                let n = self.cd(c).neighbors[j];
                if !out.contains(&n) {
                    out.push(n);
                }
            }
        }

        out
    }

    /// Distinct vertices adjacent to `v`.
    pub(crate) fn vertices_around_vertex(&self, v: u32) -> SmallVec<[u32; 32]> {
        let mut out: SmallVec<[u32; 32]> = SmallVec::new();
        for c in self.cells_around_vertex(v) {
            for &u in &self.cd(c).vertices {
                if u != v && !out.contains(&u) {
                    out.push(u);
                }
            }
        }
        out
    }

    /// One cell containing the edge `(a, b)`, with the local slots of both
    /// endpoints.
    pub(crate) fn find_edge_cell(&self, a: u32, b: u32) -> Option<(u32, usize, usize)> {
        for c in self.cells_around_vertex(a) {
            let sa = self.vertex_slot(c, a)?;
            if let Some(sb) = self.vertex_slot(c, b) {
                return Some((c, sa, sb));
            }
        }
        None
    }

    /// The closed, ordered ring of cells around the edge `(a, b)`.
    pub(crate) fn cells_around_edge(&self, a: u32, b: u32) -> Option<SmallVec<[u32; 16]>> {
        let (start, sa, sb) = self.find_edge_cell(a, b)?;

        let mut ring: SmallVec<[u32; 16]> = SmallVec::new();
        ring.push(start);

        let first_exit = (0..4).find(|&j| j != sa && j != sb)?;
        let mut prev = start;
        let mut cur = self.cd(start).neighbors[first_exit];

        while cur != start {
            if ring.len() > self.num_live_cells {
                return None;
            }
            ring.push(cur);

            let ta = self.vertex_slot(cur, a)?;
            let tb = self.vertex_slot(cur, b)?;
            let mut next = NULL;
            for j in 0..4 {
                if j != ta && j != tb && self.cd(cur).neighbors[j] != prev {
                    next = self.cd(cur).neighbors[j];
                    break;
                }
            }
            if next == NULL {
                return None;
            }
            prev = cur;
            cur = next;
        }

        Some(ring)
    }

    /// Audits the combinatorial 3-manifold invariants and finite cell
    /// orientations, logging each violation.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;

        for (ci, cell) in self.cells.iter().enumerate() {
            if !cell.alive {
                continue;
            }
            let c = ci as u32;

            for (s, &v) in cell.vertices.iter().enumerate() {
                if !self.vertices[v as usize].alive {
                    log::error!("cell {c}: dead vertex {v}");
                    valid = false;
                }
                if cell.vertices[..s].contains(&v) {
                    log::error!("cell {c}: duplicate vertex {v}");
                    valid = false;
                }
            }

            for i in 0..4 {
                let n = cell.neighbors[i];
                if n == NULL || !self.cells[n as usize].alive {
                    log::error!("cell {c}: facet {i} has no live neighbor");
                    valid = false;
                    continue;
                }
                if !self.cd(n).neighbors.contains(&c) {
                    log::error!("cell {c}: neighbor {n} does not point back");
                    valid = false;
                    continue;
                }
                let j = self.mirror_index(c, n);
                let [p, q, r] = self.facet_verts_raw(c, i);
                let [mp, mq, mr] = self.facet_verts_raw(n, j);
                let reversed = (mp == p && mq == r && mr == q)
                    || (mp == r && mq == q && mr == p)
                    || (mp == q && mq == p && mr == r);
                if !reversed {
                    log::error!("cell {c}: facet {i} disagrees with mirror in cell {n}");
                    valid = false;
                }
            }

            if !self.contains_infinite(c) {
                let pts = cell.vertices.map(|v| self.vd(v).point);
                if predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) <= 0 {
                    log::error!("cell {c}: non-positive orientation");
                    valid = false;
                }
            }
        }

        if self.num_live_cells > 0 {
            for (vi, vertex) in self.vertices.iter().enumerate() {
                if !vertex.alive {
                    continue;
                }
                let ok = vertex.cell != NULL
                    && self.cells[vertex.cell as usize].alive
                    && self.cd(vertex.cell).vertices.contains(&(vi as u32));
                if !ok {
                    log::error!("vertex {vi}: stale incident cell reference");
                    valid = false;
                }
            }
        }

        valid
    }
}

impl std::fmt::Display for Triangulation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Triangulation with {} vertices and {} cells ({} finite)",
            self.num_vertices(),
            self.num_cells(),
            self.num_finite_cells()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetrem_test_utils::{facet_pair, regular_tet};

    #[test]
    fn single_tet_closes_hull() {
        let (points, cells) = regular_tet(1.0);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();

        assert_eq!(tri.num_vertices(), 4);
        assert_eq!(tri.num_cells(), 5); // 1 finite + 4 infinite
        assert_eq!(tri.num_finite_cells(), 1);
        assert!(tri.is_valid());
        assert_eq!(tri.finite_edges().len(), 6);
        assert_eq!(tri.finite_facets().len(), 4);
    }

    #[test]
    fn mirror_facet_is_involutive() {
        let (points, cells) = facet_pair(0.7);
        let tri = Triangulation::from_cells(&points, &cells, &[1, 2]).unwrap();
        assert!(tri.is_valid());

        for f in tri.finite_facets() {
            let m = tri.mirror_facet(f);
            let back = tri.mirror_facet(m);
            assert_eq!(back, f);

            let mut a: Vec<_> = tri.facet_vertices(f).to_vec();
            let mut b: Vec<_> = tri.facet_vertices(m).to_vec();
            a.sort();
            b.sort();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn negatively_oriented_input_is_repaired() {
        let (points, mut cells) = regular_tet(1.0);
        cells[0].swap(0, 1);
        let tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        assert!(tri.is_valid());
    }

    #[test]
    fn rejects_degenerate_cell() {
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.5, 0.0],
        ];
        assert!(Triangulation::from_cells(&points, &[[0, 1, 2, 3]], &[1]).is_err());
    }

    #[test]
    fn rings_around_shared_facet_edge() {
        let (points, cells) = facet_pair(0.7);
        let tri = Triangulation::from_cells(&points, &cells, &[1, 1]).unwrap();

        // an edge of the shared facet borders both finite cells
        let a = tri.vertex_handle(1);
        let b = tri.vertex_handle(2);
        let ring = tri.cells_around_edge(a.idx, b.idx).unwrap();
        let finite = ring
            .iter()
            .filter(|&&c| !tri.contains_infinite(c))
            .count();
        assert_eq!(finite, 2);
    }
}
