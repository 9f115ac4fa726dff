//! Local mutation primitives.
//!
//! Every operation here either leaves the manifold invariants intact or
//! returns a [Rejection] without touching the mesh. Geometric inversion is
//! checked with the exact kernel before any cell is created or deleted;
//! combinatorial rewiring goes through facet matching on the mutated patch.

use super::handles::{CellHandle, Facet, VertexHandle};
use super::triangulation::{CellData, FACET_VERTICES, NULL, Triangulation, VertexData};
use crate::error::Rejection;
use crate::predicates;
use crate::types::{Subdomain, Vertex3};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

impl Triangulation {
    fn alloc_vertex(&mut self, point: Vertex3, in_dimension: i8) -> u32 {
        self.num_live_vertices += 1;
        if let Some(idx) = self.free_vertices.pop() {
            let d = &mut self.vertices[idx as usize];
            d.point = point;
            d.in_dimension = in_dimension;
            d.cell = NULL;
            d.alive = true;
            idx
        } else {
            self.vertices.push(VertexData {
                point,
                in_dimension,
                cell: NULL,
                generation: 0,
                alive: true,
            });
            (self.vertices.len() - 1) as u32
        }
    }

    fn alloc_cell(&mut self, vertices: [u32; 4], subdomain: Subdomain) -> u32 {
        self.num_live_cells += 1;
        if let Some(idx) = self.free_cells.pop() {
            let d = &mut self.cells[idx as usize];
            d.vertices = vertices;
            d.neighbors = [NULL; 4];
            d.subdomain = subdomain;
            d.alive = true;
            idx
        } else {
            self.cells.push(CellData {
                vertices,
                neighbors: [NULL; 4],
                subdomain,
                generation: 0,
                alive: true,
            });
            (self.cells.len() - 1) as u32
        }
    }

    fn free_vertex(&mut self, idx: u32) {
        let d = &mut self.vertices[idx as usize];
        d.alive = false;
        d.generation += 1;
        self.free_vertices.push(idx);
        self.num_live_vertices -= 1;
    }

    fn free_cell(&mut self, idx: u32) {
        let d = &mut self.cells[idx as usize];
        d.alive = false;
        d.generation += 1;
        self.free_cells.push(idx);
        self.num_live_cells -= 1;
    }

    /// Recomputes mutual neighbor pointers for a freshly built patch.
    ///
    /// `patch` holds the new (or vertex-substituted) cells, `boundary` the
    /// surviving cells around the replaced region. Facets are matched by
    /// vertex triple; untouched boundary-to-boundary adjacencies are left (or
    /// harmlessly re-set) as they were. Also refreshes the incident-cell
    /// back-references of every patch vertex.
    fn wire_patch(&mut self, patch: &[u32], boundary: &[u32]) -> Result<(), Rejection> {
        // a boundary cell can border the patch across several facets and may
        // have been collected once per facet
        let mut cells_involved: SmallVec<[u32; 24]> = SmallVec::new();
        for &c in patch.iter().chain(boundary) {
            if !cells_involved.contains(&c) {
                cells_involved.push(c);
            }
        }

        let mut facets: FxHashMap<[u32; 3], SmallVec<[(u32, usize); 2]>> = FxHashMap::default();
        for &c in &cells_involved {
            for i in 0..4 {
                let mut key = self.facet_verts_raw(c, i);
                key.sort_unstable();
                let entry = facets.entry(key).or_default();
                if entry.len() == 2 {
                    return Err(Rejection::Topology);
                }
                entry.push((c, i));
            }
        }

        for entries in facets.values() {
            if let [(c0, i0), (c1, i1)] = entries[..] {
                self.cells[c0 as usize].neighbors[i0] = c1;
                self.cells[c1 as usize].neighbors[i1] = c0;
            }
        }

        for &c in patch {
            if self.cd(c).neighbors.contains(&NULL) {
                return Err(Rejection::Topology);
            }
            let vs = self.cd(c).vertices;
            for v in vs {
                self.vertices[v as usize].cell = c;
            }
        }

        Ok(())
    }

    /// Inserts a vertex inside a cell, subdividing it into four (1-to-4).
    ///
    /// The point must lie strictly inside the cell; children inherit the
    /// parent's subdomain. The new vertex is returned unclassified
    /// (`in_dimension = -1`).
    pub fn insert_in_cell(&mut self, c: CellHandle, p: Vertex3) -> Result<VertexHandle, Rejection> {
        if !self.is_live_cell(c) {
            return Err(Rejection::Missing);
        }
        let old = c.idx;
        let vs = self.cd(old).vertices;
        let ns = self.cd(old).neighbors;
        let subdomain = self.cd(old).subdomain;

        for i in 0..4 {
            if vs.iter().enumerate().any(|(k, &v)| k != i && v == self.infinite) {
                continue;
            }
            let pts: [Vertex3; 4] =
                core::array::from_fn(|k| if k == i { p } else { self.vd(vs[k]).point });
            match predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) {
                0 => return Err(Rejection::Degenerate),
                -1 => return Err(Rejection::Inverted),
                _ => {}
            }
        }

        let m = self.alloc_vertex(p, -1);
        self.free_cell(old);

        let mut children = [NULL; 4];
        for (i, child) in children.iter_mut().enumerate() {
            let mut cvs = vs;
            cvs[i] = m;
            *child = self.alloc_cell(cvs, subdomain);
        }

        for i in 0..4 {
            let outer = ns[i];
            let j = self.mirror_index(old, outer);
            self.cells[outer as usize].neighbors[j] = children[i];
            self.cells[children[i] as usize].neighbors[i] = outer;
            for j in 0..4 {
                if j != i {
                    self.cells[children[i] as usize].neighbors[j] = children[j];
                }
            }
        }

        for child in children {
            let cvs = self.cd(child).vertices;
            for v in cvs {
                self.vertices[v as usize].cell = child;
            }
        }

        Ok(self.vertex_handle(m))
    }

    /// Inserts a vertex on a facet, subdividing both incident cells (2-to-6).
    pub fn insert_in_facet(&mut self, f: Facet, p: Vertex3) -> Result<VertexHandle, Rejection> {
        if !self.is_live_cell(f.cell) {
            return Err(Rejection::Missing);
        }
        let c = f.cell.idx;
        let i = f.i as usize;
        let d = self.cd(c).neighbors[i];
        let j = self.mirror_index(c, d);

        let sides = [(c, i), (d, j)];
        for &(cell, opp) in &sides {
            let vs = self.cd(cell).vertices;
            for &slot in &FACET_VERTICES[opp] {
                if vs.iter().enumerate().any(|(k, &v)| k != slot && v == self.infinite) {
                    continue;
                }
                let pts: [Vertex3; 4] =
                    core::array::from_fn(|k| if k == slot { p } else { self.vd(vs[k]).point });
                match predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) {
                    0 => return Err(Rejection::Degenerate),
                    -1 => return Err(Rejection::Inverted),
                    _ => {}
                }
            }
        }

        let mut captured: SmallVec<[([u32; 4], [u32; 4], Subdomain, usize); 2]> = SmallVec::new();
        for &(cell, opp) in &sides {
            captured.push((
                self.cd(cell).vertices,
                self.cd(cell).neighbors,
                self.cd(cell).subdomain,
                opp,
            ));
        }

        let mut boundary: SmallVec<[u32; 6]> = SmallVec::new();
        for &(_, ns, _, opp) in &captured {
            for (k, &n) in ns.iter().enumerate() {
                if k != opp {
                    boundary.push(n);
                }
            }
        }

        let m = self.alloc_vertex(p, -1);
        self.free_cell(c);
        self.free_cell(d);

        let mut patch: SmallVec<[u32; 6]> = SmallVec::new();
        for &(vs, _, subdomain, opp) in &captured {
            for &slot in &FACET_VERTICES[opp] {
                let mut cvs = vs;
                cvs[slot] = m;
                patch.push(self.alloc_cell(cvs, subdomain));
            }
        }

        self.wire_patch(&patch, &boundary)?;
        Ok(self.vertex_handle(m))
    }

    /// Inserts a vertex on an edge, splitting every cell of its ring in two
    /// (n-to-2n).
    pub fn insert_in_edge(
        &mut self,
        a: VertexHandle,
        b: VertexHandle,
        p: Vertex3,
    ) -> Result<VertexHandle, Rejection> {
        if !self.is_live_vertex(a) || !self.is_live_vertex(b) {
            return Err(Rejection::Missing);
        }
        let ring = self
            .cells_around_edge(a.idx, b.idx)
            .ok_or(Rejection::Missing)?;

        let mut captured: SmallVec<[([u32; 4], [u32; 4], Subdomain, usize, usize); 16]> =
            SmallVec::new();
        for &cell in &ring {
            let sa = self.vertex_slot(cell, a.idx).ok_or(Rejection::Missing)?;
            let sb = self.vertex_slot(cell, b.idx).ok_or(Rejection::Missing)?;
            captured.push((
                self.cd(cell).vertices,
                self.cd(cell).neighbors,
                self.cd(cell).subdomain,
                sa,
                sb,
            ));
        }

        // children replace one endpoint with the new point; for finite cells
        // both halves must stay positively oriented
        for &(vs, _, _, sa, sb) in &captured {
            for &slot in &[sa, sb] {
                if vs.iter().enumerate().any(|(k, &v)| k != slot && v == self.infinite) {
                    continue;
                }
                let pts: [Vertex3; 4] =
                    core::array::from_fn(|k| if k == slot { p } else { self.vd(vs[k]).point });
                match predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) {
                    0 => return Err(Rejection::Degenerate),
                    -1 => return Err(Rejection::Inverted),
                    _ => {}
                }
            }
        }

        let mut boundary: SmallVec<[u32; 16]> = SmallVec::new();
        for &(_, ns, _, sa, sb) in &captured {
            boundary.push(ns[sa]);
            boundary.push(ns[sb]);
        }

        let m = self.alloc_vertex(p, -1);
        for &cell in &ring {
            self.free_cell(cell);
        }

        let mut patch: SmallVec<[u32; 32]> = SmallVec::new();
        for &(vs, _, subdomain, sa, sb) in &captured {
            let mut half_a = vs;
            half_a[sb] = m;
            patch.push(self.alloc_cell(half_a, subdomain));

            let mut half_b = vs;
            half_b[sa] = m;
            patch.push(self.alloc_cell(half_b, subdomain));
        }

        self.wire_patch(&patch, &boundary)?;
        Ok(self.vertex_handle(m))
    }

    /// Removes `v` by retriangulating its star as a fan around `target`.
    ///
    /// This is the collapse of the edge `(v, target)`: cells containing both
    /// endpoints are deleted, every other cell of the star has `v` replaced
    /// by `target`. Rejected when the link condition fails (the star is not
    /// collapsible without changing topology) or when a retained cell would
    /// invert.
    pub fn remove_vertex_toward(
        &mut self,
        v: VertexHandle,
        target: VertexHandle,
    ) -> Result<(), Rejection> {
        if !self.is_live_vertex(v) || !self.is_live_vertex(target) {
            return Err(Rejection::Missing);
        }
        let src = v.idx;
        let tgt = target.idx;
        let ring = self.cells_around_edge(src, tgt).ok_or(Rejection::Missing)?;
        let star = self.cells_around_vertex(src);

        // link condition, vertex level: common neighbors of the endpoints
        // must be exactly the ring vertices
        let mut ring_verts: SmallVec<[u32; 16]> = SmallVec::new();
        for &cell in &ring {
            for &u in &self.cd(cell).vertices {
                if u != src && u != tgt && !ring_verts.contains(&u) {
                    ring_verts.push(u);
                }
            }
        }
        let src_adjacent = self.vertices_around_vertex(src);
        let tgt_adjacent = self.vertices_around_vertex(tgt);
        for &x in &src_adjacent {
            if x != tgt && tgt_adjacent.contains(&x) && !ring_verts.contains(&x) {
                return Err(Rejection::LinkCondition);
            }
        }

        // facet level: no triangle may be the base of apex cells on both
        // endpoints, or the collapse would create a duplicate cell
        for &cell in &star {
            if self.vertex_slot(cell, tgt).is_some() {
                continue;
            }
            let s = self
                .vertex_slot(cell, src)
                .ok_or(Rejection::Missing)?;
            let across = self.cd(cell).neighbors[s];
            let base = self.facet_verts_raw(cell, s);
            let apex = self
                .cd(across)
                .vertices
                .iter()
                .find(|u| !base.contains(u))
                .copied();
            if apex == Some(tgt) {
                return Err(Rejection::LinkCondition);
            }
        }

        // edge level: every link edge shared by both endpoints must belong to
        // the link of the collapsing edge itself
        let link_edges = |cells: &[u32], apex: u32| -> FxHashSet<(u32, u32)> {
            let mut out = FxHashSet::default();
            for &cell in cells {
                let vs = self.cd(cell).vertices;
                let others: SmallVec<[u32; 3]> =
                    vs.iter().copied().filter(|&u| u != apex).collect();
                for i in 0..3 {
                    for j in (i + 1)..3 {
                        let (x, y) = (others[i].min(others[j]), others[i].max(others[j]));
                        out.insert((x, y));
                    }
                }
            }
            out
        };
        let tgt_star = self.cells_around_vertex(tgt);
        let src_link = link_edges(&star, src);
        let tgt_link = link_edges(&tgt_star, tgt);
        let mut edge_link = FxHashSet::default();
        for &cell in &ring {
            let vs = self.cd(cell).vertices;
            let others: SmallVec<[u32; 2]> = vs
                .iter()
                .copied()
                .filter(|&u| u != src && u != tgt)
                .collect();
            edge_link.insert((others[0].min(others[1]), others[0].max(others[1])));
        }
        for pair in src_link.intersection(&tgt_link) {
            if pair.0 == tgt || pair.1 == tgt || pair.0 == src || pair.1 == src {
                continue;
            }
            if !edge_link.contains(pair) {
                return Err(Rejection::LinkCondition);
            }
        }

        // geometric check: retained star cells with v moved onto the target
        let fan: SmallVec<[u32; 32]> = star
            .iter()
            .copied()
            .filter(|&c| !ring.contains(&c))
            .collect();
        if fan.is_empty() {
            return Err(Rejection::Topology);
        }
        let tgt_point = self.vd(tgt).point;
        for &cell in &fan {
            let vs = self.cd(cell).vertices;
            if vs.contains(&self.infinite) {
                continue;
            }
            let pts: [Vertex3; 4] =
                core::array::from_fn(|k| if vs[k] == src { tgt_point } else { self.vd(vs[k]).point });
            match predicates::orient_3d(&pts[0], &pts[1], &pts[2], &pts[3]) {
                0 => return Err(Rejection::Degenerate),
                -1 => return Err(Rejection::Inverted),
                _ => {}
            }
        }

        // commit
        let mut boundary: SmallVec<[u32; 16]> = SmallVec::new();
        let mut ring_fixups: SmallVec<[(u32, u32, u32); 16]> = SmallVec::new();
        for &cell in &ring {
            let s = self.vertex_slot(cell, src).ok_or(Rejection::Missing)?;
            let out = self.cd(cell).neighbors[s];
            boundary.push(out);
            let vs = self.cd(cell).vertices;
            let others: SmallVec<[u32; 2]> = vs
                .iter()
                .copied()
                .filter(|&u| u != src && u != tgt)
                .collect();
            ring_fixups.push((others[0], others[1], out));
        }

        for &cell in &ring {
            self.free_cell(cell);
        }
        for &cell in &fan {
            let s = self.vertex_slot(cell, src).ok_or(Rejection::Missing)?;
            self.cells[cell as usize].vertices[s] = tgt;
        }

        self.wire_patch(&fan, &boundary)?;

        for &(x, y, out) in &ring_fixups {
            self.vertices[x as usize].cell = out;
            self.vertices[y as usize].cell = out;
            self.vertices[tgt as usize].cell = out;
        }
        for &cell in &fan {
            let vs = self.cd(cell).vertices;
            for u in vs {
                self.vertices[u as usize].cell = cell;
            }
        }

        self.free_vertex(src);
        Ok(())
    }

    /// Replaces the two cells incident to a facet with three cells around the
    /// edge joining their apexes (2-to-3).
    pub fn flip_2_3(&mut self, f: Facet) -> Result<[CellHandle; 3], Rejection> {
        if !self.is_live_cell(f.cell) {
            return Err(Rejection::Missing);
        }
        let c = f.cell.idx;
        let i = f.i as usize;
        let d = self.cd(c).neighbors[i];
        let j = self.mirror_index(c, d);

        let p = self.cd(c).vertices[i];
        let q = self.cd(d).vertices[j];
        if p == self.infinite || q == self.infinite {
            return Err(Rejection::Topology);
        }
        if self.cd(c).subdomain != self.cd(d).subdomain {
            return Err(Rejection::FeatureLoss);
        }
        // the flip edge must not exist yet
        if self.find_edge_cell(p, q).is_some() {
            return Err(Rejection::Topology);
        }

        let fv = self.facet_verts_raw(c, i);
        let av = fv.map(|u| self.vd(u).point);
        let pp = self.vd(p).point;
        let qp = self.vd(q).point;
        for k in 0..3 {
            match predicates::orient_3d(&av[k], &av[(k + 1) % 3], &qp, &pp) {
                0 => return Err(Rejection::Degenerate),
                -1 => return Err(Rejection::Inverted),
                _ => {}
            }
        }

        let subdomain = self.cd(c).subdomain;
        let mut boundary: SmallVec<[u32; 6]> = SmallVec::new();
        for (cell, opp) in [(c, i), (d, j)] {
            for (k, &n) in self.cd(cell).neighbors.iter().enumerate() {
                if k != opp {
                    boundary.push(n);
                }
            }
        }

        self.free_cell(c);
        self.free_cell(d);

        let mut created = [NULL; 3];
        for (k, slot) in created.iter_mut().enumerate() {
            *slot = self.alloc_cell([fv[k], fv[(k + 1) % 3], q, p], subdomain);
        }
        self.wire_patch(&created, &boundary)?;

        Ok(created.map(|idx| self.cell_handle(idx)))
    }

    /// Replaces the three cells around an edge with the two cells on the
    /// triangle spanned by the remaining ring vertices (3-to-2).
    pub fn flip_3_2(
        &mut self,
        a: VertexHandle,
        b: VertexHandle,
    ) -> Result<[CellHandle; 2], Rejection> {
        if !self.is_live_vertex(a) || !self.is_live_vertex(b) {
            return Err(Rejection::Missing);
        }
        let ring = self
            .cells_around_edge(a.idx, b.idx)
            .ok_or(Rejection::Missing)?;
        if ring.len() != 3 {
            return Err(Rejection::Topology);
        }
        if ring.iter().any(|&cell| self.contains_infinite(cell)) {
            return Err(Rejection::Topology);
        }
        let subdomain = self.cd(ring[0]).subdomain;
        if ring.iter().any(|&cell| self.cd(cell).subdomain != subdomain) {
            return Err(Rejection::FeatureLoss);
        }

        let mut xs: SmallVec<[u32; 3]> = SmallVec::new();
        for &cell in &ring {
            for &u in &self.cd(cell).vertices {
                if u != a.idx && u != b.idx && !xs.contains(&u) {
                    xs.push(u);
                }
            }
        }
        if xs.len() != 3 {
            return Err(Rejection::Topology);
        }

        let px = [self.vd(xs[0]).point, self.vd(xs[1]).point, self.vd(xs[2]).point];
        let pa = self.vd(a.idx).point;
        let pb = self.vd(b.idx).point;

        let oa = predicates::orient_3d(&px[0], &px[1], &px[2], &pa);
        if oa == 0 {
            return Err(Rejection::Degenerate);
        }
        let (w0, w1, w2) = if oa > 0 {
            (xs[0], xs[1], xs[2])
        } else {
            (xs[0], xs[2], xs[1])
        };
        let (q0, q1, q2) = (
            self.vd(w0).point,
            self.vd(w1).point,
            self.vd(w2).point,
        );
        match predicates::orient_3d(&q0, &q2, &q1, &pb) {
            0 => return Err(Rejection::Degenerate),
            -1 => return Err(Rejection::Inverted),
            _ => {}
        }

        let mut boundary: SmallVec<[u32; 6]> = SmallVec::new();
        for &cell in &ring {
            let sa = self.vertex_slot(cell, a.idx).ok_or(Rejection::Missing)?;
            let sb = self.vertex_slot(cell, b.idx).ok_or(Rejection::Missing)?;
            boundary.push(self.cd(cell).neighbors[sa]);
            boundary.push(self.cd(cell).neighbors[sb]);
        }

        for &cell in &ring {
            self.free_cell(cell);
        }

        let side_a = self.alloc_cell([w0, w1, w2, a.idx], subdomain);
        let side_b = self.alloc_cell([w0, w2, w1, b.idx], subdomain);
        self.wire_patch(&[side_a, side_b], &boundary)?;

        Ok([self.cell_handle(side_a), self.cell_handle(side_b)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::midpoint;
    use tetrem_test_utils::{facet_pair, regular_tet};

    fn centroid(tri: &Triangulation, c: CellHandle) -> Vertex3 {
        let pts = tri.cell_vertices(c).map(|v| tri.point(v));
        let mut out = [0.0; 3];
        for p in pts {
            for (o, x) in out.iter_mut().zip(p) {
                *o += x / 4.0;
            }
        }
        out
    }

    #[test]
    fn insert_in_cell_subdivides_into_four() {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[7]).unwrap();
        let c = tri.finite_cells().next().unwrap();

        let m = tri.insert_in_cell(c, centroid(&tri, c)).unwrap();

        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 4);
        assert_eq!(tri.num_vertices(), 5);
        assert!(tri.finite_cells().all(|h| tri.subdomain(h) == 7));
        assert_eq!(tri.cells_around_vertex(m.idx).len(), 4);
        assert!(!tri.is_live_cell(c));
    }

    #[test]
    fn insert_then_collapse_restores_single_tet() {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let c = tri.finite_cells().next().unwrap();
        let corner = tri.cell_vertices(c)[0];

        let m = tri.insert_in_cell(c, centroid(&tri, c)).unwrap();
        tri.remove_vertex_toward(m, corner).unwrap();

        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 1);
        assert_eq!(tri.num_vertices(), 4);
        assert!(!tri.is_live_vertex(m));
    }

    #[test]
    fn insert_in_edge_splits_the_ring() {
        let (points, cells) = regular_tet(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1]).unwrap();
        let (a, b) = tri.finite_edges()[0];
        let p = midpoint(&tri.point(a), &tri.point(b));

        let m = tri.insert_in_edge(a, b, p).unwrap();

        assert!(tri.is_valid());
        // the boundary edge of a single tet is surrounded by 1 finite and 2
        // infinite cells; each splits in two
        assert_eq!(tri.num_finite_cells(), 2);
        assert_eq!(tri.num_vertices(), 5);
        assert_eq!(tri.in_dimension(m), -1);
        assert!(tri.find_edge_cell(a.idx, m.idx).is_some());
        assert!(tri.find_edge_cell(m.idx, b.idx).is_some());
        assert!(tri.find_edge_cell(a.idx, b.idx).is_none());
    }

    #[test]
    fn insert_in_facet_subdivides_both_sides() {
        let (points, cells) = facet_pair(0.7);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1, 1]).unwrap();

        // locate the interior facet
        let shared = tri
            .finite_facets()
            .into_iter()
            .find(|&f| {
                !tri.is_infinite_cell(f.cell) && !tri.is_infinite_cell(tri.mirror_facet(f).cell)
            })
            .unwrap();
        let [u, v, w] = tri.facet_vertices(shared).map(|h| tri.point(h));
        let inside = [
            (u[0] + v[0] + w[0]) / 3.0,
            (u[1] + v[1] + w[1]) / 3.0,
            (u[2] + v[2] + w[2]) / 3.0,
        ];

        let m = tri.insert_in_facet(shared, inside).unwrap();

        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 6);
        assert_eq!(tri.cells_around_vertex(m.idx).len(), 6);
    }

    #[test]
    fn flip_2_3_and_back() {
        let (points, cells) = facet_pair(1.0);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1, 1]).unwrap();

        let shared = tri
            .finite_facets()
            .into_iter()
            .find(|&f| {
                !tri.is_infinite_cell(f.cell) && !tri.is_infinite_cell(tri.mirror_facet(f).cell)
            })
            .unwrap();
        let p = tri.cell_vertices(shared.cell)[shared.i as usize];
        let mirror = tri.mirror_facet(shared);
        let q = tri.cell_vertices(mirror.cell)[mirror.i as usize];

        let created = tri.flip_2_3(shared).unwrap();
        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 3);
        assert_eq!(tri.cells_around_edge(p.idx, q.idx).unwrap().len(), 3);
        assert!(created.iter().all(|&h| tri.is_live_cell(h)));

        tri.flip_3_2(p, q).unwrap();
        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 2);
        assert!(tri.find_edge_cell(p.idx, q.idx).is_none());
    }

    #[test]
    fn flip_2_3_rejects_non_piercing_apexes() {
        // apexes far off-center: the segment between them misses the shared
        // facet, so one of the three candidate cells would invert
        let points = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [2.0, 2.0, 1.0],
            [2.0, 2.0, -1.0],
        ];
        let cells = vec![[0, 1, 2, 3], [0, 2, 1, 4]];
        let mut tri = Triangulation::from_cells(&points, &cells, &[1, 1]).unwrap();

        let shared = tri
            .finite_facets()
            .into_iter()
            .find(|&f| {
                !tri.is_infinite_cell(f.cell) && !tri.is_infinite_cell(tri.mirror_facet(f).cell)
            })
            .unwrap();

        assert_eq!(tri.flip_2_3(shared), Err(Rejection::Inverted));
        assert!(tri.is_valid());
        assert_eq!(tri.num_finite_cells(), 2);
    }

    #[test]
    fn collapse_rejects_when_link_condition_fails() {
        // two tets sharing a facet: collapsing the shared-facet edge (1, 2)
        // would merge the two cells into a degenerate configuration; the
        // apexes 3 and 4 are common neighbors outside the edge ring
        let (points, cells) = facet_pair(0.7);
        let mut tri = Triangulation::from_cells(&points, &cells, &[1, 1]).unwrap();

        let a = tri.vertex_handle(2);
        let b = tri.vertex_handle(3);
        let result = tri.remove_vertex_toward(a, b);
        assert_eq!(result, Err(Rejection::LinkCondition));
        assert!(tri.is_valid());
    }
}
