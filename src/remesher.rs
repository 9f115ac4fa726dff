//! The fixed-point driver.
//!
//! Sequences the local operators (split, collapse, flip, smooth) over the
//! complex until every measurable edge reaches the target length window, the
//! iteration budget runs out, or the caller requests cancellation.

use crate::complex::MeshComplex;
use crate::error::RemeshError;
use crate::imaginary;
use crate::mesh::{CellHandle, Triangulation, VertexHandle};
use crate::types::{OUTSIDE, Vertex3};
use crate::{collapse, flip, smooth, split};
use core::fmt;

/// The sizing field is evaluated at a fixed probe point.
const SIZING_PROBE: Vertex3 = [0.0; 3];

/// How a remeshing run ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RemeshStatus {
    /// Every measurable edge lies in the target window.
    Resolved,
    /// The iteration budget ran out first; the mesh is still valid.
    ResolutionNotReached,
    /// The caller requested cancellation; the mesh is still valid.
    Cancelled,
}

/// Outcome and per-operator statistics of a run.
#[derive(Copy, Clone, Debug)]
pub struct RemeshOutcome {
    pub status: RemeshStatus,
    pub iterations: usize,
    pub splits: usize,
    pub collapses: usize,
    pub flips: usize,
    pub smooth_moves: usize,
}

impl fmt::Display for RemeshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} after {} iterations ({} splits, {} collapses, {} flips, {} smooth moves)",
            self.status, self.iterations, self.splits, self.collapses, self.flips, self.smooth_moves
        )
    }
}

/// Adaptive tetrahedral remesher.
///
/// ```
/// use tetrem::{Remesher, Triangulation};
///
/// let points = vec![
///     [0.5, 0.5, 0.5],
///     [0.5, -0.5, -0.5],
///     [-0.5, -0.5, 0.5],
///     [-0.5, 0.5, -0.5],
/// ];
/// let mut tri = Triangulation::from_cells(&points, &[[0, 1, 2, 3]], &[1]).unwrap();
///
/// let outcome = Remesher::uniform(1.5)
///     .with_protect_boundaries(true)
///     .with_max_iterations(3)
///     .remesh(&mut tri)
///     .unwrap();
/// println!("{outcome}");
/// ```
pub struct Remesher {
    sizing: Box<dyn Fn(&Vertex3) -> f64>,
    protect_boundaries: bool,
    max_iterations: usize,
    cell_selector: Box<dyn Fn(&Triangulation, CellHandle) -> bool>,
    edge_is_constrained: Box<dyn Fn(&Triangulation, VertexHandle, VertexHandle) -> bool>,
    cancelled: Box<dyn Fn() -> bool>,
}

impl Remesher {
    /// A remesher driving every edge toward a constant target length.
    pub fn uniform(target_edge_length: f64) -> Self {
        Self::with_sizing(move |_| target_edge_length)
    }

    /// A remesher over a sizing field callable.
    pub fn with_sizing(sizing: impl Fn(&Vertex3) -> f64 + 'static) -> Self {
        Self {
            sizing: Box::new(sizing),
            protect_boundaries: false,
            max_iterations: 10,
            cell_selector: Box::new(|t, c| t.subdomain(c) != OUTSIDE),
            edge_is_constrained: Box::new(|_, _, _| false),
            cancelled: Box::new(|| false),
        }
    }

    /// Keep complex facets and complex edges fixed. Default is `false`.
    pub fn with_protect_boundaries(mut self, protect: bool) -> Self {
        self.protect_boundaries = protect;
        self
    }

    /// Iteration budget for the driver loop. Default is `10`.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Restrict remeshing to the cells accepted by the selector. The default
    /// selects every cell with a subdomain label.
    pub fn with_cell_selector(
        mut self,
        selector: impl Fn(&Triangulation, CellHandle) -> bool + 'static,
    ) -> Self {
        self.cell_selector = Box::new(selector);
        self
    }

    /// Declare feature edges that must be preserved as complex edges.
    pub fn with_edge_constraints(
        mut self,
        constrained: impl Fn(&Triangulation, VertexHandle, VertexHandle) -> bool + 'static,
    ) -> Self {
        self.edge_is_constrained = Box::new(constrained);
        self
    }

    /// Cooperative cancellation, polled between phases. On request the driver
    /// finishes the running phase, postprocesses and returns a valid mesh.
    pub fn with_cancellation(mut self, cancelled: impl Fn() -> bool + 'static) -> Self {
        self.cancelled = Box::new(cancelled);
        self
    }

    /// Remeshes in place. On success the input triangulation holds the
    /// result.
    ///
    /// ## Errors
    /// [RemeshError::InvalidInput] when the triangulation fails the entry
    /// audit, [RemeshError::DegenerateGeometry] when the sizing field is
    /// unusable at the probe point. The input is left untouched in both
    /// cases.
    pub fn remesh(&self, tri: &mut Triangulation) -> Result<RemeshOutcome, RemeshError> {
        if !tri.is_valid() {
            return Err(RemeshError::InvalidInput);
        }
        let target = (self.sizing)(&SIZING_PROBE);
        if !target.is_finite() || target <= 0.0 {
            return Err(RemeshError::DegenerateGeometry(
                "sizing field is not positive at the probe point",
            ));
        }
        let emin = (4.0 / 5.0) * target;
        let emax = (4.0 / 3.0) * target;
        let (emin2, emax2) = (emin * emin, emax * emax);

        let input = core::mem::take(tri);
        let mut cx = MeshComplex::init(
            input,
            |t, c| (self.cell_selector)(t, c),
            |t, a, b| (self.edge_is_constrained)(t, a, b),
        );

        imaginary::add_layer(&mut cx);
        audit(&cx, "preprocess");
        dump_phase(&cx, 0, "preprocess");

        let mut outcome = RemeshOutcome {
            status: RemeshStatus::ResolutionNotReached,
            iterations: 0,
            splits: 0,
            collapses: 0,
            flips: 0,
            smooth_moves: 0,
        };

        'driver: for iteration in 1..=self.max_iterations {
            outcome.iterations = iteration;

            outcome.splits += split::split_long_edges(&mut cx, emax2, self.protect_boundaries);
            audit(&cx, "split");
            dump_phase(&cx, iteration, "split");
            if (self.cancelled)() {
                outcome.status = RemeshStatus::Cancelled;
                break 'driver;
            }

            outcome.collapses +=
                collapse::collapse_short_edges(&mut cx, emin2, emax2, self.protect_boundaries);
            audit(&cx, "collapse");
            dump_phase(&cx, iteration, "collapse");
            if (self.cancelled)() {
                outcome.status = RemeshStatus::Cancelled;
                break 'driver;
            }

            outcome.flips += flip::flip_pass(&mut cx);
            audit(&cx, "flip");
            dump_phase(&cx, iteration, "flip");
            if (self.cancelled)() {
                outcome.status = RemeshStatus::Cancelled;
                break 'driver;
            }

            outcome.smooth_moves += smooth::smooth_vertices(&mut cx);
            audit(&cx, "smooth");
            dump_phase(&cx, iteration, "smooth");
            if (self.cancelled)() {
                outcome.status = RemeshStatus::Cancelled;
                break 'driver;
            }

            if cx.resolution_reached(emin2, emax2) {
                outcome.status = RemeshStatus::Resolved;
                break 'driver;
            }
        }

        imaginary::strip_layer(&mut cx);
        audit(&cx, "postprocess");
        dump_phase(&cx, outcome.iterations, "postprocess");

        *tri = cx.finalize();
        log::debug!("remesh finished: {outcome}");
        Ok(outcome)
    }
}

/// In-place adaptive remeshing toward a constant target edge length.
pub fn remesh(
    tri: &mut Triangulation,
    target_edge_length: f64,
    protect_boundaries: bool,
    max_iterations: usize,
) -> Result<RemeshOutcome, RemeshError> {
    Remesher::uniform(target_edge_length)
        .with_protect_boundaries(protect_boundaries)
        .with_max_iterations(max_iterations)
        .remesh(tri)
}

fn audit(cx: &MeshComplex, phase: &str) {
    if cfg!(any(debug_assertions, feature = "audit")) {
        assert!(cx.is_valid(), "invariants violated after the {phase} phase");
    }
}

#[cfg(feature = "dump")]
fn dump_phase(cx: &MeshComplex, iteration: usize, phase: &str) {
    use std::fmt::Write as _;

    let tri = cx.triangulation();
    let mut out = String::new();
    for v in tri.finite_vertices() {
        let p = tri.point(v);
        let _ = writeln!(out, "v {} {} {} {}", v.index(), p[0], p[1], p[2]);
    }
    for c in tri.finite_cells() {
        let [v0, v1, v2, v3] = tri.cell_vertices(c).map(|v| v.index());
        let _ = writeln!(out, "c {} {v0} {v1} {v2} {v3}", tri.subdomain(c));
    }

    let path = format!("tetrem_{iteration:02}_{phase}.dump");
    if let Err(error) = std::fs::write(&path, out) {
        log::warn!("could not write {path}: {error}");
    }
}

#[cfg(not(feature = "dump"))]
fn dump_phase(_cx: &MeshComplex, _iteration: usize, _phase: &str) {}
