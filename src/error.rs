use core::fmt;
use thiserror::Error;

/// Fatal, driver-level failures.
///
/// Individual local operations never surface here; a rejected operation is
/// skipped and the driver continues.
#[derive(Error, Debug)]
pub enum RemeshError {
    /// The input triangulation failed the validity audit on entry.
    #[error("input triangulation failed the validity audit")]
    InvalidInput,
    /// A degenerate configuration that no operator can resolve.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),
}

/// Reason a local operation was refused.
///
/// Every mutating mesh operation either leaves the manifold invariants intact
/// or returns one of these and leaves the mesh untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// A resulting cell would have non-positive signed volume.
    Inverted,
    /// Collapsing the edge would change the topology of the star.
    LinkCondition,
    /// The operation would destroy a protected element.
    Protected,
    /// A predicate reported a flat or coplanar configuration.
    Degenerate,
    /// A resulting edge would exceed the splitting threshold.
    Overstretch,
    /// The operation would merge or erase subdomain structure.
    FeatureLoss,
    /// A referenced element no longer exists.
    Missing,
    /// A combinatorial precondition does not hold (ring size, adjacency).
    Topology,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Inverted => "inverted cell",
            Rejection::LinkCondition => "link condition failed",
            Rejection::Protected => "protected element",
            Rejection::Degenerate => "degenerate configuration",
            Rejection::Overstretch => "resulting edge too long",
            Rejection::FeatureLoss => "subdomain feature would be lost",
            Rejection::Missing => "element no longer exists",
            Rejection::Topology => "topological precondition failed",
        };
        write!(f, "{reason}")
    }
}
