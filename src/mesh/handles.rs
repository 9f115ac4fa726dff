use core::fmt;

/// Stable reference to a vertex.
///
/// Handles survive mutations of neighboring elements; deleting the vertex
/// itself bumps the slot generation and invalidates every outstanding handle.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VertexHandle {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl VertexHandle {
    /// Slot index in the vertex arena.
    pub const fn index(&self) -> usize {
        self.idx as usize
    }
}

impl fmt::Display for VertexHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.idx)
    }
}

/// Stable reference to a cell, with the same invalidation contract as
/// [VertexHandle].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct CellHandle {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl CellHandle {
    /// Slot index in the cell arena.
    pub const fn index(&self) -> usize {
        self.idx as usize
    }
}

impl fmt::Display for CellHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.idx)
    }
}

/// The triangle opposite vertex `i` of `cell`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Facet {
    pub cell: CellHandle,
    pub i: u8,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f({}, {})", self.cell, self.i)
    }
}
