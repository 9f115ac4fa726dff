//! Priority-queue entries for the length-driven operators.
//!
//! Entries are keyed by squared edge length with a stable tie-break on the
//! endpoint handles. Queues are maintained lazily: entries are revalidated
//! when popped, and stale ones discarded.

use crate::mesh::VertexHandle;
use core::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq)]
pub(crate) struct LengthEntry {
    pub len2: f64,
    pub a: VertexHandle,
    pub b: VertexHandle,
}

impl LengthEntry {
    pub(crate) fn new(len2: f64, a: VertexHandle, b: VertexHandle) -> Self {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Self { len2, a, b }
    }
}

impl Eq for LengthEntry {}

impl Ord for LengthEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // lengths are finite by construction, so total order is safe
        self.len2
            .partial_cmp(&other.len2)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.a.cmp(&other.a))
            .then_with(|| self.b.cmp(&other.b))
    }
}

impl PartialOrd for LengthEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
