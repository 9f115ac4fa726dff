// Type aliases for data values.
pub type Vertex3 = [f64; 3];
pub type Tetrahedron3 = [Vertex3; 4];

/// Material region label of a cell.
///
/// `OUTSIDE` marks cells exterior to every subdomain; the remesher never
/// changes the geometry of a region labelled `OUTSIDE`.
pub type Subdomain = u32;

/// The exterior region label.
pub const OUTSIDE: Subdomain = 0;
