//! Error types for convex decomposition.

use thiserror::Error;

/// Reasons a convex decomposition could not be produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompositionError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// Mesh buffers are inconsistent.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// Mesh has NaN or infinite coordinates.
    #[error("mesh has non-finite coordinates")]
    NonFinite,

    /// Not enough distinct points to span a volume.
    #[error("mesh has only {0} distinct vertices, need at least 4")]
    TooFewVertices(usize),

    /// Mesh has no thickness along some axis.
    #[error("mesh is flat: extents {0:?}")]
    Degenerate([f32; 3]),

    /// The decomposition library panicked.
    #[error("decomposition library failed: {0}")]
    Library(String),
}
