//! Error types for physics scene construction.

use std::path::PathBuf;

use meshsdf_mesh::MeshError;
use meshsdf_sdf::SdfError;
use thiserror::Error;

/// Errors that can occur while building or running a scene.
#[derive(Error, Debug)]
pub enum PhysicsError {
    /// The descriptor could not be read or references something unusable.
    #[error(transparent)]
    Descriptor(#[from] SdfError),

    /// A referenced mesh file could not be loaded.
    #[error("failed to load mesh {}: {source}", path.display())]
    Mesh {
        /// Resolved mesh path.
        path: PathBuf,
        /// Underlying error.
        source: MeshError,
    },

    /// Failed to create collision shape.
    #[error("failed to create collision shape for {name}: {reason}")]
    CollisionShape {
        /// Geometry name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// A body could not be welded to the world.
    #[error("failed to weld link {0} to the world")]
    Weld(String),
}

/// Result type for physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;
