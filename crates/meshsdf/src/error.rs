//! Error types for the conversion and inspection pipelines.

use std::path::PathBuf;

use meshsdf_mesh::MeshError;
use meshsdf_physics::PhysicsError;
use meshsdf_sdf::SdfError;
use meshsdf_viewer::ViewerError;
use thiserror::Error;

/// Errors that abort a mesh conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The input mesh does not exist.
    #[error("no mesh found at {}", .0.display())]
    MissingInput(PathBuf),

    /// The input path has no file stem to name outputs after.
    #[error("cannot derive an output name from {}", .0.display())]
    InvalidInputName(PathBuf),

    /// Reading or writing a mesh failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),

    /// Writing the descriptor failed.
    #[error(transparent)]
    Sdf(#[from] SdfError),

    /// A filesystem operation failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// Errors that abort an inspection.
#[derive(Error, Debug)]
pub enum InspectError {
    /// The descriptor does not exist.
    #[error("no SDF found at {}", .0.display())]
    MissingDescriptor(PathBuf),

    /// The scene could not be built.
    #[error(transparent)]
    Physics(#[from] PhysicsError),

    /// The viewer could not be started.
    #[error(transparent)]
    Viewer(#[from] ViewerError),
}

/// Errors from loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Config`](crate::Config).
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        /// Config path.
        path: PathBuf,
        /// Parser error.
        source: toml::de::Error,
    },
}
