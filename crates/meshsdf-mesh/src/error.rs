//! Error types for mesh I/O.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading or writing meshes.
#[derive(Error, Debug)]
pub enum MeshError {
    /// Underlying file I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Original error.
        source: std::io::Error,
    },

    /// The OBJ parser rejected the input.
    #[error("failed to parse OBJ: {0}")]
    Obj(String),

    /// The file extension is not a supported mesh format.
    #[error("unsupported mesh format: {0}")]
    UnsupportedFormat(PathBuf),

    /// A triangle refers to a vertex that does not exist.
    #[error("vertex index {index} out of range ({count} vertices)")]
    IndexOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of vertices in the mesh.
        count: usize,
    },

    /// Buffers are inconsistent.
    #[error("malformed mesh: {0}")]
    Malformed(String),
}

impl MeshError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        MeshError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Error for stream I/O where no file path is known.
    pub(crate) fn stream(source: std::io::Error) -> Self {
        MeshError::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
