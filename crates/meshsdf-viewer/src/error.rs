//! Error types for the viewer.

use thiserror::Error;

/// Errors from starting or talking to the viewer.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// No port in the configured range could be bound.
    #[error("could not bind {host} on ports {first_port}..{last_port}: {source}")]
    Bind {
        /// Host address.
        host: String,
        /// First port tried.
        first_port: u16,
        /// One past the last port tried.
        last_port: u32,
        /// Error from the last attempt.
        source: std::io::Error,
    },

    /// Socket I/O failed.
    #[error("viewer I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Scene could not be serialized.
    #[error("failed to encode scene: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for viewer operations.
pub type Result<T> = std::result::Result<T, ViewerError>;
