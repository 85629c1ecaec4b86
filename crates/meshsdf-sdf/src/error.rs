//! Error types for SDF reading and writing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from parsing or producing SDF descriptors.
#[derive(Error, Debug)]
pub enum SdfError {
    /// Reading or writing a descriptor file failed.
    #[error("{}: {source}", path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Writing to an in-memory or caller-supplied sink failed.
    #[error("write error: {0}")]
    Write(#[from] std::io::Error),

    /// The document is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The root element is not `<sdf>`.
    #[error("expected <sdf> root element, found <{0}>")]
    UnexpectedRoot(String),

    /// A required element or attribute is absent.
    #[error("missing {element} in <{parent}>")]
    Missing {
        /// Name of the missing element or attribute.
        element: &'static str,
        /// Element that should contain it.
        parent: String,
    },

    /// A numeric field could not be parsed.
    #[error("invalid number in <{element}>: {value:?}")]
    InvalidNumber {
        /// Element holding the value.
        element: String,
        /// Raw text.
        value: String,
    },

    /// Structurally invalid document.
    #[error("malformed SDF: {0}")]
    Malformed(String),

    /// URI scheme that cannot be resolved to a local file.
    #[error("unsupported mesh URI: {0}")]
    UnsupportedUri(String),
}

/// Result type for SDF operations.
pub type Result<T> = std::result::Result<T, SdfError>;
