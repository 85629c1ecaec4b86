//! Viewer configuration.

use serde::{Deserialize, Serialize};

/// Where the viewer listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Interface to bind.
    pub host: String,
    /// First port to try. Zero picks any free port.
    pub port: u16,
    /// How many consecutive ports to try before giving up.
    pub port_attempts: u16,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            port_attempts: 100,
        }
    }
}
