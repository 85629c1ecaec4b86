//! Optional TOML defaults for both tools.
//!
//! ```toml
//! [convert]
//! density = 1200.0
//!
//! [convert.decomposition]
//! max_hulls = 24
//!
//! [inspect.viewer]
//! port = 7100
//! ```
//!
//! Every field is optional. Command-line flags override what the file says.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::convert::ConvertOptions;
use crate::error::ConfigError;
use crate::inspect::InspectOptions;

/// Settings for both tools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Converter settings.
    #[serde(default)]
    pub convert: ConvertOptions,
    /// Inspector settings.
    #[serde(default)]
    pub inspect: InspectOptions,
}

impl Config {
    /// Read a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path` if given, otherwise use the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
