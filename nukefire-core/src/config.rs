//! Application configuration loaded from TOML.
//!
//! ```toml
//! database = "/srv/nukefire/eq.sqlite"
//! log_file = "/var/log/nukefire-eq.log"
//!
//! [parser]
//! anchor_properties = true
//! ```

use crate::error::{EqError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Parser switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Only match `HUM`, `GLOW`, `MAGIC`, `NOBITS` and `ANTI_*` as whole words.
    /// Off by default, which also matches them inside longer words.
    pub anchor_properties: bool,
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub parser: ParseOptions,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EqError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config from {:?}: {}", path, e),
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| EqError::Config(format!("Failed to parse config TOML: {}", e)))
    }
}
