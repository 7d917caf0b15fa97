//! Configuration module for dirmirror.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DIRMIRROR_` and use double
//! underscores to separate nested levels:
//! - `DIRMIRROR_DEBOUNCE_MS=50` sets `debounce_ms`
//! - `DIRMIRROR_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Configuration file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "dirmirror.toml";

/// Quiet period before a changed file is copied.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Milliseconds a path must be quiet before it is copied
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Directory pairs to mirror
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

/// One source directory and the directory it is mirrored into.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct MappingConfig {
    pub source: PathBuf,
    pub destination: PathBuf,

    /// Skip entries whose names begin with a dot
    #[serde(default)]
    pub exclude_hidden: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default level for all modules (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module overrides, e.g. `dirmirror = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_version() -> u32 {
    1
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debounce_ms: default_debounce_ms(),
            logging: LoggingConfig::default(),
            mappings: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// `path` overrides the default `dirmirror.toml` lookup. A missing file is
    /// not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<figment::Error>> {
        Self::load_from(Self::config_path(path))
    }

    /// The file [`Settings::load`] reads for a given `--config` value.
    pub fn config_path(path: Option<&Path>) -> PathBuf {
        path.map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(config_path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            // Double underscore separates nested levels
            .merge(Env::prefixed("DIRMIRROR_").split("__"))
    }

    /// Render the settings as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
