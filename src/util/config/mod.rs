//! Configuration
//!
//! One TOML file, every section optional:
//!
//! ```toml
//! [layout]
//! optimize_layout = true
//!
//! [heap]
//! initial_capacity = 65536
//! max_capacity = 67108864
//!
//! [guard]
//! reset_policy = "full"   # or "subtree"
//!
//! [log]
//! level = "info"
//! ```
//!
//! # Lookup order
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments
//! 2. File named by INTRINSIC_LAYOUT_CONFIG
//! 3. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use intrinsic_layout::util::config::EmbedConfig;
//!
//! let config = EmbedConfig::from_toml_str("[layout]\noptimize_layout = false\n").unwrap();
//! assert!(!config.layout.optimize_layout);
//! assert_eq!(config.heap, Default::default());
//! ```

use crate::construct::CycleResetPolicy;
use crate::layout::LayoutConfig;
use crate::runtime::memory::HeapConfig;
use crate::util::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "INTRINSIC_LAYOUT_CONFIG";

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EmbedConfig {
    /// Layout pass settings
    #[serde(default)]
    pub layout: LayoutConfig,
    /// Heap settings
    #[serde(default)]
    pub heap: HeapConfig,
    /// Cycle guard settings
    #[serde(default)]
    pub guard: GuardConfig,
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

/// Cycle guard configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GuardConfig {
    /// What to forget when a cycle is detected
    #[serde(default)]
    pub reset_policy: CycleResetPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl EmbedConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Load configuration from `path`
pub fn load_config(path: &Path) -> Result<EmbedConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = EmbedConfig::from_toml_str(&content)?;
    debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Load `path` if given, else the file named by the environment, else defaults
pub fn load_or_default(path: Option<&Path>) -> Result<EmbedConfig, ConfigError> {
    match path.map(Path::to_path_buf).or_else(config_path_from_env) {
        Some(path) => load_config(&path),
        None => Ok(EmbedConfig::default()),
    }
}

/// Path named by `INTRINSIC_LAYOUT_CONFIG`, if set and non-empty
pub fn config_path_from_env() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}
