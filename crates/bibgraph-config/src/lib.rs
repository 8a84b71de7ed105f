//! bibgraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.bibgraph/config.toml`
//! - Local config: `.bibgraph/config.toml` (in the working directory)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.
//!
//! # Example TOML
//!
//! ```toml
//! [storage]
//! backend = "sqlite"          # or "memory" or "none"
//! path = ".bibgraph/graph.db"
//!
//! [query]
//! default_neighbor_limit = 50
//!
//! [logging]
//! level = "info"
//! format = "text"             # or "json"
//! ```

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the SQLite graph database, relative to the workspace.
pub const DEFAULT_STORE_PATH: &str = ".bibgraph/graph.db";

/// Log levels accepted by `[logging] level`.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Root configuration for bibgraph.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BibgraphConfig {
    pub storage: StorageConfig,
    pub query: QueryConfig,
    pub logging: LoggingConfig,
}

/// Where the durable graph lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// SQLite database file (relative paths resolve against the workspace)
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Durable store selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database file (default)
    #[default]
    Sqlite,
    /// In-process store, discarded on exit
    Memory,
    /// No durable store; the graph runs purely in memory
    None,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            "none" | "off" => Ok(Self::None),
            _ => Err(ConfigError::invalid_value(
                "storage.backend",
                format!("unknown backend '{}'. Valid values: sqlite, memory, none", s),
            )),
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QueryConfig {
    /// Cap applied to neighbour listings when the caller gives none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_neighbor_limit: Option<usize>,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_path: Option<PathBuf>,
    pub backend: Option<StorageBackend>,
    pub log_level: Option<String>,
}

impl BibgraphConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref path) = overrides.store_path {
            self.storage.path = path.clone();
        }

        if let Some(backend) = overrides.backend {
            self.storage.backend = backend;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == StorageBackend::Sqlite
            && self.storage.path.as_os_str().is_empty()
        {
            return Err(ConfigError::Validation(
                "storage.path must not be empty when storage.backend is 'sqlite'".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "logging.level",
                format!(
                    "'{}' is not one of {}",
                    self.logging.level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        if self.query.default_neighbor_limit == Some(0) {
            return Err(ConfigError::invalid_value(
                "query.default_neighbor_limit",
                "must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Get the effective database path for a workspace.
    pub fn store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.path.is_absolute() {
            self.storage.path.clone()
        } else {
            workspace_root.join(&self.storage.path)
        }
    }
}
