//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.bibgraph/config.toml`
//! 2. Local config: `.bibgraph/config.toml` (in the workspace)
//! 3. CLI overrides
//!
//! Later sources override earlier ones. A file only needs to mention the
//! settings it changes; a value equal to the default is treated as unset.

use crate::error::ConfigError;
use crate::{BibgraphConfig, ConfigOverrides, LoggingConfig, QueryConfig, StorageConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory holding bibgraph files, both under `$HOME` and in a workspace.
const CONFIG_DIR: &str = ".bibgraph";

/// Configuration loader with global/local inheritance.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.bibgraph`)
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader rooted at `~/.bibgraph`.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
        }
    }

    /// Create a loader with a custom global config directory.
    ///
    /// Useful for testing.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Load and validate configuration for a workspace.
    ///
    /// Merges config in order: global → local → overrides.
    pub fn load(
        &self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<BibgraphConfig, ConfigError> {
        let mut config = BibgraphConfig::default();

        if let Some(global_config) = self.load_global()? {
            config = merge_configs(config, global_config);
        }

        if let Some(local_config) = self.load_local(workspace_root)? {
            config = merge_configs(config, local_config);
        }

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load one explicit config file over the defaults, skipping inheritance.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<BibgraphConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let mut config: BibgraphConfig =
            toml::from_str(&content).map_err(|e| ConfigError::parse(path, e))?;

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn load_global(&self) -> Result<Option<BibgraphConfig>, ConfigError> {
        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };
        load_if_present(&global_path)
    }

    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<BibgraphConfig>, ConfigError> {
        load_if_present(&self.local_config_path(workspace_root))
    }

    /// Write a default global config unless one exists. Returns its path.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(config_path) = self.global_config_path() else {
            return Err(ConfigError::NoHomeDir);
        };
        init_file(config_path)
    }

    /// Write a default local config unless one exists. Returns its path.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        init_file(self.local_config_path(workspace_root))
    }

    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &BibgraphConfig,
    ) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }
}

fn load_if_present(path: &Path) -> Result<Option<BibgraphConfig>, ConfigError> {
    if !path.exists() {
        trace!("Config not found at {:?}", path);
        return Ok(None);
    }

    debug!("Loading config from {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::parse(path, e))
}

fn init_file(config_path: PathBuf) -> Result<PathBuf, ConfigError> {
    if !config_path.exists() {
        save_config_file(&config_path, &BibgraphConfig::default())?;
    }
    Ok(config_path)
}

fn save_config_file(path: &Path, config: &BibgraphConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge two configurations, with `overlay` taking precedence.
fn merge_configs(base: BibgraphConfig, overlay: BibgraphConfig) -> BibgraphConfig {
    BibgraphConfig {
        storage: merge_storage(base.storage, overlay.storage),
        query: merge_query(base.query, overlay.query),
        logging: merge_logging(base.logging, overlay.logging),
    }
}

/// Pick `overlay` unless it still holds the default.
fn prefer<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

fn merge_storage(base: StorageConfig, overlay: StorageConfig) -> StorageConfig {
    let default = StorageConfig::default();
    StorageConfig {
        backend: prefer(base.backend, overlay.backend, default.backend),
        path: prefer(base.path, overlay.path, default.path),
    }
}

fn merge_query(base: QueryConfig, overlay: QueryConfig) -> QueryConfig {
    QueryConfig {
        default_neighbor_limit: overlay
            .default_neighbor_limit
            .or(base.default_neighbor_limit),
    }
}

fn merge_logging(base: LoggingConfig, overlay: LoggingConfig) -> LoggingConfig {
    let default = LoggingConfig::default();
    LoggingConfig {
        level: prefer(base.level, overlay.level, default.level),
        format: prefer(base.format, overlay.format, default.format),
    }
}
