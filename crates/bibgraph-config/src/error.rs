//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, saving or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Filesystem failure on a config file or directory
    #[error("failed to {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for the schema
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("could not determine home directory")]
    NoHomeDir,

    /// A single setting has an unusable value
    #[error("invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action: "read config file",
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action: "write config file",
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action: "create config directory",
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::NoHomeDir;
        assert_eq!(err.to_string(), "could not determine home directory");

        let err = ConfigError::invalid_value("storage.backend", "unknown backend 'foo'");
        assert!(err.to_string().contains("storage.backend"));
        assert!(err.to_string().contains("unknown backend"));
    }

    #[test]
    fn test_io_error_names_action_and_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ConfigError::read_file("/etc/bibgraph/config.toml", io);
        let message = err.to_string();
        assert!(message.starts_with("failed to read config file"));
        assert!(message.contains("/etc/bibgraph/config.toml"));
        assert!(message.contains("denied"));
    }
}
