//! TOML configuration loading.
//!
//! Any `DeserializeOwned` type can be read from a file or a string through the
//! blanket [`ConfigLoader`] implementation. Types with semantic constraints
//! implement [`Validate`] and get [`ConfigLoader::load_validated`].
//!
//! ```rust,no_run
//! use servo_common::config::{ConfigError, ConfigLoader};
//! use servo_common::drive::DriveConfig;
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = DriveConfig::load_validated(Path::new("joint_1.toml"))?;
//!     println!("encoder: {} inc/rev", config.position_encoder_resolution);
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Configuration loading failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// No file at the given path.
    #[error("Configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File exists but could not be read.
    #[error("Failed to read configuration: {0}")]
    ReadError(String),

    /// Invalid TOML, or a field of the wrong type.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Values parsed but violate a constraint.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Semantic checks run after parsing.
pub trait Validate {
    fn validate(&self) -> Result<(), ConfigError>;
}

/// TOML loading for deserializable configuration types.
pub trait ConfigLoader: Sized + DeserializeOwned {
    /// Parse the TOML file at `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
            _ => ConfigError::ReadError(format!("{}: {e}", path.display())),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse an in-memory TOML document.
    fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// [`load`](Self::load) followed by [`Validate::validate`].
    fn load_validated(path: &Path) -> Result<Self, ConfigError>
    where
        Self: Validate,
    {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

impl<T: DeserializeOwned> ConfigLoader for T {}
