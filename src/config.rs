//! Composer configuration
//!
//! Settings can be loaded from a TOML file with a `[templates]` table:
//!
//! ```toml
//! [templates]
//! extension = "grm"
//! max_import_depth = 1000
//! max_exec_depth = 100
//! flavor = "html"
//! missing_key = "empty"
//! read_timeout_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::exec::{ExecOptions, MissingKey};
use crate::flavor::FlavorKind;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for composing and executing templates
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Extension appended to import references that have none
    pub extension: String,
    /// Import chains reaching this depth fail
    pub max_import_depth: usize,
    /// Nested sub-template invocations allowed during execution
    pub max_exec_depth: usize,
    pub flavor: FlavorKind,
    pub missing_key: MissingKey,
    /// Give up on a root input that takes longer than this to read
    pub read_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extension: "grm".to_string(),
            max_import_depth: 1000,
            max_exec_depth: 100,
            flavor: FlavorKind::Text,
            missing_key: MissingKey::Error,
            read_timeout_ms: None,
        }
    }
}

/// TOML structure for deserializing config files
#[derive(Deserialize)]
struct TomlConfig {
    #[serde(default)]
    templates: Config,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let parsed: TomlConfig = toml::from_str(content)?;
        let config = parsed.templates;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension must be non-empty and given without a dot, got {:?}",
                self.extension
            )));
        }
        if self.max_import_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_import_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }

    pub fn with_max_exec_depth(mut self, depth: usize) -> Self {
        self.max_exec_depth = depth;
        self
    }

    pub fn with_flavor(mut self, flavor: FlavorKind) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn with_missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout_ms = timeout.map(|d| d.as_millis() as u64);
        self
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            max_depth: self.max_exec_depth,
            missing_key: self.missing_key,
        }
    }
}
