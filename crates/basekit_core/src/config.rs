//! Orchestration defaults shared by services and controllers.

use crate::repo::DeleteRule;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Pagination defaults and delete behavior.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrudConfig {
    /// Page size used when a list request omits `count`.
    pub default_count: u64,
    /// Largest accepted page size.
    pub max_count: u64,
    /// Page used when a list request omits `page`.
    pub default_page: u64,
    pub delete_rule: DeleteRule,
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            default_count: 25,
            max_count: 100,
            default_page: 1,
            delete_rule: DeleteRule::KeepLinks,
        }
    }
}

impl CrudConfig {
    /// Parses and validates a JSON document; absent keys keep defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_count == 0 {
            return Err(ConfigError::Invalid(
                "default_count must be at least 1".to_string(),
            ));
        }
        if self.max_count < self.default_count {
            return Err(ConfigError::Invalid(format!(
                "max_count ({}) must not be below default_count ({})",
                self.max_count, self.default_count
            )));
        }
        if self.default_page == 0 {
            return Err(ConfigError::Invalid(
                "default_page must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
