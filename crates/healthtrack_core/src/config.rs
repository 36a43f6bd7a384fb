//! Storage and backup location settings.
//!
//! # Responsibility
//! - Hold the data file path, backup directory and export file prefix.
//! - Apply environment overrides on top of built-in defaults.
//!
//! # Invariants
//! - Configured paths and prefix are never blank.
//! - The prefix never contains a path separator.

use crate::snapshot::DEFAULT_BACKUP_PREFIX;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "DB_PATH";
pub const ENV_BACKUP_PATH: &str = "BACKUP_PATH";
pub const ENV_BACKUP_PREFIX: &str = "BACKUP_PREFIX";

const DEFAULT_DB_PATH: &str = "./data/health.db";
const DEFAULT_BACKUP_DIR: &str = "./backups";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Blank(&'static str),
    InvalidPrefix(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank(key) => write!(f, "`{key}` cannot be blank"),
            Self::InvalidPrefix(prefix) => write!(
                f,
                "backup prefix `{prefix}` must not contain path separators"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Where the subsystem keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            backup_prefix: DEFAULT_BACKUP_PREFIX.to_string(),
        }
    }
}

impl StorageConfig {
    /// Defaults overridden by `DB_PATH`, `BACKUP_PATH` and `BACKUP_PREFIX`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DB_PATH) {
            config.db_path = PathBuf::from(non_blank(ENV_DB_PATH, &value)?);
        }
        if let Some(value) = lookup(ENV_BACKUP_PATH) {
            config.backup_dir = PathBuf::from(non_blank(ENV_BACKUP_PATH, &value)?);
        }
        if let Some(value) = lookup(ENV_BACKUP_PREFIX) {
            config.backup_prefix = non_blank(ENV_BACKUP_PREFIX, &value)?.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Blank(ENV_DB_PATH));
        }
        if self.backup_dir.as_os_str().is_empty() {
            return Err(ConfigError::Blank(ENV_BACKUP_PATH));
        }
        if self.backup_prefix.trim().is_empty() {
            return Err(ConfigError::Blank(ENV_BACKUP_PREFIX));
        }
        if self.backup_prefix.contains(['/', '\\']) {
            return Err(ConfigError::InvalidPrefix(self.backup_prefix.clone()));
        }
        Ok(())
    }
}

fn non_blank<'a>(key: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Blank(key));
    }
    Ok(trimmed)
}
