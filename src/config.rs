//! Configuration management for hosts-redirect.
//!
//! This module handles loading, parsing and validating the YAML
//! configuration file. Every section is optional; missing fields fall back
//! to their defaults.

use crate::error::{RedirectError, Result};
use crate::parser::DEFAULT_MAX_HOSTNAME_LEN;
use crate::selector::StorageProfile;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info};

/// Largest hosts file accepted by default, exclusive (32 KiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 0x8000;

/// Which kind of storage profile is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Regular system storage.
    #[default]
    System,
    /// Emulated storage, identified by `emulated_id`.
    Emulated,
}

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory that contains the `hosts/` directory.
    pub root: PathBuf,

    /// Active storage profile.
    pub profile: ProfileKind,

    /// ID of the emulated storage, used when `profile` is `emulated`.
    pub emulated_id: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./atmosphere"),
            profile: ProfileKind::System,
            emulated_id: 0,
        }
    }
}

/// Redirection configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedirectConfig {
    /// Seed the table with the built-in default entries.
    pub add_defaults: bool,

    /// Hosts files must be strictly smaller than this many bytes.
    pub max_file_size: u64,

    /// Longest hostname accepted, in bytes.
    pub max_hostname_len: usize,

    /// Reload the table whenever a hosts file changes.
    pub watch: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            add_defaults: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_hostname_len: DEFAULT_MAX_HOSTNAME_LEN,
            watch: false,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable pretty format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
    /// JSON format for structured logging.
    Json,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Output destination: stdout, stderr, or file path.
    pub output: String,

    /// Log format.
    pub format: LogFormat,

    /// Include target (module path) in logs.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stderr".to_string(),
            format: LogFormat::Compact,
            include_target: false,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Redirection configuration.
    pub redirect: RedirectConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RedirectError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&contents)
            .map_err(|e| RedirectError::config_parse(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(RedirectError::config_validation(
                "Storage root cannot be empty",
            ));
        }

        if self.redirect.max_file_size == 0 {
            return Err(RedirectError::config_validation(
                "max_file_size must be greater than zero",
            ));
        }

        if self.redirect.max_hostname_len == 0 {
            return Err(RedirectError::config_validation(
                "max_hostname_len must be greater than zero",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(RedirectError::config_validation(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }

    /// The storage profile described by the `storage` section.
    pub fn storage_profile(&self) -> StorageProfile {
        match self.storage.profile {
            ProfileKind::System => StorageProfile::System,
            ProfileKind::Emulated => StorageProfile::Emulated {
                id: self.storage.emulated_id,
            },
        }
    }
}

/// Thread-safe configuration holder with reload support.
#[derive(Clone)]
pub struct ConfigManager {
    /// Current configuration.
    config: Arc<RwLock<AppConfig>>,

    /// Path to the configuration file.
    config_path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager and loads the initial configuration.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();
        let config = AppConfig::load(&config_path)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
        })
    }

    /// Gets a clone of the current configuration.
    pub fn get(&self) -> AppConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Reloads the configuration from disk. On failure the current
    /// configuration is kept.
    pub fn reload(&self) -> Result<()> {
        info!("Reloading configuration from {:?}", self.config_path);

        match AppConfig::load(&self.config_path) {
            Ok(new_config) => {
                let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
                *config = new_config;
                info!("Configuration reloaded successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to reload configuration: {}", e);
                Err(e)
            }
        }
    }
}
