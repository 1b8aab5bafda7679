//! Configuration management for db-rowset.
//!
//! Handles loading configuration from TOML files and environment variables.

use crate::error::{Result, RowsetError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Row fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Settings that control how results are fetched and materialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchConfig {
    /// Rows allocated up front when fetching without a row limit.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Rows between checks of the interrupt token during a fetch.
    #[serde(default = "default_interrupt_interval")]
    pub interrupt_interval: usize,

    /// Initial buffer size in bytes for string and blob columns.
    #[serde(default = "default_scratch_len")]
    pub scratch_len: usize,
}

fn default_initial_capacity() -> usize {
    100
}

fn default_interrupt_interval() -> usize {
    1000
}

fn default_scratch_len() -> usize {
    64
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            interrupt_interval: default_interrupt_interval(),
            scratch_len: default_scratch_len(),
        }
    }
}

impl FetchConfig {
    /// Checks that all settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(RowsetError::config("fetch.initial_capacity must be positive"));
        }
        if self.interrupt_interval == 0 {
            return Err(RowsetError::config(
                "fetch.interrupt_interval must be positive",
            ));
        }
        if self.scratch_len == 0 {
            return Err(RowsetError::config("fetch.scratch_len must be positive"));
        }
        Ok(())
    }

    /// Applies environment variables (ROWSET_INITIAL_CAPACITY, etc.) as overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        for (var, slot) in [
            ("ROWSET_INITIAL_CAPACITY", &mut self.initial_capacity),
            ("ROWSET_INTERRUPT_INTERVAL", &mut self.interrupt_interval),
            ("ROWSET_SCRATCH_LEN", &mut self.scratch_len),
        ] {
            if let Ok(raw) = std::env::var(var) {
                *slot = raw
                    .trim()
                    .parse()
                    .map_err(|_| {
                        RowsetError::config(format!("{var} must be a number, got '{raw}'"))
                    })?;
            }
        }
        Ok(())
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-rowset")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RowsetError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            RowsetError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.fetch.validate()?;
        Ok(config)
    }
}
