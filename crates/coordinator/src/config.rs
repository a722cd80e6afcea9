//! Typed coordinator configuration, loaded from TOML.
//!
//! Defaults are deterministic and explicit; nothing is read from the
//! environment.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::reputation::REPUTATION_POINTS;

/// Default target count of established mirrors per shard.
pub const DEFAULT_REPLICATION_FACTOR: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration of the reconciliation and mirroring core.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Target count of established mirrors per shard; the orchestrator's
    /// capacity check backpressures against this.
    pub replication_factor: usize,

    /// Magnitude of a single reputation adjustment.
    pub reputation_points: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            replication_factor: DEFAULT_REPLICATION_FACTOR,
            reputation_points: REPUTATION_POINTS,
        }
    }
}

impl CoordinatorConfig {
    /// Loads configuration from a TOML file. A missing file is an error;
    /// missing keys fall back to defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}
