use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::service::SimulatedLatency;

/// Client configuration, read from an optional YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capacity of the cache actor's request channel.
    #[serde(default = "default_cache_buffer")]
    pub cache_buffer: usize,
    #[serde(default)]
    pub latency: LatencyConfig,
}

/// Delay added before each remote call, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LatencyConfig {
    #[serde(default)]
    pub list_ms: u64,
    #[serde(default)]
    pub create_ms: u64,
    #[serde(default)]
    pub update_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            log_level: default_log_level(),
            cache_buffer: default_cache_buffer(),
            latency: LatencyConfig::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_buffer() -> usize {
    32
}

impl AppConfig {
    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("parsing config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(raw)?;
        anyhow::ensure!(config.cache_buffer > 0, "cache_buffer must be positive");
        Ok(config)
    }
}

impl From<&LatencyConfig> for SimulatedLatency {
    fn from(config: &LatencyConfig) -> Self {
        Self {
            list: Duration::from_millis(config.list_ms),
            create: Duration::from_millis(config.create_ms),
            update: Duration::from_millis(config.update_ms),
        }
    }
}
