//! Application configuration and persistence utilities.
//!
//! The configuration is a small JSON document in the platform config directory.
//! Missing fields fall back to defaults so older files keep loading.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Chain selected when no configuration exists.
pub const DEFAULT_CHAIN_ID: &str = "astra_11110-1";

/// Configuration error type.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Other configuration error.
    #[error("{0}")]
    Other(String),
}

/// Per-chain endpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverrides {
    /// Custom REST (LCD) base URL.
    #[serde(default)]
    pub rest_url: Option<String>,
    /// Custom transaction indexer base URL.
    #[serde(default)]
    pub indexer_url: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Selected chain identifier.
    #[serde(default = "default_chain_id")]
    pub chain_id: String,
    /// Last watched account address.
    #[serde(default)]
    pub last_address: Option<String>,
    /// Endpoint overrides for the selected chain.
    #[serde(default)]
    pub endpoints: EndpointOverrides,
    /// Override for the gas multiplier applied to simulated gas.
    #[serde(default)]
    pub gas_multiplier: Option<f64>,
    /// Minimum reward (display units) a validator must hold to be claimed.
    #[serde(default = "default_reward_dust")]
    pub reward_dust: String,
}

fn default_chain_id() -> String {
    DEFAULT_CHAIN_ID.to_string()
}

fn default_reward_dust() -> String {
    crate::apr::DEFAULT_REWARD_DUST_DISPLAY.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            last_address: None,
            endpoints: EndpointOverrides::default(),
            gas_multiplier: None,
            reward_dust: default_reward_dust(),
        }
    }
}

// ==================== Path Utilities ====================

/// Get the config directory.
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("io", "astranaut", "astra-wallet")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| ConfigError::Other("Could not determine config directory".to_string()))
}

/// Get the config file path.
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    get_config_dir().map(|dir| dir.join("config.json"))
}

// ==================== Config I/O ====================

/// Load configuration from disk.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path()?)
}

/// Load configuration from an explicit path; a missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = fs::read_to_string(path)?;
    let config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to disk.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path()?)
}

/// Save configuration to an explicit path, creating parent directories.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
