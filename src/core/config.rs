//! Workspace configuration loaded from `config.toml` in the workspace root.

use crate::core::error::SpecdeckError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub lifecycle: LifecycleConfig,
    pub git: GitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Refuse to activate a proposal that sits on a dependency cycle.
    pub block_cycles: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { block_cycles: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GitConfig {
    /// Commit the workspace after `complete`. Failures are logged, never fatal.
    pub snapshot_on_complete: bool,
    pub message_prefix: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            snapshot_on_complete: false,
            message_prefix: "specdeck:".to_string(),
        }
    }
}

/// Load `config.toml` from the workspace root. No file means defaults.
pub fn load_config(root: &Path) -> Result<Config, SpecdeckError> {
    let path = root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&path).map_err(SpecdeckError::io("read config", &path))?;
    toml::from_str(&content)
        .map_err(|e| SpecdeckError::Config(format!("{}: {}", path.display(), e)))
}

pub fn default_config_toml() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_default()
}
