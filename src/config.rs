//! Configuration file handling.
//!
//! A small YAML file at `.taskforge/config.yaml` selects which backend new
//! invocations use and whether the graph capability is layered on. Merging
//! of multiple config sources is out of scope; the file is read as-is.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file path relative to the base directory.
pub const CONFIG_FILE_PATH: &str = ".taskforge/config.yaml";

/// Persistent tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Name of the backend to resolve for new invocations.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Whether to layer dependency tracking onto the backend.
    #[serde(default)]
    pub graph: bool,

    /// Override for the data directory. None means `~/.taskforge/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self { backend: default_backend(), graph: false, data_dir: None }
    }
}

impl Config {
    /// Load config from a base directory, returning `None` if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(base_dir: &Path) -> Result<Option<Self>> {
        let config_path = base_dir.join(CONFIG_FILE_PATH);
        if !config_path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Save config to a base directory, creating the parent as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, base_dir: &Path) -> Result<()> {
        let config_path = base_dir.join(CONFIG_FILE_PATH);
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&config_path, serde_yaml::to_string(self)?)?;
        Ok(())
    }
}
