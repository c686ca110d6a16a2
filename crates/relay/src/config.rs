use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Relay settings, read from a TOML file. Command-line flags override them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// JSON snapshot holding the document collection.
    #[serde(default)]
    pub collection: Option<PathBuf>,
    /// Write the snapshot back after a rename or delete.
    #[serde(default = "default_write_back")]
    pub write_back: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_write_back() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: None,
            write_back: default_write_back(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;

        // A relative collection path is relative to the config file
        if let (Some(collection), Some(dir)) = (config.collection.as_mut(), path.parent()) {
            if collection.is_relative() {
                *collection = dir.join(&*collection);
            }
        }
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
