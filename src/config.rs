use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Context, Result, anyhow};

use crate::highlight::DEFAULT_CODE_THEME;

pub const DEFAULT_ENDPOINT: &str = "https://geminibackend-hwyu.onrender.com/generate";
pub const ENDPOINT_ENV: &str = "TUTOR_ENDPOINT";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub endpoint: String,
    pub tutor_name: String,
    pub reveal_interval_ms: u64,
    pub code_theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tutor_name: "Binary".to_string(),
            reveal_interval_ms: 30,
            code_theme: DEFAULT_CODE_THEME.to_string(),
        }
    }
}

impl Config {
    /// Load the user config, then let the environment override the endpoint
    pub fn load() -> Result<Self> {
        Ok(Self::load_from(&Self::get_config_path()?)?.with_env())
    }

    /// Apply environment overrides. The result is for this run only and is
    /// never what gets saved.
    pub fn with_env(mut self) -> Self {
        if let Ok(endpoint) = std::env::var(ENDPOINT_ENV) {
            if !endpoint.trim().is_empty() {
                self.endpoint = endpoint;
            }
        }
        self
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config = serde_json::from_str(&config_content)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn reveal_interval(&self) -> Duration {
        Duration::from_millis(self.reveal_interval_ms.max(1))
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("tutor-chat").join("config.json"))
    }
}
