//! CLI configuration

use runwatch_common::{Error, Result};
use runwatch_monitor::PollConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the status endpoint lives and how to poll it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Base URL of the execution service
    pub base_url: String,

    /// Path template for one execution's status; `{id}` is replaced
    pub status_path: String,

    /// Per-request timeout in seconds, 0 disables it
    pub request_timeout_secs: u64,

    pub poll: PollConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            status_path: "/api/executions/{id}".to_string(),
            request_timeout_secs: 30,
            poll: PollConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from file, falling back to defaults when it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::InvalidConfig("base_url must not be empty".to_string()));
        }
        if !self.status_path.contains("{id}") {
            return Err(Error::InvalidConfig(format!(
                "status_path must contain {{id}}: {}",
                self.status_path
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".runwatch")
        .join("config.toml")
}
