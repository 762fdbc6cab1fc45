// netconnection/src/config.rs
use crate::context::Messages;
use anyhow::{anyhow, Context as _, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONNECT_TIMEOUT_ENV: &str = "NETCONNECTION_CONNECT_TIMEOUT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Connection establishment timeout for the shared transport
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Report statuses outside 200/201/401/403/404 through `on_failure`
    /// instead of dropping them
    #[serde(default = "default_report_unhandled_status")]
    pub report_unhandled_status: bool,
    #[serde(default)]
    pub messages: Messages,
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_report_unhandled_status() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            report_unhandled_status: default_report_unhandled_status(),
            messages: Messages::default(),
        }
    }
}

impl Config {
    /// Read `<config dir>/netconnection/config.toml`, falling back to defaults
    /// when it does not exist. Nothing is written.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_or_default(&Self::config_dir()?.join("config.toml"))?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            Self::from_path(config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(timeout) = lookup(CONNECT_TIMEOUT_ENV) {
            self.connect_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", CONNECT_TIMEOUT_ENV))?;
        }
        Ok(())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    fn config_dir() -> Result<PathBuf> {
        let base_dirs =
            BaseDirs::new().ok_or_else(|| anyhow!("Cannot determine config directory"))?;
        Ok(base_dirs.config_dir().join("netconnection"))
    }
}
