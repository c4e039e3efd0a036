use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use tenderhub_lifecycle::LifecyclePolicy;
use tenderhub_reputation::BlacklistPolicy;

/// Top-level configuration for the tenderhub server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Address the HTTP server listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Seconds between deadline sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Emit logs as JSON lines instead of text.
    #[serde(default)]
    pub json_logs: bool,

    /// Fees, windows and blacklist thresholds.
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// The `[policy]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(flatten)]
    pub lifecycle: LifecyclePolicy,

    #[serde(default = "default_blacklist_threshold")]
    pub blacklist_threshold: usize,

    #[serde(default = "default_blacklist_days")]
    pub blacklist_days: i64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_blacklist_threshold() -> usize {
    2
}

fn default_blacklist_days() -> i64 {
    365
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            sweep_interval_secs: default_sweep_interval_secs(),
            json_logs: false,
            policy: PolicyConfig::default(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecyclePolicy::default(),
            blacklist_threshold: default_blacklist_threshold(),
            blacklist_days: default_blacklist_days(),
        }
    }
}

impl PolicyConfig {
    pub fn blacklist(&self) -> BlacklistPolicy {
        BlacklistPolicy {
            threshold: self.blacklist_threshold,
            days: self.blacklist_days,
        }
    }
}

impl MarketConfig {
    /// Load config from disk. Returns default if not found.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk using atomic write (.tmp → rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        let tmp_path = path.with_extension("toml.tmp");
        std::fs::write(&tmp_path, content).context("Failed to write temp config file")?;
        std::fs::rename(&tmp_path, path).context("Failed to rename temp config file")?;
        Ok(())
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}
