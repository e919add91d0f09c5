use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use transcript_relay::backend::DEFAULT_BACKEND_URL;
use transcript_relay::analytics::DEFAULT_API_BASE;
use transcript_relay::TransferMode;

#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    pub backend: BackendConfig,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub analytics: Option<AnalyticsConfig>,
}

#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
    /// Sent as `X-Extension-Id` so the backend knows who is calling.
    pub extension_id: String,
}

#[derive(Debug, Deserialize)]
pub struct RelaySettings {
    #[serde(default)]
    pub transfer: TransferMode,
    #[serde(default)]
    pub forward_audio: bool,
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            transfer: TransferMode::default(),
            forward_audio: false,
            result_ttl_secs: default_result_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RelaySettings {
    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    pub api_key: String,
    #[serde(default = "default_api_base")]
    pub base_url: String,
}

fn default_backend_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_result_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    32
}

fn default_store_path() -> String {
    "./data/results".to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl ConfigFile {
    pub fn load(path: &str) -> Result<Self> {
        let content =
            fs::read_to_string(path).context(format!("Failed to read config file: {}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.extension_id.trim().is_empty() {
            anyhow::bail!("[backend] extension_id must not be empty");
        }
        if self.backend.url.trim().is_empty() {
            anyhow::bail!("[backend] url must not be empty");
        }
        if self.relay.result_ttl_secs == 0 {
            anyhow::bail!("[relay] result_ttl_secs must be greater than 0");
        }
        if self.relay.sweep_interval_secs == 0 {
            anyhow::bail!("[relay] sweep_interval_secs must be greater than 0");
        }
        if self.relay.channel_capacity == 0 {
            anyhow::bail!("[relay] channel_capacity must be greater than 0");
        }
        if self.store.kind == StoreKind::File && self.store.path.trim().is_empty() {
            anyhow::bail!("[store] path is required for the file store");
        }
        if let Some(analytics) = &self.analytics {
            if analytics.api_key.trim().is_empty() {
                anyhow::bail!("[analytics] api_key must not be empty");
            }
        }
        Ok(())
    }
}
