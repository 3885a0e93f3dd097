//! CLI configuration.

use anyhow::Result;
use leadscout_core::{ClientConfig, DiscoveryConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const API_URL_ENV: &str = "LEADSCOUT_API_URL";
pub const TOKEN_ENV: &str = "LEADSCOUT_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_preview_per_page")]
    pub preview_per_page: u32,
    #[serde(default = "default_history_per_page")]
    pub history_per_page: u32,
    #[serde(default = "default_notice_ttl_secs")]
    pub notice_ttl_secs: u64,
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

fn default_api_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_preview_per_page() -> u32 {
    20
}

fn default_history_per_page() -> u32 {
    100
}

fn default_notice_ttl_secs() -> u64 {
    5
}

fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leadscout")
        .join("state.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            preview_per_page: default_preview_per_page(),
            history_per_page: default_history_per_page(),
            notice_ttl_secs: default_notice_ttl_secs(),
            state_path: default_state_path(),
        }
    }
}

impl Config {
    /// Load config from a specific file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load config from config/default.toml if present, else defaults.
    pub fn load() -> Result<Self> {
        let config_path = PathBuf::from("config/default.toml");
        if config_path.exists() {
            return Self::load_from(&config_path);
        }
        Ok(Config::default())
    }

    /// Apply `LEADSCOUT_API_URL` and `LEADSCOUT_TOKEN`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(API_URL_ENV).ok(),
            std::env::var(TOKEN_ENV).ok(),
        );
    }

    /// Empty values are ignored.
    pub fn apply_overrides(&mut self, api_base_url: Option<String>, auth_token: Option<String>) {
        if let Some(url) = api_base_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(token) = auth_token.filter(|t| !t.trim().is_empty()) {
            self.auth_token = Some(token.trim().to_string());
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api_base_url.clone(),
            auth_token: self.auth_token.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(100)),
            preview_per_page: self.preview_per_page.max(1),
            history_per_page: self.history_per_page.max(1),
            notice_ttl: Duration::from_secs(self.notice_ttl_secs),
        }
    }
}
