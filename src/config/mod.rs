//! Configuration management for the PNL feed.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Exchange API credentials and transport settings
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Snapshot aggregation settings
    #[serde(default)]
    pub portfolio: PortfolioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key (access key) for authentication
    #[serde(default)]
    pub api_key: String,
    /// Secret key for signing requests
    #[serde(default)]
    pub secret_key: String,
    /// Futures REST endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Signature validity window in seconds, sent as `Recv-Window`
    #[serde(default = "default_recv_window_secs")]
    pub recv_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    /// Settlement currency whose balance anchors equity
    #[serde(default = "default_settle_currency")]
    pub settle_currency: String,
    /// Orders requested per history page (exchange maximum is 100)
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    /// Upper bound on history pages fetched per snapshot
    #[serde(default = "default_history_max_pages")]
    pub history_max_pages: u32,
    /// How far back closed trades are considered (exchange maximum is 90)
    #[serde(default = "default_history_lookback_days")]
    pub history_lookback_days: u32,
}

// Default value functions
fn default_base_url() -> String {
    "https://contract.mexc.com".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_recv_window_secs() -> u64 {
    10
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_settle_currency() -> String {
    "USDT".to_string()
}

fn default_history_page_size() -> u32 {
    100
}

fn default_history_max_pages() -> u32 {
    5
}

fn default_history_lookback_days() -> u32 {
    30
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("PNL"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.exchange.api_key.is_empty() && !self.exchange.secret_key.is_empty(),
            "exchange.api_key and exchange.secret_key must be set"
        );

        anyhow::ensure!(
            self.exchange.timeout_secs > 0,
            "exchange.timeout_secs must be greater than 0"
        );

        anyhow::ensure!(
            (1..=100).contains(&self.portfolio.history_page_size),
            "history_page_size must be between 1 and 100"
        );

        anyhow::ensure!(
            self.portfolio.history_max_pages >= 1,
            "history_max_pages must be at least 1"
        );

        anyhow::ensure!(
            (1..=90).contains(&self.portfolio.history_lookback_days),
            "history_lookback_days must be between 1 and 90"
        );

        Ok(())
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            recv_window_secs: default_recv_window_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            settle_currency: default_settle_currency(),
            history_page_size: default_history_page_size(),
            history_max_pages: default_history_max_pages(),
            history_lookback_days: default_history_lookback_days(),
        }
    }
}
