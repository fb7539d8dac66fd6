use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::AppError;
use crate::feed::endpoint::{DeploymentEndpoint, EndpointResolver, FixedEndpoint};
use crate::view::{HighlightScheme, RankingPolicy, ViewConfig};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    #[serde(default)]
    pub buffer: BufferConfig,
    #[serde(default)]
    pub view: ViewSection,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Full endpoint; when set, the deployment fields below are ignored.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub secure: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewSection {
    #[serde(default = "default_per_symbol_cap")]
    pub per_symbol_cap: usize,
    #[serde(default = "default_recency_window_secs")]
    pub recency_window_secs: u64,
    #[serde(default)]
    pub ranking_policy: RankingPolicy,
    #[serde(default)]
    pub highlight_scheme: HighlightScheme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_refresh_rate_ms")]
    pub refresh_rate_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    3_000
}

fn default_history_capacity() -> usize {
    200
}

fn default_per_symbol_cap() -> usize {
    5
}

fn default_recency_window_secs() -> u64 {
    60
}

fn default_refresh_rate_ms() -> u64 {
    100
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("data/stockfeed.sqlite")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
        }
    }
}

impl Default for ViewSection {
    fn default() -> Self {
        Self {
            per_symbol_cap: default_per_symbol_cap(),
            recency_window_secs: default_recency_window_secs(),
            ranking_policy: RankingPolicy::default(),
            highlight_scheme: HighlightScheme::default(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_ms: default_refresh_rate_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FeedConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn resolver(&self) -> Arc<dyn EndpointResolver> {
        match self.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => Arc::new(FixedEndpoint(url.to_string())),
            None => Arc::new(DeploymentEndpoint {
                secure: self.secure,
                host: self.host.clone(),
                path: self.path.clone(),
            }),
        }
    }
}

impl ViewSection {
    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            per_symbol_cap: self.per_symbol_cap,
            recency_window: Duration::from_secs(self.recency_window_secs),
            ranking: self.ranking_policy,
            highlight: self.highlight_scheme,
        }
    }
}

/// Check that `raw` is an absolute `ws://` or `wss://` URL with a host.
pub fn validate_ws_url(raw: &str) -> Result<url::Url, AppError> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AppError::Config(format!("invalid feed url '{}': {}", raw, e)))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(AppError::Config(format!(
            "invalid feed url '{}': scheme must be ws or wss",
            raw
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::Config(format!("invalid feed url '{}': missing host", raw)));
    }
    Ok(parsed)
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = std::env::var("STOCKFEED_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = Self::load_from_path(&config_path)?;

        if let Ok(url) = std::env::var("STOCKFEED_WS_URL") {
            config.feed.url = Some(url);
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.buffer.history_capacity == 0 {
            return Err(AppError::Config("buffer.history_capacity must be > 0".into()));
        }
        if self.view.per_symbol_cap == 0 {
            return Err(AppError::Config("view.per_symbol_cap must be > 0".into()));
        }
        if self.view.per_symbol_cap > self.buffer.history_capacity {
            return Err(AppError::Config(format!(
                "view.per_symbol_cap ({}) must not exceed buffer.history_capacity ({})",
                self.view.per_symbol_cap, self.buffer.history_capacity
            )));
        }
        if self.feed.reconnect_delay_ms == 0 {
            return Err(AppError::Config("feed.reconnect_delay_ms must be > 0".into()));
        }
        if self.view.recency_window_secs == 0 {
            return Err(AppError::Config("view.recency_window_secs must be > 0".into()));
        }
        if self.feed.url.is_none() && self.feed.host.trim().is_empty() {
            return Err(AppError::Config(
                "feed.url or feed.host must be configured".into(),
            ));
        }
        validate_ws_url(&self.feed.resolver().resolve())?;
        Ok(())
    }
}
