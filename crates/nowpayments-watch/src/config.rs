/*
[INPUT]:  YAML configuration file, NOWPAYMENTS_API_KEY environment override
[OUTPUT]: Parsed watcher configuration and adapter client configs
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding new configuration options
*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use nowpayments_adapter::constants::{API_BASE_URL, SANDBOX_API_BASE_URL, SANDBOX_WS_URL, WS_URL};
use nowpayments_adapter::{ClientConfig, ReconnectConfig, RetryConfig, WebSocketConfig};

/// Environment variable that overrides `api_key` from the file
pub const API_KEY_ENV: &str = "NOWPAYMENTS_API_KEY";

/// Top-level configuration for the watcher
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WatchConfig {
    /// API key; may be left out and supplied through the environment
    #[serde(default)]
    pub api_key: Option<String>,
    /// Use the sandbox endpoints
    #[serde(default)]
    pub sandbox: bool,
    /// Override the REST base URL
    #[serde(default)]
    pub base_url: Option<String>,
    /// Override the WebSocket URL
    #[serde(default)]
    pub ws_url: Option<String>,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub websocket: WebSocketSettings,
    /// Payment ids watched when none are given on the command line
    #[serde(default)]
    pub payments: Vec<String>,
}

/// REST timeouts and retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_ms(),
            retry_max_delay_ms: default_retry_max_ms(),
        }
    }
}

/// WebSocket handshake, heartbeat and reconnect policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSocketSettings {
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// 0 disables the heartbeat
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default = "default_reconnect_jitter_ms")]
    pub reconnect_max_jitter_ms: u64,
    /// Unlimited when absent
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: default_handshake_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            reconnect_base_delay_ms: default_reconnect_base_ms(),
            reconnect_max_delay_ms: default_reconnect_max_ms(),
            reconnect_max_jitter_ms: default_reconnect_jitter_ms(),
            max_reconnect_attempts: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_max_ms() -> u64 {
    8_000
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_reconnect_jitter_ms() -> u64 {
    1_000
}

impl WatchConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// `<config dir>/nowpayments-watch/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("nowpayments-watch").join("config.yaml"))
    }

    /// Explicit paths must exist; the default path is optional
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Prefer a non-empty key from the environment over the file
    pub fn with_api_key_override(mut self, env_value: Option<String>) -> Self {
        if let Some(key) = env_value.filter(|key| !key.trim().is_empty()) {
            self.api_key = Some(key);
        }
        self
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("no API key: set `api_key` in the config file or {API_KEY_ENV}"))
    }

    pub fn client_config(&self) -> Result<ClientConfig> {
        let default_url = if self.sandbox {
            SANDBOX_API_BASE_URL
        } else {
            API_BASE_URL
        };
        Ok(ClientConfig {
            api_key: self.api_key()?.to_string(),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| default_url.to_string()),
            timeout: Duration::from_secs(self.http.timeout_secs),
            retry: RetryConfig {
                max_attempts: self.http.max_attempts,
                base_delay: Duration::from_millis(self.http.retry_base_delay_ms),
                max_delay: Duration::from_millis(self.http.retry_max_delay_ms),
            },
            ..ClientConfig::default()
        })
    }

    pub fn websocket_config(&self) -> Result<WebSocketConfig> {
        let default_url = if self.sandbox { SANDBOX_WS_URL } else { WS_URL };
        let ws = &self.websocket;
        Ok(WebSocketConfig {
            url: self.ws_url.clone().unwrap_or_else(|| default_url.to_string()),
            api_key: self.api_key()?.to_string(),
            handshake_timeout: Duration::from_secs(ws.handshake_timeout_secs),
            ping_interval: (ws.ping_interval_secs > 0)
                .then(|| Duration::from_secs(ws.ping_interval_secs)),
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(ws.reconnect_base_delay_ms),
                max_delay: Duration::from_millis(ws.reconnect_max_delay_ms),
                max_jitter: Duration::from_millis(ws.reconnect_max_jitter_ms),
                max_attempts: ws.max_reconnect_attempts,
            },
        })
    }
}
