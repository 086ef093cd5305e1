//! Typed settings read from the merged config tree.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "https://invest-public-api.tbank.ru/rest/";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiSettings,
    pub db: DbSettings,
    pub cache: CacheSettings,
    pub log: LogSettings,
}

impl AppConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match AppConfig")
    }
}

/// Remote catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Env var NAME holding the bearer token.
    pub token_env: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 30,
            token_env: "TINKOFF_TOKEN".to_string(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    /// Env var NAME holding the Postgres URL. Unset var = memory-only cache.
    pub url_env: String,
    pub max_connections: u32,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url_env: "IMT_DATABASE_URL".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Deadline for one initialization attempt.
    pub init_timeout_secs: u64,
    /// Max rows read per category when loading from the store.
    pub store_read_limit: i64,
    /// Wait before a failed initialization may be retried. 0 disables retry.
    pub retry_backoff_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            init_timeout_secs: 60,
            store_read_limit: 5000,
            retry_backoff_secs: 30,
        }
    }
}

impl CacheSettings {
    pub fn init_timeout(&self) -> Duration {
        Duration::from_secs(self.init_timeout_secs)
    }

    /// `None` when retry after a total failure is disabled.
    pub fn retry_backoff(&self) -> Option<Duration> {
        match self.retry_backoff_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Fallback filter when RUST_LOG is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
