//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`api.token_env`, `db.url_env`). The
//! binary calls [`resolve_secrets`] once at startup and passes the result into
//! constructors. `Debug` redacts values and errors name the variable, never
//! its contents.

use anyhow::{anyhow, Result};
use serde_json::Value;

#[derive(Clone)]
pub struct ResolvedSecrets {
    pub api_token_var: String,
    /// Catalog API bearer token. `None` if the named env var was absent or empty.
    pub api_token: Option<String>,
    pub database_url_var: String,
    /// Postgres URL. `None` means the cache runs without a store.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("api_token_var", &self.api_token_var)
            .field("api_token", &self.api_token.as_ref().map(|_| "<REDACTED>"))
            .field("database_url_var", &self.database_url_var)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// Token for commands that must reach the remote API.
    pub fn require_api_token(&self) -> Result<&str> {
        self.api_token.as_deref().ok_or_else(|| {
            anyhow!(
                "SECRETS_MISSING: required env var '{}' (catalog api token) is not set or empty",
                self.api_token_var
            )
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            anyhow!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.database_url_var
            )
        })
    }
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret the config names. Missing values are not an error
/// here; callers decide which ones they need.
pub fn resolve_secrets(config_json: &Value) -> ResolvedSecrets {
    let api_token_var =
        read_str_at(config_json, "/api/token_env").unwrap_or_else(|| "TINKOFF_TOKEN".to_string());
    let database_url_var =
        read_str_at(config_json, "/db/url_env").unwrap_or_else(|| "IMT_DATABASE_URL".to_string());

    ResolvedSecrets {
        api_token: resolve_env(&api_token_var),
        api_token_var,
        database_url: resolve_env(&database_url_var),
        database_url_var,
    }
}
