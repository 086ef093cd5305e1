//! Command handler modules for imt-cli.
//!
//! Shared bootstrap lives here; command-specific logic lives in the submodules.

pub mod catalog;
pub mod db;

use anyhow::{Context, Result};
use imt_config::secrets::{resolve_secrets, ResolvedSecrets};
use imt_config::AppConfig;
use serde::Serialize;
use std::path::Path;

/// Used when no `--config` is given and the file exists.
pub const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

/// Everything a command needs from the environment, resolved once.
pub struct AppContext {
    pub config_hash: String,
    pub settings: AppConfig,
    pub secrets: ResolvedSecrets,
}

pub fn load_context(config_paths: &[String]) -> Result<AppContext> {
    let mut paths: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    if paths.is_empty() && Path::new(DEFAULT_CONFIG_PATH).exists() {
        paths.push(DEFAULT_CONFIG_PATH);
    }

    // No file at all: an empty tree, so every setting takes its default.
    let loaded = imt_config::load_layered_yaml(&paths)?;
    let settings = loaded.settings()?;
    Ok(AppContext {
        secrets: resolve_secrets(&loaded.config_json),
        config_hash: loaded.config_hash,
        settings,
    })
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("serialize command output")?;
    println!("{s}");
    Ok(())
}
