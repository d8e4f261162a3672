use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub host: String,
    pub api_base_url: String,
    pub archive_base_url: String,
    pub token: Option<String>,
    pub user_agent: String,
}

fn default_user_agent() -> String {
    format!("tmplsync/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            host: "github.com".to_string(),
            api_base_url: "https://api.github.com".to_string(),
            archive_base_url: "https://codeload.github.com".to_string(),
            token: None,
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub retries: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            retries: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfig {
    pub forge: ForgeConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialSyncConfig {
    forge: Option<ForgeConfig>,
    network: Option<NetworkConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn env_or_optional(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn validate(cfg: &SyncConfig) -> Result<(), SyncError> {
    if cfg.forge.host.trim().is_empty() {
        return Err(SyncError::InvalidConfig(
            "forge host cannot be empty".to_string(),
        ));
    }
    for (name, url) in [
        ("forge api url", &cfg.forge.api_base_url),
        ("forge archive url", &cfg.forge.archive_base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SyncError::InvalidConfig(format!(
                "invalid {name} `{url}`: must start with http:// or https://"
            )));
        }
    }
    if cfg.network.connect_timeout_secs == 0 {
        return Err(SyncError::InvalidConfig(
            "invalid connect timeout: must be >= 1 second".to_string(),
        ));
    }
    if cfg.network.read_timeout_secs == 0 {
        return Err(SyncError::InvalidConfig(
            "invalid read timeout: must be >= 1 second".to_string(),
        ));
    }
    Ok(())
}

fn resolve_config_path(home: &Path) -> PathBuf {
    if let Ok(custom) = env::var("TMPLSYNC_CONFIG_PATH") {
        let trimmed = custom.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    home.join("config.toml")
}

fn merge_file_config(base: &mut SyncConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialSyncConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse tmplsync config {}: {err}", path.display()))?;
    if let Some(forge) = parsed.forge {
        base.forge = forge;
    }
    if let Some(network) = parsed.network {
        base.network = network;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut SyncConfig) {
    cfg.forge.host = env_or_string("TMPLSYNC_FORGE_HOST", &cfg.forge.host);
    cfg.forge.api_base_url = env_or_string("TMPLSYNC_FORGE_API_URL", &cfg.forge.api_base_url)
        .trim_end_matches('/')
        .to_string();
    cfg.forge.archive_base_url =
        env_or_string("TMPLSYNC_FORGE_ARCHIVE_URL", &cfg.forge.archive_base_url)
            .trim_end_matches('/')
            .to_string();
    cfg.forge.token = env_or_optional("TMPLSYNC_FORGE_TOKEN", cfg.forge.token.take());
    cfg.network.connect_timeout_secs = env_or_u64(
        "TMPLSYNC_CONNECT_TIMEOUT_SECS",
        cfg.network.connect_timeout_secs,
    );
    cfg.network.read_timeout_secs =
        env_or_u64("TMPLSYNC_READ_TIMEOUT_SECS", cfg.network.read_timeout_secs);
    cfg.network.retries = env_or_usize("TMPLSYNC_NETWORK_RETRIES", cfg.network.retries);
}

pub fn load_config(home: &Path) -> Result<SyncConfig> {
    let mut cfg = SyncConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(home))?;
    apply_env_overrides(&mut cfg);
    validate(&cfg)?;
    Ok(cfg)
}
