//! Server configuration, loaded from YAML at startup

use crate::config_template::expand_yaml_template;
use anyhow::{Context, Result};
use bridge::{BridgeConfig, WarehouseConfig};
use gate::{Credentials, SessionConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Overrides `credentials.password`
pub const PASSWORD_ENV: &str = "SLUICE_PASSWORD";
/// Overrides `session.secret`
pub const SECRET_ENV: &str = "SLUICE_SESSION_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct SluiceConfig {
    /// Listen address (default: 127.0.0.1:8080)
    #[serde(default = "default_listen")]
    pub listen: String,

    pub credentials: Credentials,

    pub session: SessionConfig,

    /// Largest accepted request body (default: 32 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Served under /static when set
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    #[serde(flatten)]
    pub bridge: BridgeConfig,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_max_upload_bytes() -> usize {
    32 * 1024 * 1024
}

/// Load a YAML config file: expand templates, parse, apply environment
/// overrides, validate
pub fn load_config<P: AsRef<Path>>(
    path: P,
    variables: &HashMap<String, String>,
) -> Result<SluiceConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    let expanded = expand_yaml_template(&content, variables)?;

    let mut config = parse_config(&expanded)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<SluiceConfig> {
    serde_yaml_ng::from_str(content).with_context(|| "Failed to parse YAML configuration")
}

/// Replace secrets with values from the environment, when present
pub fn apply_overrides(config: &mut SluiceConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.is_empty()) {
        config.credentials.password = password;
    }
    if let Some(secret) = lookup(SECRET_ENV).filter(|v| !v.is_empty()) {
        config.session.secret = secret;
    }
}

pub fn validate_config(config: &SluiceConfig) -> Result<()> {
    config
        .listen
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid listen address '{}'", config.listen))?;

    if config.credentials.username.is_empty() {
        anyhow::bail!("credentials.username cannot be empty");
    }
    if config.credentials.password.is_empty() {
        anyhow::bail!("credentials.password cannot be empty (set it or {PASSWORD_ENV})");
    }

    config.session.validate()?;

    if config.max_upload_bytes == 0 {
        anyhow::bail!("max_upload_bytes must be greater than 0");
    }

    config
        .bridge
        .csv
        .validate()
        .map_err(anyhow::Error::msg)?;

    if config.bridge.blob_store.url.is_empty() {
        anyhow::bail!("blob_store.url cannot be empty");
    }

    match &config.bridge.warehouse {
        WarehouseConfig::Delta(delta) => {
            delta.validate().map_err(anyhow::Error::msg)?;
        }
        WarehouseConfig::Bigquery(bq)
            if bq.project.is_empty() || bq.dataset.is_empty() || bq.table.is_empty() =>
        {
            anyhow::bail!("warehouse project, dataset and table are all required");
        }
        _ => {}
    }

    Ok(())
}
