//! # Persistence Module
//!
//! Loads and saves Fleetdeck's configuration: broker connection settings, the
//! last-used tenant, and the topic template catalog, stored as one TOML file
//! in the platform config directory.
//!
//! ## Error Handling Strategy
//!
//! Follows a fail-safe approach: a missing or unreadable configuration file
//! degrades to the built-in defaults (including the default fleet template
//! catalog) instead of preventing startup. `color_eyre` supplies the error
//! context for actual I/O failures on the save path, where silently dropping
//! the operator's catalog would be worse than an error.

use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::mqtt::config::MqttConfig;
use crate::topics::store::{default_fleet_templates, TopicTemplate};

const CONFIG_DIR: &str = "fleetdeck";
const CONFIG_FILE: &str = "fleetdeck.toml";

/// Top-level persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetdeckConfig {
    /// Tenant applied on startup, absent until the first login.
    #[serde(default)]
    pub tenant: Option<String>,
    #[serde(default)]
    pub broker: MqttConfig,
    /// Flat template catalog; order is significant (first wins on duplicate
    /// resolved topics).
    #[serde(default = "default_fleet_templates")]
    pub templates: Vec<TopicTemplate>,
}

impl Default for FleetdeckConfig {
    fn default() -> Self {
        Self {
            tenant: None,
            broker: MqttConfig::default(),
            templates: default_fleet_templates(),
        }
    }
}

fn config_file() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre!("no config directory on this platform"))?;
    Ok(base.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Loads configuration from an explicit path, degrading to defaults when the
/// file is missing or unreadable.
pub fn load_config_from(path: &Path) -> FleetdeckConfig {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            info!(
                "no configuration at {} ({}), starting with defaults",
                path.display(),
                e
            );
            return FleetdeckConfig::default();
        }
    };
    match toml::from_str(&raw) {
        Ok(config) => config,
        Err(e) => {
            warn!(
                "configuration at {} is unreadable ({}), falling back to defaults",
                path.display(),
                e
            );
            FleetdeckConfig::default()
        }
    }
}

/// Loads configuration from the default platform location.
pub fn load_config() -> Result<FleetdeckConfig> {
    Ok(load_config_from(&config_file()?))
}

/// Saves configuration to an explicit path, creating parent directories.
pub fn save_config_to(path: &Path, config: &FleetdeckConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("cannot create {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(config).wrap_err("cannot serialize configuration")?;
    fs::write(path, raw).wrap_err_with(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

/// Saves configuration to the default platform location.
pub fn save_config(config: &FleetdeckConfig) -> Result<()> {
    save_config_to(&config_file()?, config)
}
