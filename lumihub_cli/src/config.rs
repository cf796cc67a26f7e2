//! Configuration management for the LumiHub CLI

use anyhow::{Context, Result};
use directories::ProjectDirs;
use lumihub_core::HubConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// A per-gateway shared secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceKey {
    /// Gateway address
    pub ip: String,
    /// 16-character shared secret from the companion app
    pub key: String,
}

/// LumiHub CLI configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Local port for inbound reports (protocol default 9898 when unset)
    #[serde(default)]
    pub port: Option<u16>,

    /// Local interface address for the multicast membership
    #[serde(default)]
    pub bind: Option<String>,

    /// Default shared secret for command-key derivation
    #[serde(default)]
    pub key: Option<String>,

    /// Per-gateway secrets overriding the default
    #[serde(default)]
    pub keys: Vec<DeviceKey>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "lumihub", "lumihub")
            .context("Could not determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Load config from file, or return default if not exists
    pub fn load() -> Result<Self> {
        let path = Self::path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Config =
            serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }

    /// Set or replace the per-gateway secret for `ip`
    pub fn set_device_key(&mut self, ip: &str, key: &str) {
        if let Some(entry) = self.keys.iter_mut().find(|k| k.ip == ip) {
            entry.key = key.to_string();
        } else {
            self.keys.push(DeviceKey {
                ip: ip.to_string(),
                key: key.to_string(),
            });
        }
    }

    /// Remove the per-gateway secret for `ip`; returns whether one existed
    pub fn remove_device_key(&mut self, ip: &str) -> bool {
        let len_before = self.keys.len();
        self.keys.retain(|k| k.ip != ip);
        self.keys.len() < len_before
    }

    /// Build a [`HubConfig`] from this file plus CLI overrides
    pub fn hub_config(&self, port: Option<u16>, browse: bool) -> Result<HubConfig> {
        let mut hub = HubConfig {
            port: port
                .or(self.port)
                .unwrap_or(lumihub_core::DEFAULT_PORT),
            key: self.key.clone(),
            browse,
            ..HubConfig::default()
        };

        if let Some(bind) = &self.bind {
            hub.bind = Some(
                bind.parse()
                    .with_context(|| format!("Invalid bind address: {bind}"))?,
            );
        }

        for entry in &self.keys {
            let ip = entry
                .ip
                .parse()
                .with_context(|| format!("Invalid gateway address: {}", entry.ip))?;
            hub.keys.insert(ip, entry.key.clone());
        }

        Ok(hub)
    }
}
