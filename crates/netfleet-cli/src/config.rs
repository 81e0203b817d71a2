//! `netfleet.toml` and inventory loading.
//!
//! ```toml
//! concurrency = 4
//! inactive_after_days = 7
//! inventory = "devices.json"
//!
//! [ssh]
//! username = "netops"
//! command_timeout_secs = 30
//!
//! [policy]
//! uplink = "UPLINK-"
//! spine = "TO-SPINE-"
//!
//! [[devices]]
//! name = "edge-switch-1"
//! host = "192.0.2.10"
//! role = "uplink"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use netfleet_core::{DeviceDescriptor, RemediationPolicy, DEFAULT_INACTIVE_AFTER_DAYS};
use netfleet_transport::SshConfig;

/// Looked up in the working directory when neither `--config` nor
/// `NETFLEET_CONFIG` is given.
pub const DEFAULT_CONFIG_FILE: &str = "netfleet.toml";

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub concurrency: usize,
    pub inactive_after_days: u32,
    pub ssh: SshConfig,
    pub policy: RemediationPolicy,
    pub devices: Vec<DeviceEntry>,
    /// Extra inventory file (TOML or JSON), relative to the config file.
    pub inventory: Option<PathBuf>,
}

impl Default for FleetConfig {
    fn default() -> Self {
        FleetConfig {
            concurrency: DEFAULT_CONCURRENCY,
            inactive_after_days: DEFAULT_INACTIVE_AFTER_DAYS,
            ssh: SshConfig::default(),
            policy: RemediationPolicy::default(),
            devices: Vec::new(),
            inventory: None,
        }
    }
}

/// Inventory row; `host` defaults to `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEntry {
    pub name: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl From<DeviceEntry> for DeviceDescriptor {
    fn from(entry: DeviceEntry) -> Self {
        let mut device = DeviceDescriptor::new(entry.name);
        if let Some(host) = entry.host {
            device.host = host;
        }
        device.port = entry.port;
        device.username = entry.username;
        device.platform = entry.platform;
        device.role = entry.role;
        device
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InventoryFile {
    Table { devices: Vec<DeviceEntry> },
    List(Vec<DeviceEntry>),
}

/// A loaded config plus the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FleetConfig,
    pub base_dir: PathBuf,
}

/// `explicit` (flag or `NETFLEET_CONFIG`), else `./netfleet.toml` if present.
pub fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}

/// Load the config at `path`, or defaults when there is none.
pub fn load(path: Option<&Path>) -> Result<LoadedConfig> {
    let Some(path) = path else {
        return Ok(LoadedConfig {
            config: FleetConfig::default(),
            base_dir: PathBuf::from("."),
        });
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: FleetConfig =
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(LoadedConfig { config, base_dir })
}

impl FleetConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be at least 1");
        }
        self.ssh.validate()
    }
}

impl LoadedConfig {
    /// Inline devices followed by the inventory file's, in file order.
    pub fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let mut entries = self.config.devices.clone();
        if let Some(inventory) = &self.config.inventory {
            entries.extend(load_inventory(&self.base_dir.join(inventory))?);
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                anyhow::bail!("device '{}' is listed more than once", entry.name);
            }
        }
        Ok(entries.into_iter().map(DeviceDescriptor::from).collect())
    }
}

pub fn load_inventory(path: &Path) -> Result<Vec<DeviceEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read inventory {}", path.display()))?;
    let parsed: InventoryFile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON inventory {}", path.display()))?,
        _ => toml::from_str(&raw)
            .with_context(|| format!("invalid TOML inventory {}", path.display()))?,
    };
    Ok(match parsed {
        InventoryFile::Table { devices } => devices,
        InventoryFile::List(devices) => devices,
    })
}
