//! Daemon configuration: loading and validation.
//!
//! The configuration file is YAML with two top-level sections: `logging`
//! and `interfaces`. Each interface entry selects exactly one mode:
//!
//! ```yaml
//! logging:
//!   level: info
//!   format: text
//!
//! interfaces:
//!   eth0:
//!     dhcp: true
//!   eth1:
//!     static:
//!       ip: 192.168.1.100
//!       netmask: 255.255.255.0
//!       gateway: 192.168.1.1
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Logging section: level and output format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: String,
    /// One of `text`, `json` or `compact`.
    #[serde(default)]
    pub format: String,
}

/// Static address block for one interface.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticConfig {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: Option<String>,
}

/// Per-interface policy: exactly one of DHCP or static.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    #[serde(default)]
    pub dhcp: bool,
    #[serde(default, rename = "static")]
    pub static_: Option<StaticConfig>,
}

/// The main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LogConfig,
    #[serde(default)]
    pub interfaces: HashMap<String, InterfaceConfig>,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Validate the policy set.
    ///
    /// Rejects an empty interface map, entries that select both or neither
    /// mode, static entries missing required fields, and more than one
    /// static default gateway across the file (two engines competing for
    /// the default route would oscillate).
    pub fn validate(&self) -> Result<()> {
        if self.interfaces.is_empty() {
            bail!("no interfaces configured");
        }

        let mut static_gateways = 0usize;
        for (name, iface) in &self.interfaces {
            if !iface.dhcp && iface.static_.is_none() {
                bail!(
                    "interface {}: must specify either dhcp or static configuration",
                    name
                );
            }
            if iface.dhcp && iface.static_.is_some() {
                bail!(
                    "interface {}: cannot specify both dhcp and static configuration",
                    name
                );
            }
            if let Some(static_config) = &iface.static_ {
                if static_config.ip.is_empty() {
                    bail!("interface {}: static IP address is required", name);
                }
                if static_config.netmask.is_empty() {
                    bail!("interface {}: static netmask is required", name);
                }
                if static_config
                    .gateway
                    .as_deref()
                    .is_some_and(|gw| !gw.is_empty())
                {
                    static_gateways += 1;
                }
            }
        }

        if static_gateways > 1 {
            bail!("at most one interface may configure a static default gateway");
        }

        Ok(())
    }
}
