//! Deployment address book
//!
//! JSON keyed by network name, mapping logical contract names to addresses:
//! `{"localhost": {"Factory": "0x…", "Router": "0x…", "WETH": "0x…"}}`.

use anyhow::{Context, Result};
use basin_types::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Logical contract names
pub mod names {
    pub const FACTORY: &str = "Factory";
    pub const ROUTER: &str = "Router";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentBook {
    networks: BTreeMap<String, BTreeMap<String, Address>>,
}

impl DeploymentBook {
    /// Read the book at `path`; a missing file is an empty book
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Address book {:?} not found, starting empty", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read address book {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse address book {:?}", path))
    }

    /// Write pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize address book")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write address book {:?}", path))?;

        info!("Saved address book to {:?}", path);
        Ok(())
    }

    /// Set `name` on `network`, returning the address it replaced
    pub fn record(&mut self, network: &str, name: &str, address: Address) -> Option<Address> {
        self.networks
            .entry(network.to_string())
            .or_default()
            .insert(name.to_string(), address)
    }

    pub fn address(&self, network: &str, name: &str) -> Option<Address> {
        self.networks.get(network)?.get(name).copied()
    }

    pub fn network(&self, network: &str) -> Option<&BTreeMap<String, Address>> {
        self.networks.get(network)
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }
}
