//! AMM Configuration Module
//!
//! Loads governance, deployment and logging settings from a base TOML file,
//! an optional environment overlay and `BASIN_*` environment variables.

use anyhow::{bail, Context, Result};
use basin_types::Address;
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of environment variable overrides (`BASIN_LOGGING__LEVEL=debug`)
pub const ENV_PREFIX: &str = "BASIN";

/// Main AMM configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AmmConfig {
    pub governance: GovernanceConfig,
    pub deployment: DeploymentConfig,
    pub logging: LoggingConfig,
}

/// Protocol-fee governance
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Initial fee setter; must not be zero
    pub fee_to_setter: Address,
    /// Protocol fee recipient to enable at deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_to: Option<Address>,
}

/// Where the core is deployed and where its addresses are recorded
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeploymentConfig {
    pub network: String,
    pub factory_address: Address,
    pub router_address: Address,
    pub wrapped_native_address: Address,
    pub wrapped_native_symbol: String,
    /// JSON address book, `$VAR`/`~` expanded
    pub address_book: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            fee_to_setter: Address::from_low_u64_be(0xDE),
            fee_to: None,
        }
    }
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            factory_address: Address::from_low_u64_be(0xF1),
            router_address: Address::from_low_u64_be(0xF2),
            wrapped_native_address: Address::from_low_u64_be(0xF3),
            wrapped_native_symbol: "WETH".to_string(),
            address_book: PathBuf::from("./deployments/addresses.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AmmConfig {
    /// Load configuration from files with environment overrides
    ///
    /// The overlay for `environment` is looked up at
    /// `<base dir>/environments/<environment>.toml`.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        Self::load_with_prefix(base_path, environment, ENV_PREFIX)
    }

    /// [`Self::load`] with a custom environment variable prefix
    pub fn load_with_prefix(
        base_path: Option<&Path>,
        environment: Option<&str>,
        env_prefix: &str,
    ) -> Result<Self> {
        let base = base_path.unwrap_or(Path::new("config/amm.toml"));

        let mut builder = Config::builder().add_source(File::from(base).required(true));

        if let Some(env) = environment {
            let env_file = base
                .parent()
                .unwrap_or(Path::new("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;
        let mut config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate()?;
        debug!(network = %config.deployment.network, "Configuration loaded");
        Ok(config)
    }

    /// Expand environment variables in path values
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let raw = self.deployment.address_book.to_string_lossy().into_owned();
        let expanded = shellexpand::full(&raw).context("Failed to expand address book path")?;
        self.deployment.address_book = PathBuf::from(expanded.as_ref());
        Ok(())
    }

    /// Reject settings the core would refuse at deployment
    pub fn validate(&self) -> Result<()> {
        if self.governance.fee_to_setter.is_zero() {
            bail!("governance.fee_to_setter must not be the zero address");
        }

        let deployment = &self.deployment;
        let addresses = [
            ("factory_address", deployment.factory_address),
            ("router_address", deployment.router_address),
            ("wrapped_native_address", deployment.wrapped_native_address),
        ];
        for (i, (name, address)) in addresses.iter().enumerate() {
            if address.is_zero() {
                bail!("deployment.{} must not be the zero address", name);
            }
            for (other, other_address) in &addresses[i + 1..] {
                if address == other_address {
                    bail!("deployment.{} and deployment.{} are identical", name, other);
                }
            }
        }

        if deployment.network.trim().is_empty() {
            bail!("deployment.network must not be empty");
        }
        Ok(())
    }

    /// Render as TOML, e.g. to seed a config file
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<&str>) -> Result<AmmConfig> {
    AmmConfig::load(None, environment)
}
