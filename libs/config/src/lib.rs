//! # Basin Configuration
//!
//! Configuration loading, logging setup and deployment bookkeeping for the
//! Basin V2 AMM.
//!
//! ## Features
//!
//! - **AMM Configuration**: governance, deployment and logging sections from
//!   TOML with `BASIN_*` environment overrides
//! - **Logging**: `tracing-subscriber` setup with `RUST_LOG` support
//! - **Address Book**: JSON record of deployed addresses per network
//!
//! ## Usage
//!
//! ```rust
//! use basin_config::{AmmConfig, DeploymentBook};
//!
//! let config = AmmConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let mut book = DeploymentBook::default();
//! book.record(&config.deployment.network, "Factory", config.deployment.factory_address);
//! assert!(book.address("localhost", "Factory").is_some());
//! ```

pub mod amm_config;
pub mod deployments;
pub mod logging;

pub use amm_config::{
    load_config, AmmConfig, DeploymentConfig, GovernanceConfig, LoggingConfig, ENV_PREFIX,
};
pub use deployments::DeploymentBook;
pub use logging::init_tracing;
