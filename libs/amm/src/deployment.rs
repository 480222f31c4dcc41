//! Deployment bootstrap
//!
//! Builds a complete core (bank, wrapped native token, factory, router) from
//! an [`AmmConfig`] and records the resulting addresses in the deployment
//! address book.

use crate::clock::Clock;
use crate::events::EventBus;
use crate::factory::Factory;
use crate::router::Router;
use crate::token::TokenBank;
use anyhow::{Context, Result};
use basin_config::deployments::names;
use basin_config::{AmmConfig, DeploymentBook};
use std::sync::Arc;
use tracing::info;

/// A wired-up AMM core
#[derive(Debug)]
pub struct Deployment {
    pub events: EventBus,
    pub bank: Arc<TokenBank>,
    pub factory: Arc<Factory>,
    pub router: Arc<Router>,
}

impl Deployment {
    /// Construct every component at the configured addresses
    pub fn bootstrap(config: &AmmConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        let deployment = &config.deployment;
        let governance = &config.governance;

        let events = EventBus::new();
        let bank = Arc::new(TokenBank::new(events.clone()));
        bank.register_wrapped_native(
            deployment.wrapped_native_address,
            &deployment.wrapped_native_symbol,
        )
        .context("Failed to register wrapped native token")?;

        let factory = Arc::new(
            Factory::new(
                deployment.factory_address,
                governance.fee_to_setter,
                Arc::clone(&bank),
                clock,
            )
            .context("Failed to create factory")?,
        );
        if let Some(fee_to) = governance.fee_to {
            factory
                .set_fee_to(governance.fee_to_setter, fee_to)
                .context("Failed to enable protocol fee")?;
        }

        let router = Arc::new(
            Router::new(
                deployment.router_address,
                Arc::clone(&factory),
                deployment.wrapped_native_address,
            )
            .context("Failed to create router")?,
        );

        info!(
            network = %deployment.network,
            factory = ?factory.address(),
            router = ?router.address(),
            "AMM core deployed"
        );
        Ok(Self {
            events,
            bank,
            factory,
            router,
        })
    }

    /// Write this deployment's addresses under `network`
    pub fn record(&self, book: &mut DeploymentBook, network: &str, wrapped_native_symbol: &str) {
        book.record(network, names::FACTORY, self.factory.address());
        book.record(network, names::ROUTER, self.router.address());
        book.record(
            network,
            wrapped_native_symbol,
            self.router.wrapped_native(),
        );
    }

    /// Bootstrap and persist the addresses to the configured address book
    pub fn deploy(config: &AmmConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let deployment = Self::bootstrap(config, clock)?;

        let path = &config.deployment.address_book;
        let mut book = DeploymentBook::load(path)?;
        deployment.record(
            &mut book,
            &config.deployment.network,
            &config.deployment.wrapped_native_symbol,
        );
        book.save(path)?;

        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use basin_types::Address;
    use tempfile::tempdir;

    #[test]
    fn test_deploy_records_addresses() {
        let dir = tempdir().unwrap();
        let mut config = AmmConfig::default();
        config.deployment.address_book = dir.path().join("book").join("addresses.json");
        config.governance.fee_to = Some(Address::from_low_u64_be(0xFEE));

        let deployment = Deployment::deploy(&config, Arc::new(ManualClock::new(0))).unwrap();

        assert_eq!(deployment.factory.fee_to(), Address::from_low_u64_be(0xFEE));
        assert_eq!(
            deployment.factory.fee_to_setter(),
            config.governance.fee_to_setter
        );

        let book = DeploymentBook::load(&config.deployment.address_book).unwrap();
        assert_eq!(
            book.address("localhost", names::FACTORY),
            Some(config.deployment.factory_address)
        );
        assert_eq!(
            book.address("localhost", names::ROUTER),
            Some(config.deployment.router_address)
        );
        assert_eq!(
            book.address("localhost", "WETH"),
            Some(config.deployment.wrapped_native_address)
        );
    }

    #[test]
    fn test_bootstrap_rejects_invalid_config() {
        let mut config = AmmConfig::default();
        config.governance.fee_to_setter = Address::zero();

        assert!(Deployment::bootstrap(&config, Arc::new(ManualClock::new(0))).is_err());
    }
}
