//! Common Test Utilities for the AMM core
//!
//! Provides a deployed core driven by a manual clock, funded traders and
//! unit helpers shared by all integration suites.

#![allow(dead_code)]

use basin_amm::{Address, Clock, Deployment, ManualClock, Pair, U256};
use basin_config::logging::env_filter;
use basin_config::{AmmConfig, LoggingConfig};
use std::sync::Arc;

pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const TOKEN_A: u64 = 0x0A;
pub const TOKEN_B: u64 = 0x0B;
pub const TOKEN_C: u64 = 0x0C;
pub const TOKEN_D: u64 = 0x0D;

/// Captured test output at the configured filter, `RUST_LOG` wins if set
pub fn init_tracing() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        json: false,
    };
    if let Ok(filter) = env_filter(&config) {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(filter)
            .try_init();
    }
}

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

/// `n` whole tokens at 18 decimals
pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn alice() -> Address {
    addr(0xA11CE)
}

pub fn bob() -> Address {
    addr(0xB0B)
}

pub fn carol() -> Address {
    addr(0xCA201)
}

pub fn fee_recipient() -> Address {
    addr(0xFEE)
}

/// Whether `value` lies strictly between `low` and `high` whole units
pub fn strictly_between(value: U256, low: u64, high: u64) -> bool {
    value > units(low) && value < units(high)
}

pub struct Harness {
    pub config: AmmConfig,
    pub clock: Arc<ManualClock>,
    pub core: Deployment,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let config = AmmConfig::default();
        let clock = Arc::new(ManualClock::new(GENESIS_TIME));
        let core = Deployment::bootstrap(&config, clock.clone()).unwrap();
        Self {
            config,
            clock,
            core,
        }
    }

    /// Harness with tokens A-D registered and every trader funded and approved
    pub fn with_tokens() -> Self {
        let harness = Self::new();
        for (n, symbol) in [
            (TOKEN_A, "TKA"),
            (TOKEN_B, "TKB"),
            (TOKEN_C, "TKC"),
            (TOKEN_D, "TKD"),
        ] {
            harness.token(n, symbol);
        }
        for trader in [alice(), bob(), carol()] {
            harness.fund(trader);
        }
        harness
    }

    pub fn token(&self, n: u64, symbol: &str) -> Address {
        let token = addr(n);
        self.core.bank.register_token(token, symbol, 18).unwrap();
        token
    }

    /// Issue every standard token and native value to `trader`, approving the router
    pub fn fund(&self, trader: Address) {
        let bank = &self.core.bank;
        for n in [TOKEN_A, TOKEN_B, TOKEN_C, TOKEN_D] {
            let token = addr(n);
            if bank.is_registered(token) {
                bank.issue(token, trader, units(1_000_000)).unwrap();
                bank.approve(token, trader, self.router(), U256::MAX).unwrap();
            }
        }
        bank.credit_native(trader, units(100_000)).unwrap();
        bank.approve(self.weth(), trader, self.router(), U256::MAX)
            .unwrap();
    }

    pub fn router(&self) -> Address {
        self.core.router.address()
    }

    pub fn weth(&self) -> Address {
        self.core.router.wrapped_native()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn deadline(&self) -> u64 {
        self.now() + 600
    }

    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.core.bank.balance_of(token, holder).unwrap()
    }

    pub fn native(&self, holder: Address) -> U256 {
        self.core.bank.native_balance_of(holder)
    }

    pub fn pair(&self, token_a: Address, token_b: Address) -> Arc<Pair> {
        self.core
            .factory
            .pair_for_tokens(token_a, token_b)
            .unwrap()
    }

    /// Seed a pool from alice at the given whole-unit amounts
    pub fn seed(&self, token_a: Address, token_b: Address, amount_a: u64, amount_b: u64) -> U256 {
        let (_, _, liquidity) = self
            .core
            .router
            .add_liquidity(
                alice(),
                token_a,
                token_b,
                units(amount_a),
                units(amount_b),
                U256::zero(),
                U256::zero(),
                alice(),
                self.deadline(),
            )
            .unwrap();
        liquidity
    }

    /// Product of a pair's tracked reserves
    pub fn k(&self, token_a: Address, token_b: Address) -> U256 {
        let reserves = self.pair(token_a, token_b).get_reserves();
        reserves.reserve0 * reserves.reserve1
    }
}
