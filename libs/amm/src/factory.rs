//! Factory: deterministic pair registry and protocol-fee governance
//!
//! Pairs are keyed by their canonical `(token0, token1)` order, so lookups in
//! either argument order resolve to the same entry. Creation runs under the
//! write lock of the append-only `all_pairs` list, which makes the
//! exists-check and the insertion one critical section.

use crate::clock::Clock;
use crate::events::EventBus;
use crate::pair::{Pair, PairContext};
use crate::pool_traits::ReserveSource;
use crate::token::TokenBank;
use basin_types::constants::{CREATE2_PREFIX, PAIR_INIT_CODE_HASH};
use basin_types::{keccak256, sort_tokens, Address, AddressExt, AmmError, AmmEvent, U256};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Protocol-fee governance addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    /// Recipient of protocol-fee shares; zero disables the fee
    pub fee_to: Address,
    /// Sole authority over `fee_to` and itself; zero once renounced
    pub fee_to_setter: Address,
}

/// Deterministic pair address for `factory` and the unordered token set
///
/// `keccak256(0xff ‖ factory ‖ keccak256(token0 ‖ token1) ‖ init_code_hash)[12..]`
pub fn pair_for(factory: Address, token_a: Address, token_b: Address) -> Result<Address, AmmError> {
    let (token0, token1) = sort_tokens(token_a, token_b)?;
    let salt = keccak256(&[token0.as_bytes(), token1.as_bytes()]);
    let hash = keccak256(&[
        &[CREATE2_PREFIX][..],
        factory.as_bytes(),
        &salt[..],
        &PAIR_INIT_CODE_HASH[..],
    ]);
    Ok(Address::from_slice(&hash[12..]))
}

pub struct Factory {
    address: Address,
    pairs: DashMap<(Address, Address), Arc<Pair>>,
    by_address: DashMap<Address, Arc<Pair>>,
    all_pairs: RwLock<Vec<Address>>,
    governance: Arc<RwLock<Governance>>,
    ctx: PairContext,
}

impl Factory {
    pub fn new(
        address: Address,
        fee_to_setter: Address,
        bank: Arc<TokenBank>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AmmError> {
        let address = address.ensure_non_zero()?;
        let governance = Arc::new(RwLock::new(Governance {
            fee_to: Address::zero(),
            fee_to_setter,
        }));
        let events = bank.events().clone();

        Ok(Self {
            address,
            pairs: DashMap::new(),
            by_address: DashMap::new(),
            all_pairs: RwLock::new(Vec::new()),
            governance: Arc::clone(&governance),
            ctx: PairContext {
                bank,
                governance,
                clock,
                events,
            },
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bank(&self) -> &Arc<TokenBank> {
        &self.ctx.bank
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.ctx.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    /// Register a new pair for the unordered token set
    pub fn create_pair(&self, token_a: Address, token_b: Address) -> Result<Address, AmmError> {
        let (token0, token1) = sort_tokens(token_a, token_b)?;

        let mut all_pairs = self.all_pairs.write();
        if self.pairs.contains_key(&(token0, token1)) {
            return Err(AmmError::PairExists { token0, token1 });
        }

        let address = pair_for(self.address, token0, token1)?;
        let pair = Arc::new(Pair::new(
            address,
            self.address,
            token0,
            token1,
            self.ctx.clone(),
        ));
        self.pairs.insert((token0, token1), Arc::clone(&pair));
        self.by_address.insert(address, pair);
        all_pairs.push(address);
        let index = all_pairs.len();
        drop(all_pairs);

        info!(?token0, ?token1, pair = ?address, index, "Pair created");
        self.ctx.events.emit(AmmEvent::PairCreated {
            token0,
            token1,
            pair: address,
            index,
        });
        Ok(address)
    }

    /// Pair address for the token set, in either order
    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<Address> {
        self.pair_for_tokens(token_a, token_b).map(|pair| pair.address())
    }

    /// Live pair handle for the token set, in either order
    pub fn pair_for_tokens(&self, token_a: Address, token_b: Address) -> Option<Arc<Pair>> {
        let key = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        self.pairs.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Like [`Self::pair_for_tokens`] but absent pairs are an error
    pub fn require_pair(&self, token_a: Address, token_b: Address) -> Result<Arc<Pair>, AmmError> {
        self.pair_for_tokens(token_a, token_b)
            .ok_or(AmmError::PairNotExists { token_a, token_b })
    }

    /// Live pair handle by pair address
    pub fn pair(&self, address: Address) -> Option<Arc<Pair>> {
        self.by_address.get(&address).map(|entry| Arc::clone(entry.value()))
    }

    pub fn all_pairs_length(&self) -> usize {
        self.all_pairs.read().len()
    }

    pub fn all_pairs(&self, index: usize) -> Result<Address, AmmError> {
        let all_pairs = self.all_pairs.read();
        all_pairs
            .get(index)
            .copied()
            .ok_or(AmmError::IndexOutOfBounds {
                index,
                len: all_pairs.len(),
            })
    }

    pub fn fee_to(&self) -> Address {
        self.governance.read().fee_to
    }

    pub fn fee_to_setter(&self) -> Address {
        self.governance.read().fee_to_setter
    }

    pub fn governance(&self) -> Governance {
        *self.governance.read()
    }

    fn authorize(governance: &Governance, caller: Address) -> Result<(), AmmError> {
        if governance.fee_to_setter.is_zero() || caller != governance.fee_to_setter {
            return Err(AmmError::Forbidden { caller });
        }
        Ok(())
    }

    /// Set the protocol-fee recipient; zero turns the fee off
    pub fn set_fee_to(&self, caller: Address, fee_to: Address) -> Result<(), AmmError> {
        let mut governance = self.governance.write();
        Self::authorize(&governance, caller)?;
        governance.fee_to = fee_to;
        info!(?fee_to, enabled = !fee_to.is_zero(), "Protocol fee recipient updated");
        Ok(())
    }

    /// Hand governance to a new non-zero address
    pub fn set_fee_to_setter(&self, caller: Address, fee_to_setter: Address) -> Result<(), AmmError> {
        let fee_to_setter = fee_to_setter.ensure_non_zero()?;
        let mut governance = self.governance.write();
        Self::authorize(&governance, caller)?;
        governance.fee_to_setter = fee_to_setter;
        info!(?fee_to_setter, "Fee setter transferred");
        Ok(())
    }

    /// Give up governance permanently; `fee_to` can never change afterwards
    pub fn renounce_fee_to_setter(&self, caller: Address) -> Result<(), AmmError> {
        let mut governance = self.governance.write();
        Self::authorize(&governance, caller)?;
        governance.fee_to_setter = Address::zero();
        warn!(?caller, fee_to = ?governance.fee_to, "Fee setter renounced, governance is now frozen");
        Ok(())
    }
}

impl ReserveSource for Factory {
    fn reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256), AmmError> {
        let pair = self.require_pair(token_a, token_b)?;
        let reserves = pair.get_reserves();
        if token_a == pair.token0() {
            Ok((reserves.reserve0, reserves.reserve1))
        } else {
            Ok((reserves.reserve1, reserves.reserve0))
        }
    }
}

impl std::fmt::Debug for Factory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Factory")
            .field("address", &self.address)
            .field("pairs", &self.all_pairs_length())
            .field("governance", &self.governance())
            .finish()
    }
}
