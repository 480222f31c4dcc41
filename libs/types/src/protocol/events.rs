//! Change-notification events
//!
//! Emitted after every successful state mutation so that frontends and
//! indexers can refresh cached reserves and balances without polling.

use crate::{Address, U256};
use serde::{Deserialize, Serialize};

/// Observable event emitted by the factory, pairs and token ledgers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum AmmEvent {
    PairCreated {
        token0: Address,
        token1: Address,
        pair: Address,
        /// `allPairsLength` after insertion
        index: usize,
    },
    Sync {
        pair: Address,
        reserve0: U256,
        reserve1: U256,
    },
    Mint {
        pair: Address,
        sender: Address,
        amount0: U256,
        amount1: U256,
    },
    Burn {
        pair: Address,
        sender: Address,
        amount0: U256,
        amount1: U256,
        to: Address,
    },
    Swap {
        pair: Address,
        sender: Address,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    },
    /// Fungible movement; `token` is the pair address for LP shares
    Transfer {
        token: Address,
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        token: Address,
        owner: Address,
        spender: Address,
        value: U256,
    },
    /// Native asset wrapped into `token`
    Deposit {
        token: Address,
        owner: Address,
        value: U256,
    },
    /// `token` unwrapped back into the native asset
    Withdrawal {
        token: Address,
        owner: Address,
        value: U256,
    },
}

impl AmmEvent {
    /// Address of the pair that emitted this event, if any
    pub fn pair(&self) -> Option<Address> {
        match self {
            AmmEvent::PairCreated { pair, .. }
            | AmmEvent::Sync { pair, .. }
            | AmmEvent::Mint { pair, .. }
            | AmmEvent::Burn { pair, .. }
            | AmmEvent::Swap { pair, .. } => Some(*pair),
            _ => None,
        }
    }
}
