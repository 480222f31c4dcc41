//! # Basin AMM - Constant-Product Exchange Core
//!
//! ## Purpose
//!
//! Uniswap-V2-style automated market maker: a [`Factory`] registry mapping
//! each unordered token set to exactly one [`Pair`], per-pair constant-product
//! reserve ledgers that mint and burn LP shares, and a [`Router`] that
//! computes optimal amounts, chains multi-hop swaps and enforces caller
//! deadlines and slippage bounds.
//!
//! ## Integration Points
//!
//! - **Host Ledger**: [`TokenBank`] holds token balances, allowances and
//!   native value; pairs observe their own balances through it
//! - **Time**: an injected [`Clock`] supplies block timestamps for deadlines
//! - **Events**: [`EventBus`] subscribers receive `Sync`/`Mint`/`Burn`/`Swap`/
//!   `Transfer` notifications over crossbeam channels
//! - **Deployment**: [`Deployment`] wires everything from a
//!   [`basin_config::AmmConfig`] and records addresses in the address book
//!
//! ## Architecture Role
//!
//! ```text
//! caller ──▶ Router ──▶ Factory ──▶ Pair (per-pair mutex)
//!              │                      │
//!              └──────▶ TokenBank ◀───┘
//! ```
//!
//! ## Precision
//!
//! - **Integer Only**: all math is `U256` with checked arithmetic
//! - **Rounding**: truncating division everywhere, `get_amount_in` rounds up
//! - **Bounds**: reserves never exceed `2^112 - 1`
//!
//! ## Atomicity
//!
//! Every operation validates completely before its first mutation. Router
//! calls hold all involved pair locks (ascending address order) from the
//! first quote to the last transfer.

pub mod clock;
pub mod deployment;
pub mod events;
pub mod factory;
pub mod library;
pub mod pair;
pub mod pool_traits;
pub mod router;
pub mod token;
pub mod v2_math;

pub use clock::{Clock, ManualClock, SystemClock};
pub use deployment::Deployment;
pub use events::EventBus;
pub use factory::{pair_for, Factory, Governance};
pub use library::{get_amounts_in, get_amounts_out};
pub use pair::{Pair, PairGuard, Reserves};
pub use pool_traits::{AmmPool, HopReserves, ReserveSource};
pub use router::Router;
pub use token::{Movement, TokenBank, TokenKind, TokenLedger, TokenMetadata};
pub use v2_math::V2Math;

pub use basin_types::{Address, AmmError, AmmEvent, ErrorKind, U256};
