//! # Basin Types
//!
//! Shared vocabulary for the Basin V2 AMM workspace: 20-byte addresses,
//! 256-bit amounts, protocol constants, the error taxonomy every core
//! operation reports through, and the change-notification events that
//! collaborators subscribe to.
//!
//! ## Design Philosophy
//!
//! - **Integer Only**: every amount, reserve and supply is a [`U256`]; no
//!   floating point anywhere in the core
//! - **One Error Enum**: [`AmmError`] names each failure once, grouped into
//!   four kinds (validation, state, bound, authorization)
//! - **Serializable Events**: [`AmmEvent`] derives `serde` so dashboards and
//!   indexers can persist or forward them unchanged
//!
//! ## Quick Start
//!
//! ```rust
//! use basin_types::{sort_tokens, Address, AmmError};
//!
//! let a = Address::from_low_u64_be(2);
//! let b = Address::from_low_u64_be(1);
//! let (token0, token1) = sort_tokens(a, b).unwrap();
//! assert!(token0 < token1);
//!
//! assert_eq!(sort_tokens(a, a), Err(AmmError::IdenticalAddresses));
//! ```

pub mod common;
pub mod protocol;

pub use common::errors::{AmmError, ErrorKind};
pub use common::primitives::{keccak256, sort_tokens, Address, AddressExt, U256};
pub use protocol::constants;
pub use protocol::events::AmmEvent;
