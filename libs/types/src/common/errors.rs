//! Error taxonomy for factory, pair, router and token-ledger operations
//!
//! Every failure aborts the whole operation and leaves state untouched.
//! Variants carry enough context for a collaborator to explain the failure
//! and, for bound violations, to recompute parameters for a fresh attempt.

use crate::{Address, U256};
use thiserror::Error;

/// Broad classification used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: fix the arguments
    Validation,
    /// Pool or ledger state does not allow the operation
    State,
    /// A caller-supplied deadline or slippage bound was violated
    Bound,
    /// Caller lacks the governance capability
    Authorization,
}

/// Errors raised by the AMM core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    #[error("Zero address is not allowed")]
    ZeroAddress,

    #[error("Token addresses are identical")]
    IdenticalAddresses,

    #[error("Pair already exists for ({token0:?}, {token1:?})")]
    PairExists { token0: Address, token1: Address },

    #[error("No pair exists for ({token_a:?}, {token_b:?})")]
    PairNotExists { token_a: Address, token_b: Address },

    #[error("Index {index} out of bounds for {len} pairs")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Caller {caller:?} is not the fee setter")]
    Forbidden { caller: Address },

    #[error("Deadline {deadline} expired at {now}")]
    DeadlineExpired { deadline: u64, now: u64 },

    #[error("Invalid swap path")]
    InvalidPath,

    #[error("Recipient cannot be one of the pair tokens")]
    InvalidTo,

    #[error("Insufficient amount")]
    InsufficientAmount,

    #[error("Insufficient input amount")]
    InsufficientInputAmount,

    #[error("Insufficient output amount")]
    InsufficientOutputAmount,

    #[error("Insufficient A amount: {amount} below minimum {minimum}")]
    InsufficientAAmount { amount: U256, minimum: U256 },

    #[error("Insufficient B amount: {amount} below minimum {minimum}")]
    InsufficientBAmount { amount: U256, minimum: U256 },

    #[error("Excessive input amount: {amount} above maximum {maximum}")]
    ExcessiveInputAmount { amount: U256, maximum: U256 },

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient liquidity minted")]
    InsufficientLiquidityMinted,

    #[error("Insufficient liquidity burned")]
    InsufficientLiquidityBurned,

    #[error("Constant product invariant violated")]
    K,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Unknown token {0:?}")]
    UnknownToken(Address),

    #[error("Token {0:?} is already registered")]
    TokenExists(Address),

    #[error("Token {0:?} does not wrap the native asset")]
    NotWrappedNative(Address),

    #[error("Insufficient balance of {token:?} for {holder:?}: have {available}, need {required}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        available: U256,
        required: U256,
    },

    #[error("Insufficient allowance of {token:?} for spender {spender:?}: have {available}, need {required}")]
    InsufficientAllowance {
        token: Address,
        spender: Address,
        available: U256,
        required: U256,
    },
}

impl AmmError {
    /// Classify the failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            AmmError::ZeroAddress
            | AmmError::IdenticalAddresses
            | AmmError::InvalidPath
            | AmmError::InvalidTo
            | AmmError::InsufficientAmount
            | AmmError::InsufficientInputAmount
            | AmmError::InsufficientOutputAmount
            | AmmError::IndexOutOfBounds { .. } => ErrorKind::Validation,

            AmmError::DeadlineExpired { .. }
            | AmmError::InsufficientAAmount { .. }
            | AmmError::InsufficientBAmount { .. }
            | AmmError::ExcessiveInputAmount { .. } => ErrorKind::Bound,

            AmmError::Forbidden { .. } => ErrorKind::Authorization,

            AmmError::PairExists { .. }
            | AmmError::PairNotExists { .. }
            | AmmError::InsufficientLiquidity
            | AmmError::InsufficientLiquidityMinted
            | AmmError::InsufficientLiquidityBurned
            | AmmError::K
            | AmmError::Overflow
            | AmmError::UnknownToken(_)
            | AmmError::TokenExists(_)
            | AmmError::NotWrappedNative(_)
            | AmmError::InsufficientBalance { .. }
            | AmmError::InsufficientAllowance { .. } => ErrorKind::State,
        }
    }

    /// Whether the caller may succeed by retrying with new bounds.
    ///
    /// Only bound violations qualify; the core itself never retries.
    pub fn is_bound_violation(&self) -> bool {
        self.kind() == ErrorKind::Bound
    }
}
