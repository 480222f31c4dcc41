//! Address and amount primitives
//!
//! Addresses are 20-byte identifiers compared byte-wise, which gives the
//! canonical `token0 < token1` ordering used by every pair. Amounts are
//! 256-bit so that reserve products never silently overflow.

use crate::AmmError;
use sha3::{Digest, Keccak256};

pub use ethereum_types::{H160 as Address, U256};

/// Convenience checks on [`Address`]
pub trait AddressExt: Sized {
    /// Reject the zero address
    fn ensure_non_zero(self) -> Result<Self, AmmError>;
}

impl AddressExt for Address {
    fn ensure_non_zero(self) -> Result<Self, AmmError> {
        if self.is_zero() {
            Err(AmmError::ZeroAddress)
        } else {
            Ok(self)
        }
    }
}

/// Order two token addresses canonically.
///
/// Fails with [`AmmError::IdenticalAddresses`] when both are equal and with
/// [`AmmError::ZeroAddress`] when the smaller one is zero (the larger one can
/// never be zero once they differ).
pub fn sort_tokens(token_a: Address, token_b: Address) -> Result<(Address, Address), AmmError> {
    if token_a == token_b {
        return Err(AmmError::IdenticalAddresses);
    }
    let (token0, token1) = if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    };
    token0.ensure_non_zero()?;
    Ok((token0, token1))
}

/// Keccak-256 digest of the concatenated parts
pub fn keccak256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
