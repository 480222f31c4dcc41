//! Protocol constants
//!
//! Fee tier, liquidity floor and reserve bounds shared by the pair engine and
//! the router math. Changing any of these changes every quote.

use crate::{keccak256, U256};
use once_cell::sync::Lazy;

/// LP shares locked forever at the zero address on the first deposit
pub const MINIMUM_LIQUIDITY: u64 = 1_000;

/// Fee-adjusted input multiplier (0.3% fee tier)
pub const FEE_NUMERATOR: u64 = 997;

/// Denominator for all fee arithmetic
pub const FEE_DENOMINATOR: u64 = 1_000;

/// Per-mille fee taken from swap inputs in the invariant check
pub const SWAP_FEE_PER_MILLE: u64 = FEE_DENOMINATOR - FEE_NUMERATOR;

/// Protocol takes 1/(PROTOCOL_FEE_DIVISOR + 1) of fee growth when enabled
pub const PROTOCOL_FEE_DIVISOR: u64 = 5;

/// Largest reserve a pair may record (2^112 - 1)
pub const MAX_RESERVE: U256 = U256([u64::MAX, 0x0000_FFFF_FFFF_FFFF, 0, 0]);

/// LP share token metadata
pub mod lp {
    pub const NAME: &str = "Basin V2";
    pub const SYMBOL: &str = "BASIN-V2";
    pub const DECIMALS: u8 = 18;
}

/// Prefix byte of the deterministic deployment address preimage
pub const CREATE2_PREFIX: u8 = 0xff;

/// Hash identifying the pair "bytecode" in deterministic addresses
pub static PAIR_INIT_CODE_HASH: Lazy<[u8; 32]> = Lazy::new(|| keccak256(&[b"BasinV2Pair"]));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_reserve_is_2_pow_112_minus_1() {
        let expected = (U256::one() << 112) - U256::one();
        assert_eq!(MAX_RESERVE, expected);
    }

    #[test]
    fn test_fee_constants_consistent() {
        assert_eq!(SWAP_FEE_PER_MILLE, 3);
        assert_eq!(FEE_NUMERATOR + SWAP_FEE_PER_MILLE, FEE_DENOMINATOR);
    }
}
