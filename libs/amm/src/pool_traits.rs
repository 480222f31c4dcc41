//! Pool trait definitions for path math and reserve resolution

use crate::V2Math;
use basin_types::{Address, AmmError, U256};

/// Reserves of one hop, oriented from the input token to the output token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopReserves {
    pub reserve_in: U256,
    pub reserve_out: U256,
}

/// Unified pricing interface for a single constant-product hop
pub trait AmmPool {
    /// Calculate output amount for given input
    fn get_amount_out(&self, amount_in: U256) -> Result<U256, AmmError>;

    /// Calculate required input for desired output
    fn get_amount_in(&self, amount_out: U256) -> Result<U256, AmmError>;

    /// Get current reserves as (in, out)
    fn get_liquidity(&self) -> (U256, U256);
}

impl AmmPool for HopReserves {
    fn get_amount_out(&self, amount_in: U256) -> Result<U256, AmmError> {
        V2Math::get_amount_out(amount_in, self.reserve_in, self.reserve_out)
    }

    fn get_amount_in(&self, amount_out: U256) -> Result<U256, AmmError> {
        V2Math::get_amount_in(amount_out, self.reserve_in, self.reserve_out)
    }

    fn get_liquidity(&self) -> (U256, U256) {
        (self.reserve_in, self.reserve_out)
    }
}

/// Source of pair reserves for multi-hop path walking
///
/// Implemented by the factory (each lookup locks the pair briefly) and by a
/// router's locked path (reserves read through already-held guards).
pub trait ReserveSource {
    /// Reserves of the `(token_a, token_b)` pair, oriented to argument order.
    ///
    /// Fails with [`AmmError::PairNotExists`] when no pair is registered.
    fn reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256), AmmError>;

    /// Reserves for a hop from `token_in` to `token_out`
    fn hop(&self, token_in: Address, token_out: Address) -> Result<HopReserves, AmmError> {
        let (reserve_in, reserve_out) = self.reserves(token_in, token_out)?;
        Ok(HopReserves {
            reserve_in,
            reserve_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_reserves_price_both_directions() {
        let hop = HopReserves {
            reserve_in: U256::from(1000),
            reserve_out: U256::from(2000),
        };

        assert_eq!(hop.get_amount_out(U256::from(100)).unwrap(), U256::from(181));
        assert_eq!(hop.get_amount_in(U256::from(181)).unwrap(), U256::from(100));
        assert_eq!(hop.get_liquidity(), (U256::from(1000), U256::from(2000)));
    }
}
