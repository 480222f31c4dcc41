//! Multi-hop amount propagation
//!
//! Walks a token path against any [`ReserveSource`]: the factory for
//! read-only quotes, or a router's locked path so quotes and execution see
//! the same reserves.

use crate::pool_traits::{AmmPool, ReserveSource};
use basin_types::{Address, AmmError, U256};

fn ensure_path(path: &[Address]) -> Result<(), AmmError> {
    if path.len() < 2 {
        return Err(AmmError::InvalidPath);
    }
    Ok(())
}

/// Amounts along `path` for an exact input; `amounts[0] == amount_in`
pub fn get_amounts_out<S: ReserveSource + ?Sized>(
    source: &S,
    amount_in: U256,
    path: &[Address],
) -> Result<Vec<U256>, AmmError> {
    ensure_path(path)?;

    let mut amounts = Vec::with_capacity(path.len());
    amounts.push(amount_in);
    for hop in path.windows(2) {
        let pool = source.hop(hop[0], hop[1])?;
        let next = pool.get_amount_out(amounts[amounts.len() - 1])?;
        amounts.push(next);
    }
    Ok(amounts)
}

/// Amounts along `path` for an exact output; `amounts[last] == amount_out`
pub fn get_amounts_in<S: ReserveSource + ?Sized>(
    source: &S,
    amount_out: U256,
    path: &[Address],
) -> Result<Vec<U256>, AmmError> {
    ensure_path(path)?;

    let mut amounts = vec![U256::zero(); path.len()];
    amounts[path.len() - 1] = amount_out;
    for i in (1..path.len()).rev() {
        let pool = source.hop(path[i - 1], path[i])?;
        amounts[i - 1] = pool.get_amount_in(amounts[i])?;
    }
    Ok(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Fixed reserves keyed by ordered token pair
    struct StaticReserves(HashMap<(Address, Address), (U256, U256)>);

    impl StaticReserves {
        fn new(pools: &[(u64, u64, u64, u64)]) -> Self {
            let mut map = HashMap::new();
            for &(a, b, ra, rb) in pools {
                let (a, b) = (addr(a), addr(b));
                map.insert((a, b), (units(ra), units(rb)));
                map.insert((b, a), (units(rb), units(ra)));
            }
            Self(map)
        }
    }

    impl ReserveSource for StaticReserves {
        fn reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256), AmmError> {
            self.0
                .get(&(token_a, token_b))
                .copied()
                .ok_or(AmmError::PairNotExists { token_a, token_b })
        }
    }

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::exp10(18)
    }

    fn between(value: U256, low: u64, high: u64) -> bool {
        value > units(low) && value < units(high)
    }

    #[test]
    fn test_three_hop_amounts_out() {
        // A->B 1:2, B->C 2:1, C->W 1:1
        let source = StaticReserves::new(&[
            (1, 2, 1_000, 2_000),
            (2, 3, 2_000, 1_000),
            (3, 4, 1_000, 1_000),
        ]);
        let path = [addr(1), addr(2), addr(3), addr(4)];

        let amounts = get_amounts_out(&source, units(10), &path).unwrap();

        assert_eq!(amounts.len(), 4);
        assert_eq!(amounts[0], units(10));
        assert!(between(amounts[1], 19, 20));
        assert!(between(amounts[2], 9, 10));
        assert!(between(amounts[3], 9, 10));
    }

    #[test]
    fn test_amounts_in_cover_amounts_out() {
        let source = StaticReserves::new(&[(1, 2, 1_000, 2_000), (2, 3, 500, 800)]);
        let path = [addr(1), addr(2), addr(3)];

        let amounts_in = get_amounts_in(&source, units(5), &path).unwrap();
        assert_eq!(amounts_in[2], units(5));

        let amounts_out = get_amounts_out(&source, amounts_in[0], &path).unwrap();
        assert!(amounts_out[2] >= units(5));
    }

    #[test]
    fn test_path_validation() {
        let source = StaticReserves::new(&[(1, 2, 10, 10)]);

        assert_eq!(
            get_amounts_out(&source, units(1), &[addr(1)]),
            Err(AmmError::InvalidPath)
        );
        assert_eq!(
            get_amounts_in(&source, units(1), &[]),
            Err(AmmError::InvalidPath)
        );
        assert_eq!(
            get_amounts_out(&source, units(1), &[addr(1), addr(3)]),
            Err(AmmError::PairNotExists {
                token_a: addr(1),
                token_b: addr(3)
            })
        );
    }
}
