//! Constant-Product Property Tests
//!
//! Mathematical properties that must hold for any reserves and trade size:
//! quotes bracket each other, swaps never shrink `k`, and deposits mint
//! shares in proportion to the smaller contribution.

mod common;

use basin_amm::{V2Math, U256};
use common::*;
use proptest::prelude::*;

prop_compose! {
    fn valid_reserves()
        (reserve_in in 1_000u64..1_000_000_000_000u64,
         reserve_out in 1_000u64..1_000_000_000_000u64) -> (U256, U256) {
        (U256::from(reserve_in), U256::from(reserve_out))
    }
}

prop_compose! {
    /// Whole-unit pool sizes for end-to-end runs
    fn pool_sizes()
        (amount_a in 10u64..50_000u64, amount_b in 10u64..50_000u64) -> (u64, u64) {
        (amount_a, amount_b)
    }
}

proptest! {
    #[test]
    fn amount_in_buys_at_least_requested_output(
        (reserve_in, reserve_out) in valid_reserves(),
        fraction in 1u64..1_000u64,
    ) {
        // Any output strictly below the reserve
        let amount_out = (reserve_out * U256::from(fraction) / U256::from(1_000u64)).max(U256::one());
        prop_assume!(amount_out < reserve_out);

        let amount_in = V2Math::get_amount_in(amount_out, reserve_in, reserve_out).unwrap();
        let received = V2Math::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        prop_assert!(received >= amount_out);
    }

    #[test]
    fn amount_in_never_exceeds_original_input_plus_rounding(
        (reserve_in, reserve_out) in valid_reserves(),
        amount_in in 1u64..10_000_000_000_000u64,
    ) {
        let amount_in = U256::from(amount_in);
        let amount_out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        prop_assume!(!amount_out.is_zero());

        let required = V2Math::get_amount_in(amount_out, reserve_in, reserve_out).unwrap();
        prop_assert!(required <= amount_in + U256::one());
    }

    #[test]
    fn amount_out_is_below_reserve_and_monotonic(
        (reserve_in, reserve_out) in valid_reserves(),
        amount_in in 1u64..1_000_000_000_000_000u64,
    ) {
        let amount_in = U256::from(amount_in);
        let out = V2Math::get_amount_out(amount_in, reserve_in, reserve_out).unwrap();
        let out_more = V2Math::get_amount_out(amount_in * U256::from(2u64), reserve_in, reserve_out).unwrap();
        prop_assert!(out < reserve_out);
        prop_assert!(out_more >= out);
    }

    #[test]
    fn sqrt_is_floor_root(value in any::<u128>()) {
        let value = U256::from(value);
        let root = V2Math::sqrt(value);
        prop_assert!(root * root <= value);
        prop_assert!((root + U256::one()) * (root + U256::one()) > value);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn swaps_never_decrease_k(
        (amount_a, amount_b) in pool_sizes(),
        trades in prop::collection::vec((1u64..5_000u64, any::<bool>()), 1..8),
    ) {
        let h = Harness::with_tokens();
        let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
        h.seed(a, b, amount_a, amount_b);

        for (size, forward) in trades {
            let k_before = h.k(a, b);
            let path = if forward { [a, b] } else { [b, a] };
            // Trades that round to zero output are rejected without effect
            let _ = h.core.router.swap_exact_tokens_for_tokens(
                bob(),
                units(size),
                U256::zero(),
                &path,
                bob(),
                h.deadline(),
            );
            prop_assert!(h.k(a, b) >= k_before);
        }

        let pair = h.pair(a, b);
        let reserves = pair.get_reserves();
        prop_assert_eq!(reserves.reserve0, h.balance(pair.token0(), pair.address()));
        prop_assert_eq!(reserves.reserve1, h.balance(pair.token1(), pair.address()));
    }

    #[test]
    fn deposits_mint_proportional_shares(
        (amount_a, amount_b) in pool_sizes(),
        (desired_a, desired_b) in pool_sizes(),
    ) {
        let h = Harness::with_tokens();
        let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
        h.seed(a, b, amount_a, amount_b);
        let pair = h.pair(a, b);
        let supply = pair.total_supply();
        let (reserve_a, reserve_b) = h.core.router.get_reserves(a, b).unwrap();

        let (used_a, used_b, liquidity) = h
            .core
            .router
            .add_liquidity(
                bob(),
                a,
                b,
                units(desired_a),
                units(desired_b),
                U256::zero(),
                U256::zero(),
                bob(),
                h.deadline(),
            )
            .unwrap();

        prop_assert!(used_a <= units(desired_a));
        prop_assert!(used_b <= units(desired_b));
        let expected = (used_a * supply / reserve_a).min(used_b * supply / reserve_b);
        prop_assert_eq!(liquidity, expected);
        prop_assert_eq!(pair.balance_of(bob()), liquidity);
    }

    #[test]
    fn withdrawing_fresh_shares_returns_no_more_than_deposited(
        (amount_a, amount_b) in pool_sizes(),
        (desired_a, desired_b) in pool_sizes(),
    ) {
        let h = Harness::with_tokens();
        let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
        h.seed(a, b, amount_a, amount_b);
        h.pair(a, b).approve(bob(), h.router(), U256::MAX);

        let (used_a, used_b, liquidity) = h
            .core
            .router
            .add_liquidity(
                bob(),
                a,
                b,
                units(desired_a),
                units(desired_b),
                U256::zero(),
                U256::zero(),
                bob(),
                h.deadline(),
            )
            .unwrap();
        let (out_a, out_b) = h
            .core
            .router
            .remove_liquidity(
                bob(),
                a,
                b,
                liquidity,
                U256::zero(),
                U256::zero(),
                bob(),
                h.deadline(),
            )
            .unwrap();

        prop_assert!(out_a <= used_a);
        prop_assert!(out_b <= used_b);
    }
}
