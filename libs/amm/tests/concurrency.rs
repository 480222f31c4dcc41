//! Concurrent access to shared pairs
//!
//! Traders hammer overlapping pools from scoped threads; afterwards every
//! pair's reserves must match its bank balances and `k` must not have shrunk.

mod common;

use basin_amm::{Address, AmmError, U256};
use common::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

const ROUNDS: usize = 50;

fn assert_reserves_match_balances(h: &Harness, token_a: Address, token_b: Address) {
    let pair = h.pair(token_a, token_b);
    let reserves = pair.get_reserves();
    assert_eq!(reserves.reserve0, h.balance(pair.token0(), pair.address()));
    assert_eq!(reserves.reserve1, h.balance(pair.token1(), pair.address()));
}

#[test]
fn concurrent_swaps_on_one_pair_preserve_invariants() {
    let h = Harness::with_tokens();
    let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
    h.seed(a, b, 10_000, 10_000);
    let k_before = h.k(a, b);

    thread::scope(|s| {
        for (trader, forward) in [(alice(), true), (bob(), false), (carol(), true)] {
            let h = &h;
            s.spawn(move || {
                let path = if forward { [a, b] } else { [b, a] };
                for _ in 0..ROUNDS {
                    h.core
                        .router
                        .swap_exact_tokens_for_tokens(
                            trader,
                            units(3),
                            U256::zero(),
                            &path,
                            trader,
                            h.deadline(),
                        )
                        .unwrap();
                }
            });
        }
    });

    assert_reserves_match_balances(&h, a, b);
    assert!(h.k(a, b) >= k_before);
    assert_eq!(h.balance(b, bob()), units(1_000_000) - units(3 * ROUNDS as u64));
    assert!(h.balance(a, bob()) > units(1_000_000));
}

#[test]
fn opposite_multi_hop_routes_do_not_deadlock() {
    let h = Harness::with_tokens();
    let (a, b, c, d) = (addr(TOKEN_A), addr(TOKEN_B), addr(TOKEN_C), addr(TOKEN_D));
    h.seed(a, b, 5_000, 5_000);
    h.seed(b, c, 5_000, 5_000);
    h.seed(c, d, 5_000, 5_000);
    let k_before = [h.k(a, b), h.k(b, c), h.k(c, d)];

    thread::scope(|s| {
        for (trader, path) in [(bob(), [a, b, c, d]), (carol(), [d, c, b, a])] {
            let h = &h;
            s.spawn(move || {
                for _ in 0..ROUNDS {
                    h.core
                        .router
                        .swap_exact_tokens_for_tokens(
                            trader,
                            units(2),
                            U256::zero(),
                            &path,
                            trader,
                            h.deadline(),
                        )
                        .unwrap();
                }
            });
        }
    });

    for (i, (x, y)) in [(a, b), (b, c), (c, d)].into_iter().enumerate() {
        assert_reserves_match_balances(&h, x, y);
        assert!(h.k(x, y) >= k_before[i]);
    }
    // Intermediate hops never leave balances behind
    assert_eq!(h.balance(b, bob()), units(1_000_000));
    assert_eq!(h.balance(c, carol()), units(1_000_000));
}

#[test]
fn liquidity_and_swaps_interleave_safely() {
    let h = Harness::with_tokens();
    let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
    h.seed(a, b, 1_000, 1_000);
    let pair = h.pair(a, b);
    pair.approve(alice(), h.router(), U256::MAX);

    thread::scope(|s| {
        let h = &h;
        s.spawn(move || {
            for _ in 0..ROUNDS {
                h.core
                    .router
                    .swap_exact_tokens_for_tokens(bob(), units(1), U256::zero(), &[a, b], bob(), h.deadline())
                    .unwrap();
            }
        });
        s.spawn(move || {
            for _ in 0..ROUNDS {
                let (_, _, liquidity) = h
                    .core
                    .router
                    .add_liquidity(
                        alice(),
                        a,
                        b,
                        units(10),
                        units(10),
                        U256::zero(),
                        U256::zero(),
                        alice(),
                        h.deadline(),
                    )
                    .unwrap();
                h.core
                    .router
                    .remove_liquidity(
                        alice(),
                        a,
                        b,
                        liquidity,
                        U256::zero(),
                        U256::zero(),
                        alice(),
                        h.deadline(),
                    )
                    .unwrap();
            }
        });
    });

    assert_reserves_match_balances(&h, a, b);
    let lp_held = pair.balance_of(alice()) + pair.balance_of(Address::zero());
    assert_eq!(lp_held, pair.total_supply());
}

#[test]
fn concurrent_create_pair_admits_exactly_one() {
    let h = Harness::with_tokens();
    let (a, b) = (addr(TOKEN_A), addr(TOKEN_B));
    let barrier = Barrier::new(8);
    let created = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    thread::scope(|s| {
        for i in 0..8 {
            let (h, barrier, created, rejected) = (&h, &barrier, &created, &rejected);
            s.spawn(move || {
                barrier.wait();
                let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
                match h.core.factory.create_pair(x, y) {
                    Ok(_) => created.fetch_add(1, Ordering::SeqCst),
                    Err(AmmError::PairExists { .. }) => rejected.fetch_add(1, Ordering::SeqCst),
                    Err(err) => panic!("unexpected error: {err}"),
                };
            });
        }
    });

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), 7);
    assert_eq!(h.core.factory.all_pairs_length(), 1);
}

#[test]
fn concurrent_first_deposits_share_one_pair() {
    let h = Harness::with_tokens();
    let (a, c) = (addr(TOKEN_A), addr(TOKEN_C));
    let barrier = Barrier::new(3);

    thread::scope(|s| {
        for trader in [alice(), bob(), carol()] {
            let (h, barrier) = (&h, &barrier);
            s.spawn(move || {
                barrier.wait();
                h.core
                    .router
                    .add_liquidity(
                        trader,
                        a,
                        c,
                        units(100),
                        units(100),
                        U256::zero(),
                        U256::zero(),
                        trader,
                        h.deadline(),
                    )
                    .unwrap();
            });
        }
    });

    assert_eq!(h.core.factory.all_pairs_length(), 1);
    assert_eq!(h.core.router.get_reserves(a, c).unwrap(), (units(300), units(300)));
    assert_reserves_match_balances(&h, a, c);
}
