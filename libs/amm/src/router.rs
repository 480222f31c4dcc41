//! Router: optimal amounts, multi-hop swaps and caller-supplied bounds
//!
//! Every write call checks its deadline, locks the pairs it touches (in
//! ascending address order), computes amounts under those locks, checks
//! every bound and previews every pair step, and only then moves tokens.
//! A rejected call therefore changes nothing.
//!
//! Callers approve the router on the token bank (and on the pair's LP
//! ledger for removals) exactly as they would approve an on-chain router.

use crate::clock::Clock;
use crate::factory::{pair_for, Factory};
use crate::library;
use crate::pair::{Pair, PairGuard};
use crate::pool_traits::ReserveSource;
use crate::token::{Movement, TokenBank, TokenKind};
use crate::v2_math::{checked_add, checked_mul};
use crate::V2Math;
use basin_types::constants::{MAX_RESERVE, MINIMUM_LIQUIDITY};
use basin_types::{Address, AddressExt, AmmError, U256};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

fn canonical(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}

/// Guards over every distinct pair of a path
struct LockedPath<'a> {
    guards: BTreeMap<Address, PairGuard<'a>>,
    by_tokens: HashMap<(Address, Address), Address>,
}

impl<'a> LockedPath<'a> {
    /// Lock in ascending pair address order; a pair may appear only once
    fn lock(pairs: &'a [Arc<Pair>]) -> Result<Self, AmmError> {
        let mut ordered: BTreeMap<Address, &'a Pair> = BTreeMap::new();
        for pair in pairs {
            if ordered.insert(pair.address(), pair.as_ref()).is_some() {
                return Err(AmmError::InvalidPath);
            }
        }

        let by_tokens = ordered
            .values()
            .map(|pair| ((pair.token0(), pair.token1()), pair.address()))
            .collect();
        let guards = ordered
            .into_iter()
            .map(|(address, pair)| (address, pair.lock()))
            .collect();

        Ok(Self { guards, by_tokens })
    }

    fn pair_address(&self, token_a: Address, token_b: Address) -> Result<Address, AmmError> {
        self.by_tokens
            .get(&canonical(token_a, token_b))
            .copied()
            .ok_or(AmmError::PairNotExists { token_a, token_b })
    }

    fn guard(&self, token_a: Address, token_b: Address) -> Result<&PairGuard<'a>, AmmError> {
        let address = self.pair_address(token_a, token_b)?;
        self.guards
            .get(&address)
            .ok_or(AmmError::PairNotExists { token_a, token_b })
    }

    fn guard_mut(
        &mut self,
        token_a: Address,
        token_b: Address,
    ) -> Result<&mut PairGuard<'a>, AmmError> {
        let address = self.pair_address(token_a, token_b)?;
        self.guards
            .get_mut(&address)
            .ok_or(AmmError::PairNotExists { token_a, token_b })
    }
}

impl ReserveSource for LockedPath<'_> {
    fn reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256), AmmError> {
        let guard = self.guard(token_a, token_b)?;
        Ok(oriented(guard, token_a))
    }
}

/// Reserves of the guarded pair ordered as `(token_a side, other side)`
fn oriented(guard: &PairGuard<'_>, token_a: Address) -> (U256, U256) {
    let reserves = guard.reserves();
    if token_a == guard.pair().token0() {
        (reserves.reserve0, reserves.reserve1)
    } else {
        (reserves.reserve1, reserves.reserve0)
    }
}

/// One pair step of a multi-hop swap
#[derive(Debug, Clone, Copy)]
struct HopLeg {
    token_in: Address,
    token_out: Address,
    amount0_in: U256,
    amount1_in: U256,
    amount0_out: U256,
    amount1_out: U256,
    to: Address,
}

/// Where a swap's input comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Funding {
    Tokens,
    Native,
}

/// Where a swap's output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payout {
    Tokens,
    Native,
}

pub struct Router {
    address: Address,
    factory: Arc<Factory>,
    wrapped_native: Address,
    bank: Arc<TokenBank>,
    clock: Arc<dyn Clock>,
}

impl Router {
    /// Bind a router to `factory`; `wrapped_native` must be registered as the
    /// wrapped native token on the factory's bank
    pub fn new(
        address: Address,
        factory: Arc<Factory>,
        wrapped_native: Address,
    ) -> Result<Self, AmmError> {
        let address = address.ensure_non_zero()?;
        let wrapped_native = wrapped_native.ensure_non_zero()?;
        let bank = Arc::clone(factory.bank());
        if bank.metadata(wrapped_native)?.kind != TokenKind::WrappedNative {
            return Err(AmmError::NotWrappedNative(wrapped_native));
        }
        let clock = Arc::clone(factory.clock());

        Ok(Self {
            address,
            factory,
            wrapped_native,
            bank,
            clock,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn factory(&self) -> &Arc<Factory> {
        &self.factory
    }

    pub fn wrapped_native(&self) -> Address {
        self.wrapped_native
    }

    fn ensure_deadline(&self, deadline: u64) -> Result<(), AmmError> {
        let now = self.clock.now();
        if now > deadline {
            return Err(AmmError::DeadlineExpired { deadline, now });
        }
        Ok(())
    }

    // ---- read-only math ----

    pub fn quote(amount_a: U256, reserve_a: U256, reserve_b: U256) -> Result<U256, AmmError> {
        V2Math::quote(amount_a, reserve_a, reserve_b)
    }

    pub fn get_amount_out(
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256, AmmError> {
        V2Math::get_amount_out(amount_in, reserve_in, reserve_out)
    }

    pub fn get_amount_in(
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256, AmmError> {
        V2Math::get_amount_in(amount_out, reserve_in, reserve_out)
    }

    pub fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>, AmmError> {
        library::get_amounts_out(self.factory.as_ref(), amount_in, path)
    }

    pub fn get_amounts_in(&self, amount_out: U256, path: &[Address]) -> Result<Vec<U256>, AmmError> {
        library::get_amounts_in(self.factory.as_ref(), amount_out, path)
    }

    /// Reserves of the `(token_a, token_b)` pair in argument order
    pub fn get_reserves(&self, token_a: Address, token_b: Address) -> Result<(U256, U256), AmmError> {
        self.factory.reserves(token_a, token_b)
    }

    pub fn pair_for(&self, token_a: Address, token_b: Address) -> Result<Address, AmmError> {
        pair_for(self.factory.address(), token_a, token_b)
    }

    // ---- liquidity ----

    /// Amounts to deposit given desired amounts and minima
    fn optimal_amounts(
        reserve_a: U256,
        reserve_b: U256,
        desired_a: U256,
        desired_b: U256,
        min_a: U256,
        min_b: U256,
    ) -> Result<(U256, U256), AmmError> {
        if reserve_a.is_zero() && reserve_b.is_zero() {
            return Ok((desired_a, desired_b));
        }

        let optimal_b = V2Math::quote(desired_a, reserve_a, reserve_b)?;
        if optimal_b <= desired_b {
            if optimal_b < min_b {
                return Err(AmmError::InsufficientBAmount {
                    amount: optimal_b,
                    minimum: min_b,
                });
            }
            return Ok((desired_a, optimal_b));
        }

        let optimal_a = V2Math::quote(desired_b, reserve_b, reserve_a)?;
        if optimal_a > desired_a || optimal_a < min_a {
            return Err(AmmError::InsufficientAAmount {
                amount: optimal_a,
                minimum: min_a,
            });
        }
        Ok((optimal_a, desired_b))
    }

    /// Existing pair, or a new one once the first deposit is known to succeed
    fn ensure_pair(
        &self,
        funding: impl Fn(Address) -> [Movement; 2],
        token_a: Address,
        token_b: Address,
        desired_a: U256,
        desired_b: U256,
    ) -> Result<Arc<Pair>, AmmError> {
        if let Some(pair) = self.factory.pair_for_tokens(token_a, token_b) {
            return Ok(pair);
        }

        // The first mint counts everything already held at the pair address
        let address = self.pair_for(token_a, token_b)?;
        let deposit_a = checked_add(self.bank.balance_of(token_a, address)?, desired_a)?;
        let deposit_b = checked_add(self.bank.balance_of(token_b, address)?, desired_b)?;
        if deposit_a > MAX_RESERVE || deposit_b > MAX_RESERVE {
            return Err(AmmError::Overflow);
        }
        let root = V2Math::sqrt(checked_mul(deposit_a, deposit_b)?);
        if root <= U256::from(MINIMUM_LIQUIDITY) {
            return Err(AmmError::InsufficientLiquidityMinted);
        }
        self.bank.check(self.address, &funding(address))?;

        match self.factory.create_pair(token_a, token_b) {
            Ok(_) | Err(AmmError::PairExists { .. }) => {}
            Err(err) => return Err(err),
        }
        self.factory.require_pair(token_a, token_b)
    }

    #[allow(clippy::too_many_arguments)]
    fn add_liquidity_with(
        &self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        desired_a: U256,
        desired_b: U256,
        min_a: U256,
        min_b: U256,
        to: Address,
        native_b: bool,
    ) -> Result<(U256, U256, U256), AmmError> {
        let funding = |pair: Address, amount_a: U256, amount_b: U256| {
            let leg_b = if native_b {
                Movement::Wrap {
                    token: token_b,
                    from: caller,
                    to: pair,
                    amount: amount_b,
                }
            } else {
                Movement::Pull {
                    token: token_b,
                    from: caller,
                    to: pair,
                    amount: amount_b,
                }
            };
            [
                Movement::Pull {
                    token: token_a,
                    from: caller,
                    to: pair,
                    amount: amount_a,
                },
                leg_b,
            ]
        };

        let pair = self.ensure_pair(
            |pair| funding(pair, desired_a, desired_b),
            token_a,
            token_b,
            desired_a,
            desired_b,
        )?;
        let mut guard = pair.lock();

        let (reserve_a, reserve_b) = oriented(&guard, token_a);
        let (amount_a, amount_b) =
            Self::optimal_amounts(reserve_a, reserve_b, desired_a, desired_b, min_a, min_b)?;
        let (amount0, amount1) = if token_a == pair.token0() {
            (amount_a, amount_b)
        } else {
            (amount_b, amount_a)
        };
        guard.preview_mint(amount0, amount1)?;

        self.bank
            .execute(self.address, &funding(pair.address(), amount_a, amount_b))?;
        let liquidity = guard.mint(self.address, to)?;

        debug!(
            ?caller,
            pair = ?pair.address(),
            %amount_a,
            %amount_b,
            %liquidity,
            "Liquidity added"
        );
        Ok((amount_a, amount_b, liquidity))
    }

    /// Deposit both tokens at the pool ratio, creating the pair if needed
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        amount_a_desired: U256,
        amount_b_desired: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256, U256), AmmError> {
        self.ensure_deadline(deadline)?;
        self.add_liquidity_with(
            caller,
            token_a,
            token_b,
            amount_a_desired,
            amount_b_desired,
            amount_a_min,
            amount_b_min,
            to,
            false,
        )
    }

    /// Deposit `token` against native value; only the native amount used is debited
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_native(
        &self,
        caller: Address,
        token: Address,
        amount_token_desired: U256,
        amount_native_desired: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256, U256), AmmError> {
        self.ensure_deadline(deadline)?;
        self.add_liquidity_with(
            caller,
            token,
            self.wrapped_native,
            amount_token_desired,
            amount_native_desired,
            amount_token_min,
            amount_native_min,
            to,
            true,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn remove_liquidity_with(
        &self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        min_a: U256,
        min_b: U256,
        to: Address,
    ) -> Result<(U256, U256), AmmError> {
        let pair = self.factory.require_pair(token_a, token_b)?;
        let mut guard = pair.lock();
        let a_is_token0 = token_a == pair.token0();
        guard.ensure_lp_spendable(self.address, caller, liquidity)?;

        let (preview0, preview1) = guard.preview_burn_to(liquidity, to)?;
        let (amount_a, amount_b) = if a_is_token0 {
            (preview0, preview1)
        } else {
            (preview1, preview0)
        };
        if amount_a < min_a {
            return Err(AmmError::InsufficientAAmount {
                amount: amount_a,
                minimum: min_a,
            });
        }
        if amount_b < min_b {
            return Err(AmmError::InsufficientBAmount {
                amount: amount_b,
                minimum: min_b,
            });
        }

        guard.lp_transfer_from(self.address, caller, pair.address(), liquidity)?;
        let (amount0, amount1) = guard.burn(self.address, to)?;

        debug!(?caller, pair = ?pair.address(), %liquidity, %amount0, %amount1, "Liquidity removed");
        Ok(if a_is_token0 {
            (amount0, amount1)
        } else {
            (amount1, amount0)
        })
    }

    /// Redeem LP shares for both tokens; minima are checked before any share moves
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &self,
        caller: Address,
        token_a: Address,
        token_b: Address,
        liquidity: U256,
        amount_a_min: U256,
        amount_b_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256), AmmError> {
        self.ensure_deadline(deadline)?;
        self.remove_liquidity_with(
            caller,
            token_a,
            token_b,
            liquidity,
            amount_a_min,
            amount_b_min,
            to,
        )
    }

    /// Redeem LP shares of a `token`/wrapped-native pair, paying native value
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity_native(
        &self,
        caller: Address,
        token: Address,
        liquidity: U256,
        amount_token_min: U256,
        amount_native_min: U256,
        to: Address,
        deadline: u64,
    ) -> Result<(U256, U256), AmmError> {
        self.ensure_deadline(deadline)?;
        let (amount_token, amount_native) = self.remove_liquidity_with(
            caller,
            token,
            self.wrapped_native,
            liquidity,
            amount_token_min,
            amount_native_min,
            self.address,
        )?;

        self.bank.transfer(token, self.address, to, amount_token)?;
        self.unwrap_to(to, amount_native)?;
        Ok((amount_token, amount_native))
    }

    fn unwrap_to(&self, to: Address, amount: U256) -> Result<(), AmmError> {
        self.bank.withdraw(self.wrapped_native, self.address, amount)?;
        self.bank.transfer_native(self.address, to, amount)
    }

    // ---- swaps ----

    fn resolve_path(&self, path: &[Address]) -> Result<Vec<Arc<Pair>>, AmmError> {
        if path.len() < 2 {
            return Err(AmmError::InvalidPath);
        }
        path.windows(2)
            .map(|hop| self.factory.require_pair(hop[0], hop[1]))
            .collect()
    }

    fn hop_legs(
        locked: &LockedPath<'_>,
        amounts: &[U256],
        path: &[Address],
        to: Address,
    ) -> Result<Vec<HopLeg>, AmmError> {
        let hops = path.len() - 1;
        (0..hops)
            .map(|i| {
                let (token_in, token_out) = (path[i], path[i + 1]);
                let token0 = locked.guard(token_in, token_out)?.pair().token0();
                let (amount_in, amount_out) = (amounts[i], amounts[i + 1]);
                let zero = U256::zero();
                let (amount0_in, amount1_in, amount0_out, amount1_out) = if token_in == token0 {
                    (amount_in, zero, zero, amount_out)
                } else {
                    (zero, amount_in, amount_out, zero)
                };
                let recipient = if i + 1 < hops {
                    locked.pair_address(token_out, path[i + 2])?
                } else {
                    to
                };
                Ok(HopLeg {
                    token_in,
                    token_out,
                    amount0_in,
                    amount1_in,
                    amount0_out,
                    amount1_out,
                    to: recipient,
                })
            })
            .collect()
    }

    /// Preview every hop, fund the first pair, then run the hops in order
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &self,
        caller: Address,
        locked: &mut LockedPath<'_>,
        amounts: &[U256],
        path: &[Address],
        to: Address,
        funding: Funding,
        payout: Payout,
    ) -> Result<(), AmmError> {
        let recipient = match payout {
            Payout::Tokens => to,
            Payout::Native => self.address,
        };
        let legs = Self::hop_legs(locked, amounts, path, recipient)?;
        for leg in &legs {
            locked.guard(leg.token_in, leg.token_out)?.preview_swap(
                leg.amount0_in,
                leg.amount1_in,
                leg.amount0_out,
                leg.amount1_out,
                leg.to,
            )?;
        }

        let first_pair = locked.pair_address(path[0], path[1])?;
        let movement = match funding {
            Funding::Tokens => Movement::Pull {
                token: path[0],
                from: caller,
                to: first_pair,
                amount: amounts[0],
            },
            Funding::Native => Movement::Wrap {
                token: path[0],
                from: caller,
                to: first_pair,
                amount: amounts[0],
            },
        };
        self.bank.execute(self.address, &[movement])?;

        for leg in &legs {
            locked.guard_mut(leg.token_in, leg.token_out)?.swap(
                self.address,
                leg.amount0_out,
                leg.amount1_out,
                leg.to,
            )?;
        }

        let amount_out = amounts[amounts.len() - 1];
        if payout == Payout::Native {
            self.unwrap_to(to, amount_out)?;
        }

        debug!(
            ?caller,
            hops = legs.len(),
            amount_in = %amounts[0],
            %amount_out,
            "Swap executed"
        );
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_exact_in(
        &self,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        funding: Funding,
        payout: Payout,
    ) -> Result<Vec<U256>, AmmError> {
        let pairs = self.resolve_path(path)?;
        let mut locked = LockedPath::lock(&pairs)?;

        let amounts = library::get_amounts_out(&locked, amount_in, path)?;
        if amounts[amounts.len() - 1] < amount_out_min {
            return Err(AmmError::InsufficientOutputAmount);
        }
        self.settle(caller, &mut locked, &amounts, path, to, funding, payout)?;
        Ok(amounts)
    }

    #[allow(clippy::too_many_arguments)]
    fn swap_exact_out(
        &self,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        funding: Funding,
        payout: Payout,
    ) -> Result<Vec<U256>, AmmError> {
        let pairs = self.resolve_path(path)?;
        let mut locked = LockedPath::lock(&pairs)?;

        let amounts = library::get_amounts_in(&locked, amount_out, path)?;
        if amounts[0] > amount_in_max {
            return Err(AmmError::ExcessiveInputAmount {
                amount: amounts[0],
                maximum: amount_in_max,
            });
        }
        self.settle(caller, &mut locked, &amounts, path, to, funding, payout)?;
        Ok(amounts)
    }

    fn ensure_starts_native(&self, path: &[Address]) -> Result<(), AmmError> {
        match path.first() {
            Some(first) if *first == self.wrapped_native => Ok(()),
            _ => Err(AmmError::InvalidPath),
        }
    }

    fn ensure_ends_native(&self, path: &[Address]) -> Result<(), AmmError> {
        match path.last() {
            Some(last) if *last == self.wrapped_native => Ok(()),
            _ => Err(AmmError::InvalidPath),
        }
    }

    pub fn swap_exact_tokens_for_tokens(
        &self,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.swap_exact_in(
            caller,
            amount_in,
            amount_out_min,
            path,
            to,
            Funding::Tokens,
            Payout::Tokens,
        )
    }

    pub fn swap_tokens_for_exact_tokens(
        &self,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.swap_exact_out(
            caller,
            amount_out,
            amount_in_max,
            path,
            to,
            Funding::Tokens,
            Payout::Tokens,
        )
    }

    /// Spend exactly `amount_in` native value; `path` must start at the wrapped token
    pub fn swap_exact_native_for_tokens(
        &self,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.ensure_starts_native(path)?;
        self.swap_exact_in(
            caller,
            amount_in,
            amount_out_min,
            path,
            to,
            Funding::Native,
            Payout::Tokens,
        )
    }

    /// Buy exactly `amount_out` with at most `amount_in_max` native value
    pub fn swap_native_for_exact_tokens(
        &self,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.ensure_starts_native(path)?;
        self.swap_exact_out(
            caller,
            amount_out,
            amount_in_max,
            path,
            to,
            Funding::Native,
            Payout::Tokens,
        )
    }

    /// Sell exactly `amount_in` tokens for native value; `path` must end at the wrapped token
    pub fn swap_exact_tokens_for_native(
        &self,
        caller: Address,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.ensure_ends_native(path)?;
        self.swap_exact_in(
            caller,
            amount_in,
            amount_out_min,
            path,
            to,
            Funding::Tokens,
            Payout::Native,
        )
    }

    /// Receive exactly `amount_out` native value for at most `amount_in_max` tokens
    pub fn swap_tokens_for_exact_native(
        &self,
        caller: Address,
        amount_out: U256,
        amount_in_max: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Result<Vec<U256>, AmmError> {
        self.ensure_deadline(deadline)?;
        self.ensure_ends_native(path)?;
        self.swap_exact_out(
            caller,
            amount_out,
            amount_in_max,
            path,
            to,
            Funding::Tokens,
            Payout::Native,
        )
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("address", &self.address)
            .field("factory", &self.factory.address())
            .field("wrapped_native", &self.wrapped_native)
            .finish()
    }
}
