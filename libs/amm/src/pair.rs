//! Pair: constant-product reserve ledger and LP share issuer
//!
//! Each pair keeps its tracked reserves and LP share ledger behind a single
//! mutex. Mutations go through a [`PairGuard`], which holds that mutex for
//! the whole read-modify-write. Every operation first builds a plan from the
//! current balances (all checks happen here), then applies it; applying a
//! plan cannot fail, so a rejected call never leaves partial state behind.
//!
//! Tokens are pushed into the pair through the [`TokenBank`] *before*
//! `mint`/`swap` are called, and LP shares are pushed to the pair itself
//! before `burn`, mirroring the transfer-then-call pattern.

use crate::clock::Clock;
use crate::events::EventBus;
use crate::factory::Governance;
use crate::token::{TokenBank, TokenLedger};
use crate::v2_math::{checked_add, checked_mul, checked_sub};
use crate::V2Math;
use basin_types::constants::{
    FEE_DENOMINATOR, MAX_RESERVE, MINIMUM_LIQUIDITY, PROTOCOL_FEE_DIVISOR, SWAP_FEE_PER_MILLE,
};
use basin_types::{Address, AmmError, AmmEvent, U256};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Snapshot returned by `get_reserves`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reserves {
    pub reserve0: U256,
    pub reserve1: U256,
    pub block_timestamp_last: u32,
}

/// Mutable state of one pair
#[derive(Debug, Clone)]
pub struct PairState {
    reserve0: U256,
    reserve1: U256,
    block_timestamp_last: u32,
    k_last: U256,
    lp: TokenLedger,
}

/// Shared services every pair needs
#[derive(Clone)]
pub struct PairContext {
    pub bank: Arc<TokenBank>,
    pub governance: Arc<RwLock<Governance>>,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

/// A single constant-product pool
pub struct Pair {
    address: Address,
    factory: Address,
    token0: Address,
    token1: Address,
    state: Mutex<PairState>,
    ctx: PairContext,
}

/// Protocol fee owed before a mint or burn
#[derive(Debug, Clone, Copy)]
struct FeeAccrual {
    fee_on: bool,
    mint: Option<(Address, U256)>,
}

impl FeeAccrual {
    fn liquidity(&self) -> U256 {
        self.mint.map(|(_, liquidity)| liquidity).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
struct MintPlan {
    amount0: U256,
    amount1: U256,
    liquidity: U256,
    first_deposit: bool,
    fee: FeeAccrual,
}

#[derive(Debug, Clone, Copy)]
struct BurnPlan {
    liquidity: U256,
    amount0: U256,
    amount1: U256,
    balance0_after: U256,
    balance1_after: U256,
    fee: FeeAccrual,
}

#[derive(Debug, Clone, Copy)]
struct SwapPlan {
    amount0_in: U256,
    amount1_in: U256,
    balance0_after: U256,
    balance1_after: U256,
}

fn ensure_reserve_bounds(balance0: U256, balance1: U256) -> Result<(), AmmError> {
    if balance0 > MAX_RESERVE || balance1 > MAX_RESERVE {
        return Err(AmmError::Overflow);
    }
    Ok(())
}

impl Pair {
    pub(crate) fn new(
        address: Address,
        factory: Address,
        token0: Address,
        token1: Address,
        ctx: PairContext,
    ) -> Self {
        Self {
            address,
            factory,
            token0,
            token1,
            state: Mutex::new(PairState {
                reserve0: U256::zero(),
                reserve1: U256::zero(),
                block_timestamp_last: 0,
                k_last: U256::zero(),
                lp: TokenLedger::new(address),
            }),
            ctx,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn token0(&self) -> Address {
        self.token0
    }

    pub fn token1(&self) -> Address {
        self.token1
    }

    /// Acquire the pair's critical section
    pub fn lock(&self) -> PairGuard<'_> {
        PairGuard {
            pair: self,
            state: self.state.lock(),
        }
    }

    pub fn get_reserves(&self) -> Reserves {
        self.lock().reserves()
    }

    pub fn k_last(&self) -> U256 {
        self.lock().state.k_last
    }

    pub fn total_supply(&self) -> U256 {
        self.lock().total_supply()
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.lock().lp_balance_of(holder)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.lock().state.lp.allowance(owner, spender)
    }

    pub fn mint(&self, sender: Address, to: Address) -> Result<U256, AmmError> {
        self.lock().mint(sender, to)
    }

    pub fn burn(&self, sender: Address, to: Address) -> Result<(U256, U256), AmmError> {
        self.lock().burn(sender, to)
    }

    pub fn swap(
        &self,
        sender: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), AmmError> {
        self.lock().swap(sender, amount0_out, amount1_out, to)
    }

    pub fn skim(&self, to: Address) -> Result<(), AmmError> {
        self.lock().skim(to)
    }

    pub fn sync(&self) -> Result<(), AmmError> {
        self.lock().sync()
    }

    pub fn approve(&self, owner: Address, spender: Address, value: U256) {
        self.lock().lp_approve(owner, spender, value)
    }

    pub fn transfer(&self, from: Address, to: Address, value: U256) -> Result<(), AmmError> {
        self.lock().lp_transfer(from, to, value)
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), AmmError> {
        self.lock().lp_transfer_from(spender, from, to, value)
    }
}

impl std::fmt::Debug for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pair")
            .field("address", &self.address)
            .field("token0", &self.token0)
            .field("token1", &self.token1)
            .finish()
    }
}

/// Exclusive access to a pair for the duration of one operation
pub struct PairGuard<'a> {
    pair: &'a Pair,
    state: MutexGuard<'a, PairState>,
}

impl<'a> PairGuard<'a> {
    pub fn pair(&self) -> &'a Pair {
        self.pair
    }

    pub fn address(&self) -> Address {
        self.pair.address
    }

    pub fn reserves(&self) -> Reserves {
        Reserves {
            reserve0: self.state.reserve0,
            reserve1: self.state.reserve1,
            block_timestamp_last: self.state.block_timestamp_last,
        }
    }

    pub fn total_supply(&self) -> U256 {
        self.state.lp.total_supply()
    }

    pub fn lp_balance_of(&self, holder: Address) -> U256 {
        self.state.lp.balance_of(holder)
    }

    fn balances(&self) -> Result<(U256, U256), AmmError> {
        let bank = &self.pair.ctx.bank;
        Ok((
            bank.balance_of(self.pair.token0, self.pair.address)?,
            bank.balance_of(self.pair.token1, self.pair.address)?,
        ))
    }

    fn emit(&self, event: AmmEvent) {
        self.pair.ctx.events.emit(event);
    }

    /// Protocol fee owed at the given reserves (1/6 of sqrt(k) growth since `k_last`)
    fn accrued_fee(&self, reserve0: U256, reserve1: U256) -> Result<FeeAccrual, AmmError> {
        let fee_to = self.pair.ctx.governance.read().fee_to;
        let fee_on = !fee_to.is_zero();
        let k_last = self.state.k_last;

        let mut mint = None;
        if fee_on && !k_last.is_zero() {
            let root_k = V2Math::sqrt(checked_mul(reserve0, reserve1)?);
            let root_k_last = V2Math::sqrt(k_last);
            if root_k > root_k_last {
                let numerator = checked_mul(self.total_supply(), root_k - root_k_last)?;
                let denominator = checked_add(
                    checked_mul(root_k, U256::from(PROTOCOL_FEE_DIVISOR))?,
                    root_k_last,
                )?;
                let liquidity = numerator / denominator;
                if !liquidity.is_zero() {
                    mint = Some((fee_to, liquidity));
                }
            }
        }

        Ok(FeeAccrual { fee_on, mint })
    }

    fn apply_fee(&mut self, fee: &FeeAccrual) -> Result<(), AmmError> {
        if let Some((fee_to, liquidity)) = fee.mint {
            let event = self.state.lp.mint(fee_to, liquidity)?;
            self.emit(event);
        }
        Ok(())
    }

    fn record_k_last(&mut self, fee_on: bool) {
        // Bounded by MAX_RESERVE^2 < 2^224
        self.state.k_last = if fee_on {
            self.state.reserve0 * self.state.reserve1
        } else {
            U256::zero()
        };
    }

    /// Record new reserves; balances must already be within `MAX_RESERVE`
    fn update(&mut self, balance0: U256, balance1: U256) {
        self.state.reserve0 = balance0;
        self.state.reserve1 = balance1;
        self.state.block_timestamp_last = (self.pair.ctx.clock.now() % (1u64 << 32)) as u32;
        self.emit(AmmEvent::Sync {
            pair: self.pair.address,
            reserve0: balance0,
            reserve1: balance1,
        });
    }

    fn plan_mint(&self, balance0: U256, balance1: U256) -> Result<MintPlan, AmmError> {
        let reserve0 = self.state.reserve0;
        let reserve1 = self.state.reserve1;
        let amount0 = balance0
            .checked_sub(reserve0)
            .ok_or(AmmError::InsufficientLiquidityMinted)?;
        let amount1 = balance1
            .checked_sub(reserve1)
            .ok_or(AmmError::InsufficientLiquidityMinted)?;
        ensure_reserve_bounds(balance0, balance1)?;

        let fee = self.accrued_fee(reserve0, reserve1)?;
        let total_supply = checked_add(self.total_supply(), fee.liquidity())?;
        let first_deposit = total_supply.is_zero();

        let liquidity = if first_deposit {
            let root = V2Math::sqrt(checked_mul(amount0, amount1)?);
            root.checked_sub(U256::from(MINIMUM_LIQUIDITY))
                .ok_or(AmmError::InsufficientLiquidityMinted)?
        } else {
            if reserve0.is_zero() || reserve1.is_zero() {
                return Err(AmmError::InsufficientLiquidity);
            }
            let share0 = checked_mul(amount0, total_supply)? / reserve0;
            let share1 = checked_mul(amount1, total_supply)? / reserve1;
            share0.min(share1)
        };

        if liquidity.is_zero() {
            return Err(AmmError::InsufficientLiquidityMinted);
        }

        Ok(MintPlan {
            amount0,
            amount1,
            liquidity,
            first_deposit,
            fee,
        })
    }

    /// Shares `mint` would issue if `extra0`/`extra1` were transferred in first
    pub fn preview_mint(&self, extra0: U256, extra1: U256) -> Result<U256, AmmError> {
        let (balance0, balance1) = self.balances()?;
        let plan = self.plan_mint(
            checked_add(balance0, extra0)?,
            checked_add(balance1, extra1)?,
        )?;
        Ok(plan.liquidity)
    }

    /// Issue LP shares for tokens transferred in since the last reserve update
    pub fn mint(&mut self, sender: Address, to: Address) -> Result<U256, AmmError> {
        let (balance0, balance1) = self.balances()?;
        let plan = self.plan_mint(balance0, balance1)?;

        self.apply_fee(&plan.fee)?;
        if plan.first_deposit {
            // Permanently lock the first MINIMUM_LIQUIDITY shares
            let event = self
                .state
                .lp
                .mint(Address::zero(), U256::from(MINIMUM_LIQUIDITY))?;
            self.emit(event);
        }
        let event = self.state.lp.mint(to, plan.liquidity)?;
        self.emit(event);

        self.update(balance0, balance1);
        self.record_k_last(plan.fee.fee_on);

        debug!(
            pair = ?self.pair.address,
            amount0 = %plan.amount0,
            amount1 = %plan.amount1,
            liquidity = %plan.liquidity,
            "Minted liquidity"
        );
        self.emit(AmmEvent::Mint {
            pair: self.pair.address,
            sender,
            amount0: plan.amount0,
            amount1: plan.amount1,
        });
        Ok(plan.liquidity)
    }

    fn plan_burn(
        &self,
        liquidity: U256,
        balance0: U256,
        balance1: U256,
        to: Address,
    ) -> Result<BurnPlan, AmmError> {
        let fee = self.accrued_fee(self.state.reserve0, self.state.reserve1)?;
        let total_supply = checked_add(self.total_supply(), fee.liquidity())?;
        if total_supply.is_zero() || liquidity > total_supply {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        let amount0 = checked_mul(liquidity, balance0)? / total_supply;
        let amount1 = checked_mul(liquidity, balance1)? / total_supply;
        if amount0.is_zero() || amount1.is_zero() {
            return Err(AmmError::InsufficientLiquidityBurned);
        }

        let (balance0_after, balance1_after) = if to == self.pair.address {
            (balance0, balance1)
        } else {
            (checked_sub(balance0, amount0)?, checked_sub(balance1, amount1)?)
        };
        ensure_reserve_bounds(balance0_after, balance1_after)?;

        Ok(BurnPlan {
            liquidity,
            amount0,
            amount1,
            balance0_after,
            balance1_after,
            fee,
        })
    }

    /// Token amounts `burn` would return if `extra_liquidity` shares were transferred in first
    pub fn preview_burn(&self, extra_liquidity: U256) -> Result<(U256, U256), AmmError> {
        self.preview_burn_to(extra_liquidity, Address::zero())
    }

    /// [`Self::preview_burn`] for a specific recipient
    pub(crate) fn preview_burn_to(
        &self,
        extra_liquidity: U256,
        to: Address,
    ) -> Result<(U256, U256), AmmError> {
        let (balance0, balance1) = self.balances()?;
        let liquidity = checked_add(self.lp_balance_of(self.pair.address), extra_liquidity)?;
        let plan = self.plan_burn(liquidity, balance0, balance1, to)?;
        Ok((plan.amount0, plan.amount1))
    }

    /// Redeem the LP shares held by the pair itself for both underlying tokens
    pub fn burn(&mut self, sender: Address, to: Address) -> Result<(U256, U256), AmmError> {
        let (balance0, balance1) = self.balances()?;
        let liquidity = self.lp_balance_of(self.pair.address);
        let plan = self.plan_burn(liquidity, balance0, balance1, to)?;

        self.apply_fee(&plan.fee)?;
        let event = self.state.lp.burn(self.pair.address, plan.liquidity)?;
        self.emit(event);

        let bank = Arc::clone(&self.pair.ctx.bank);
        bank.transfer(self.pair.token0, self.pair.address, to, plan.amount0)?;
        bank.transfer(self.pair.token1, self.pair.address, to, plan.amount1)?;

        self.update(plan.balance0_after, plan.balance1_after);
        self.record_k_last(plan.fee.fee_on);

        debug!(
            pair = ?self.pair.address,
            liquidity = %plan.liquidity,
            amount0 = %plan.amount0,
            amount1 = %plan.amount1,
            "Burned liquidity"
        );
        self.emit(AmmEvent::Burn {
            pair: self.pair.address,
            sender,
            amount0: plan.amount0,
            amount1: plan.amount1,
            to,
        });
        Ok((plan.amount0, plan.amount1))
    }

    fn plan_swap(
        &self,
        balance0: U256,
        balance1: U256,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<SwapPlan, AmmError> {
        if amount0_out.is_zero() && amount1_out.is_zero() {
            return Err(AmmError::InsufficientOutputAmount);
        }
        let reserve0 = self.state.reserve0;
        let reserve1 = self.state.reserve1;
        if amount0_out >= reserve0 || amount1_out >= reserve1 {
            return Err(AmmError::InsufficientLiquidity);
        }
        if to == self.pair.token0 || to == self.pair.token1 {
            return Err(AmmError::InvalidTo);
        }

        // Balances as they will stand once the outputs have left the pair
        let projected0 = checked_sub(balance0, amount0_out)?;
        let projected1 = checked_sub(balance1, amount1_out)?;

        let floor0 = reserve0 - amount0_out;
        let floor1 = reserve1 - amount1_out;
        let amount0_in = projected0.saturating_sub(floor0);
        let amount1_in = projected1.saturating_sub(floor1);
        if amount0_in.is_zero() && amount1_in.is_zero() {
            return Err(AmmError::InsufficientInputAmount);
        }

        let scale = U256::from(FEE_DENOMINATOR);
        let fee = U256::from(SWAP_FEE_PER_MILLE);
        let adjusted0 = checked_sub(checked_mul(projected0, scale)?, checked_mul(amount0_in, fee)?)?;
        let adjusted1 = checked_sub(checked_mul(projected1, scale)?, checked_mul(amount1_in, fee)?)?;
        let k_after = checked_mul(adjusted0, adjusted1)?;
        let k_before = checked_mul(checked_mul(reserve0, reserve1)?, scale * scale)?;
        if k_after < k_before {
            return Err(AmmError::K);
        }

        let (balance0_after, balance1_after) = if to == self.pair.address {
            (balance0, balance1)
        } else {
            (projected0, projected1)
        };
        ensure_reserve_bounds(balance0_after, balance1_after)?;

        Ok(SwapPlan {
            amount0_in,
            amount1_in,
            balance0_after,
            balance1_after,
        })
    }

    /// Fail with the error `swap` would report if `amount0_in`/`amount1_in`
    /// were transferred in first
    pub fn preview_swap(
        &self,
        amount0_in: U256,
        amount1_in: U256,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), AmmError> {
        let (balance0, balance1) = self.balances()?;
        self.plan_swap(
            checked_add(balance0, amount0_in)?,
            checked_add(balance1, amount1_in)?,
            amount0_out,
            amount1_out,
            to,
        )
        .map(|_| ())
    }

    /// Pay out the requested amounts against inputs already transferred in.
    ///
    /// The fee-adjusted invariant is checked on the projected post-transfer
    /// balances; tokens only leave the pair once it holds.
    pub fn swap(
        &mut self,
        sender: Address,
        amount0_out: U256,
        amount1_out: U256,
        to: Address,
    ) -> Result<(), AmmError> {
        let (balance0, balance1) = self.balances()?;
        let plan = self.plan_swap(balance0, balance1, amount0_out, amount1_out, to)?;

        let bank = Arc::clone(&self.pair.ctx.bank);
        if !amount0_out.is_zero() {
            bank.transfer(self.pair.token0, self.pair.address, to, amount0_out)?;
        }
        if !amount1_out.is_zero() {
            bank.transfer(self.pair.token1, self.pair.address, to, amount1_out)?;
        }

        self.update(plan.balance0_after, plan.balance1_after);

        debug!(
            pair = ?self.pair.address,
            amount0_in = %plan.amount0_in,
            amount1_in = %plan.amount1_in,
            amount0_out = %amount0_out,
            amount1_out = %amount1_out,
            "Swapped"
        );
        self.emit(AmmEvent::Swap {
            pair: self.pair.address,
            sender,
            amount0_in: plan.amount0_in,
            amount1_in: plan.amount1_in,
            amount0_out,
            amount1_out,
            to,
        });
        Ok(())
    }

    /// Send any balance above the tracked reserves to `to`
    pub fn skim(&mut self, to: Address) -> Result<(), AmmError> {
        let (balance0, balance1) = self.balances()?;
        let excess0 = balance0.saturating_sub(self.state.reserve0);
        let excess1 = balance1.saturating_sub(self.state.reserve1);

        let bank = Arc::clone(&self.pair.ctx.bank);
        if !excess0.is_zero() {
            bank.transfer(self.pair.token0, self.pair.address, to, excess0)?;
        }
        if !excess1.is_zero() {
            bank.transfer(self.pair.token1, self.pair.address, to, excess1)?;
        }

        debug!(pair = ?self.pair.address, %excess0, %excess1, "Skimmed");
        Ok(())
    }

    /// Force reserves to match actual balances
    pub fn sync(&mut self) -> Result<(), AmmError> {
        let (balance0, balance1) = self.balances()?;
        ensure_reserve_bounds(balance0, balance1)?;
        self.update(balance0, balance1);
        Ok(())
    }

    pub fn lp_approve(&mut self, owner: Address, spender: Address, value: U256) {
        let event = self.state.lp.approve(owner, spender, value);
        self.emit(event);
    }

    pub fn lp_transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), AmmError> {
        let event = self.state.lp.transfer(from, to, value)?;
        self.emit(event);
        Ok(())
    }

    pub fn lp_transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), AmmError> {
        let event = self.state.lp.transfer_from(spender, from, to, value)?;
        self.emit(event);
        Ok(())
    }

    /// Fail unless `spender` could pull `value` LP shares from `from`
    pub fn ensure_lp_spendable(
        &self,
        spender: Address,
        from: Address,
        value: U256,
    ) -> Result<(), AmmError> {
        self.state.lp.ensure_allowance(from, spender, value)?;
        self.state.lp.ensure_balance(from, value)
    }
}
