//! Fungible token ledgers and the token bank
//!
//! [`TokenLedger`] is a plain ERC-20 style balance/allowance table; pairs use
//! one directly for their LP shares. [`TokenBank`] hosts every other token,
//! plus native-asset balances, behind per-token locks so that pairs can
//! observe their own balances and the router can move tokens on a caller's
//! behalf.

use crate::events::EventBus;
use crate::v2_math::{checked_add, checked_sub};
use basin_types::{Address, AddressExt, AmmError, AmmEvent, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Whether a token is an ordinary asset or the wrapped native asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Standard,
    WrappedNative,
}

/// Static token description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub kind: TokenKind,
}

/// Balance and allowance table for one fungible token
#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    address: Address,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl TokenLedger {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: Address) -> U256 {
        self.balances.get(&holder).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Fail unless `holder` owns at least `value`
    pub fn ensure_balance(&self, holder: Address, value: U256) -> Result<(), AmmError> {
        let available = self.balance_of(holder);
        if available < value {
            return Err(AmmError::InsufficientBalance {
                token: self.address,
                holder,
                available,
                required: value,
            });
        }
        Ok(())
    }

    /// Fail unless `spender` may move at least `value` of `owner`'s balance
    pub fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), AmmError> {
        let available = self.allowance(owner, spender);
        if available < value {
            return Err(AmmError::InsufficientAllowance {
                token: self.address,
                spender,
                available,
                required: value,
            });
        }
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, value: U256) -> AmmEvent {
        self.allowances.insert((owner, spender), value);
        AmmEvent::Approval {
            token: self.address,
            owner,
            spender,
            value,
        }
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<AmmEvent, AmmError> {
        self.ensure_balance(from, value)?;
        let from_balance = self.balance_of(from) - value;
        self.balances.insert(from, from_balance);
        // Cannot overflow: every balance is bounded by total supply
        let to_balance = self.balance_of(to) + value;
        self.balances.insert(to, to_balance);

        Ok(AmmEvent::Transfer {
            token: self.address,
            from,
            to,
            value,
        })
    }

    /// Move tokens on `owner`'s behalf; an allowance of `U256::MAX` is never spent down
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<AmmEvent, AmmError> {
        self.ensure_allowance(from, spender, value)?;
        self.ensure_balance(from, value)?;

        let allowance = self.allowance(from, spender);
        if allowance != U256::MAX {
            self.allowances.insert((from, spender), allowance - value);
        }
        self.transfer(from, to, value)
    }

    pub fn mint(&mut self, to: Address, value: U256) -> Result<AmmEvent, AmmError> {
        self.total_supply = checked_add(self.total_supply, value)?;
        let balance = self.balance_of(to) + value;
        self.balances.insert(to, balance);

        Ok(AmmEvent::Transfer {
            token: self.address,
            from: Address::zero(),
            to,
            value,
        })
    }

    pub fn burn(&mut self, from: Address, value: U256) -> Result<AmmEvent, AmmError> {
        self.ensure_balance(from, value)?;
        let balance = self.balance_of(from) - value;
        self.balances.insert(from, balance);
        self.total_supply = checked_sub(self.total_supply, value)?;

        Ok(AmmEvent::Transfer {
            token: self.address,
            from,
            to: Address::zero(),
            value,
        })
    }
}

/// One leg of an atomic bank batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// The batch spender pulls `amount` of `token` from `from` into `to`
    Pull {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    /// `amount` of `from`'s native balance is wrapped and credited to `to`
    Wrap {
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
}

impl Movement {
    fn token(&self) -> Address {
        match self {
            Movement::Pull { token, .. } | Movement::Wrap { token, .. } => *token,
        }
    }
}

struct TokenEntry {
    metadata: TokenMetadata,
    ledger: Mutex<TokenLedger>,
}

/// Host ledger for every registered token and the native asset.
///
/// Lock order: token ledgers in ascending address order, then the native
/// balance table.
pub struct TokenBank {
    tokens: DashMap<Address, Arc<TokenEntry>>,
    native: Mutex<HashMap<Address, U256>>,
    events: EventBus,
}

impl TokenBank {
    pub fn new(events: EventBus) -> Self {
        Self {
            tokens: DashMap::new(),
            native: Mutex::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register an ordinary token
    pub fn register_token(
        &self,
        address: Address,
        symbol: &str,
        decimals: u8,
    ) -> Result<(), AmmError> {
        self.register(address, symbol, decimals, TokenKind::Standard)
    }

    /// Register the token that wraps the native asset 1:1
    pub fn register_wrapped_native(&self, address: Address, symbol: &str) -> Result<(), AmmError> {
        self.register(address, symbol, 18, TokenKind::WrappedNative)
    }

    fn register(
        &self,
        address: Address,
        symbol: &str,
        decimals: u8,
        kind: TokenKind,
    ) -> Result<(), AmmError> {
        let address = address.ensure_non_zero()?;
        match self.tokens.entry(address) {
            Entry::Occupied(_) => Err(AmmError::TokenExists(address)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(TokenEntry {
                    metadata: TokenMetadata {
                        address,
                        symbol: symbol.to_string(),
                        decimals,
                        kind,
                    },
                    ledger: Mutex::new(TokenLedger::new(address)),
                }));
                info!(token = ?address, symbol, decimals, ?kind, "Registered token");
                Ok(())
            }
        }
    }

    fn entry(&self, token: Address) -> Result<Arc<TokenEntry>, AmmError> {
        self.tokens
            .get(&token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(AmmError::UnknownToken(token))
    }

    pub fn is_registered(&self, token: Address) -> bool {
        self.tokens.contains_key(&token)
    }

    pub fn metadata(&self, token: Address) -> Result<TokenMetadata, AmmError> {
        Ok(self.entry(token)?.metadata.clone())
    }

    pub fn total_supply(&self, token: Address) -> Result<U256, AmmError> {
        Ok(self.entry(token)?.ledger.lock().total_supply())
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> Result<U256, AmmError> {
        Ok(self.entry(token)?.ledger.lock().balance_of(holder))
    }

    pub fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AmmError> {
        Ok(self.entry(token)?.ledger.lock().allowance(owner, spender))
    }

    /// Create new supply (issuer faucet)
    pub fn issue(&self, token: Address, to: Address, amount: U256) -> Result<(), AmmError> {
        let event = self.entry(token)?.ledger.lock().mint(to, amount)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), AmmError> {
        let event = self.entry(token)?.ledger.lock().approve(owner, spender, amount);
        self.events.emit(event);
        Ok(())
    }

    pub fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AmmError> {
        let event = self.entry(token)?.ledger.lock().transfer(from, to, amount)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AmmError> {
        let event = self
            .entry(token)?
            .ledger
            .lock()
            .transfer_from(spender, from, to, amount)?;
        self.events.emit(event);
        Ok(())
    }

    pub fn native_balance_of(&self, holder: Address) -> U256 {
        self.native.lock().get(&holder).copied().unwrap_or_default()
    }

    /// Credit native value (genesis faucet)
    pub fn credit_native(&self, holder: Address, amount: U256) -> Result<(), AmmError> {
        let mut native = self.native.lock();
        let balance = native.entry(holder).or_default();
        *balance = checked_add(*balance, amount)?;
        Ok(())
    }

    pub fn transfer_native(&self, from: Address, to: Address, amount: U256) -> Result<(), AmmError> {
        let mut native = self.native.lock();
        debit_native(&mut native, from, amount)?;
        let balance = native.entry(to).or_default();
        *balance = checked_add(*balance, amount)?;
        Ok(())
    }

    fn wrapped_entry(&self, token: Address) -> Result<Arc<TokenEntry>, AmmError> {
        let entry = self.entry(token)?;
        if entry.metadata.kind != TokenKind::WrappedNative {
            return Err(AmmError::NotWrappedNative(token));
        }
        Ok(entry)
    }

    /// Wrap `owner`'s native value into `token`
    pub fn deposit(&self, token: Address, owner: Address, amount: U256) -> Result<(), AmmError> {
        let entry = self.wrapped_entry(token)?;
        let mut ledger = entry.ledger.lock();
        let mut native = self.native.lock();

        let available = native.get(&owner).copied().unwrap_or_default();
        if available < amount {
            return Err(AmmError::InsufficientBalance {
                token: Address::zero(),
                holder: owner,
                available,
                required: amount,
            });
        }
        ledger.mint(owner, amount)?;
        native.insert(owner, available - amount);
        drop(native);
        drop(ledger);

        self.events.emit(AmmEvent::Deposit {
            token,
            owner,
            value: amount,
        });
        Ok(())
    }

    /// Unwrap `owner`'s `token` balance back into native value
    pub fn withdraw(&self, token: Address, owner: Address, amount: U256) -> Result<(), AmmError> {
        let entry = self.wrapped_entry(token)?;
        let mut ledger = entry.ledger.lock();
        let mut native = self.native.lock();

        ledger.burn(owner, amount)?;
        let balance = native.entry(owner).or_default();
        // Native supply only shrinks when wrapped, so re-crediting cannot overflow
        *balance = balance.saturating_add(amount);
        drop(native);
        drop(ledger);

        self.events.emit(AmmEvent::Withdrawal {
            token,
            owner,
            value: amount,
        });
        Ok(())
    }

    /// Fail with the error `execute` would report, without moving anything
    pub fn check(&self, spender: Address, movements: &[Movement]) -> Result<(), AmmError> {
        let entries = self.batch_entries(movements)?;
        let ledgers: BTreeMap<Address, MutexGuard<'_, TokenLedger>> = entries
            .iter()
            .map(|(token, entry)| (*token, entry.ledger.lock()))
            .collect();
        let native = self.native.lock();
        validate_batch(spender, movements, &ledgers, &native)
    }

    fn batch_entries(
        &self,
        movements: &[Movement],
    ) -> Result<BTreeMap<Address, Arc<TokenEntry>>, AmmError> {
        let involved: BTreeSet<Address> = movements.iter().map(Movement::token).collect();
        let entries = involved
            .iter()
            .map(|token| self.entry(*token).map(|entry| (*token, entry)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        for movement in movements {
            if let Movement::Wrap { token, .. } = movement {
                if entries[token].metadata.kind != TokenKind::WrappedNative {
                    return Err(AmmError::NotWrappedNative(*token));
                }
            }
        }
        Ok(entries)
    }

    /// Apply every movement or none.
    ///
    /// All involved ledgers are locked up front and every aggregate
    /// requirement (balances, allowances, native value) is checked before the
    /// first mutation.
    pub fn execute(&self, spender: Address, movements: &[Movement]) -> Result<(), AmmError> {
        let entries = self.batch_entries(movements)?;
        let mut ledgers: BTreeMap<Address, MutexGuard<'_, TokenLedger>> = entries
            .iter()
            .map(|(token, entry)| (*token, entry.ledger.lock()))
            .collect();
        let mut native = self.native.lock();
        validate_batch(spender, movements, &ledgers, &native)?;

        // Apply
        let mut emitted = Vec::with_capacity(movements.len() * 2);
        for movement in movements {
            match *movement {
                Movement::Pull {
                    token,
                    from,
                    to,
                    amount,
                } => {
                    let ledger = ledgers
                        .get_mut(&token)
                        .ok_or(AmmError::UnknownToken(token))?;
                    emitted.push(ledger.transfer_from(spender, from, to, amount)?);
                }
                Movement::Wrap {
                    token,
                    from,
                    to,
                    amount,
                } => {
                    debit_native(&mut native, from, amount)?;
                    let ledger = ledgers
                        .get_mut(&token)
                        .ok_or(AmmError::UnknownToken(token))?;
                    ledger.mint(to, amount)?;
                    emitted.push(AmmEvent::Deposit {
                        token,
                        owner: from,
                        value: amount,
                    });
                    emitted.push(AmmEvent::Transfer {
                        token,
                        from,
                        to,
                        value: amount,
                    });
                }
            }
        }
        drop(native);
        drop(ledgers);

        debug!(?spender, legs = movements.len(), "Executed bank batch");
        for event in emitted {
            self.events.emit(event);
        }
        Ok(())
    }
}

/// Check aggregated requirements of a batch against locked ledgers
fn validate_batch(
    spender: Address,
    movements: &[Movement],
    ledgers: &BTreeMap<Address, MutexGuard<'_, TokenLedger>>,
    native: &HashMap<Address, U256>,
) -> Result<(), AmmError> {
    let mut pulls: BTreeMap<(Address, Address), U256> = BTreeMap::new();
    let mut wraps: BTreeMap<Address, U256> = BTreeMap::new();
    let mut minted: BTreeMap<Address, U256> = BTreeMap::new();
    for movement in movements {
        match *movement {
            Movement::Pull {
                token, from, amount, ..
            } => {
                let total = pulls.entry((token, from)).or_default();
                *total = checked_add(*total, amount)?;
            }
            Movement::Wrap {
                token, from, amount, ..
            } => {
                let total = wraps.entry(from).or_default();
                *total = checked_add(*total, amount)?;
                let supply = minted.entry(token).or_default();
                *supply = checked_add(*supply, amount)?;
            }
        }
    }
    for ((token, from), amount) in &pulls {
        let ledger = &ledgers[token];
        ledger.ensure_allowance(*from, spender, *amount)?;
        ledger.ensure_balance(*from, *amount)?;
    }
    for (from, amount) in &wraps {
        let available = native.get(from).copied().unwrap_or_default();
        if available < *amount {
            return Err(AmmError::InsufficientBalance {
                token: Address::zero(),
                holder: *from,
                available,
                required: *amount,
            });
        }
    }
    for (token, amount) in &minted {
        checked_add(ledgers[token].total_supply(), *amount)?;
    }
    Ok(())
}

fn debit_native(
    native: &mut HashMap<Address, U256>,
    holder: Address,
    amount: U256,
) -> Result<(), AmmError> {
    let available = native.get(&holder).copied().unwrap_or_default();
    if available < amount {
        return Err(AmmError::InsufficientBalance {
            token: Address::zero(),
            holder,
            available,
            required: amount,
        });
    }
    native.insert(holder, available - amount);
    Ok(())
}

impl std::fmt::Debug for TokenBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBank")
            .field("tokens", &self.tokens.len())
            .finish()
    }
}
