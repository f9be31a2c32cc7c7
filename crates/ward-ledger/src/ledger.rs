//! Per-agent funds and stock behind one exclusive lock.
//!
//! A [`Ledger`] never hands out references into its state. Callers either run
//! a closure inside the critical section ([`Ledger::transact`]) or take a
//! point-in-time copy ([`Ledger::snapshot`]). The closure form keeps every
//! critical section short and makes it impossible to wait on another ledger
//! while this one is held, unless the closure itself does so.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};
use crate::resource::ResourceType;

/// Point-in-time copy of a ledger's stock.
pub type StockSnapshot = BTreeMap<ResourceType, u32>;

/// Point-in-time copy of a ledger's funds and stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Funds at the time of the snapshot.
    pub funds: i64,
    /// Stock at the time of the snapshot.
    pub stock: StockSnapshot,
}

impl LedgerSnapshot {
    /// Quantity of `kind`, 0 when the ledger does not hold it.
    #[must_use]
    pub fn quantity(&self, kind: ResourceType) -> u32 {
        self.stock.get(&kind).copied().unwrap_or(0)
    }
}

/// The state guarded by a [`Ledger`]'s lock.
///
/// `extra` carries agent-specific counters so they change atomically with
/// funds and stock.
#[derive(Debug)]
pub struct LedgerState<E = ()> {
    funds: i64,
    stock: BTreeMap<ResourceType, u32>,
    /// Agent-specific bookkeeping guarded by the same lock.
    pub extra: E,
}

impl<E> LedgerState<E> {
    /// Current funds.
    #[must_use]
    pub const fn funds(&self) -> i64 {
        self.funds
    }

    /// Add `amount` to funds.
    pub fn credit_funds(&mut self, amount: i64) {
        self.funds = self.funds.saturating_add(amount);
    }

    /// Remove `amount` from funds unconditionally. Funds may go negative.
    pub fn debit_funds(&mut self, amount: i64) {
        self.funds = self.funds.saturating_sub(amount);
    }

    /// Remove `amount` from funds only if they cover it.
    ///
    /// Returns whether the debit happened.
    pub fn try_debit_funds(&mut self, amount: i64) -> bool {
        if amount < 0 || self.funds < amount {
            return false;
        }
        self.funds -= amount;
        true
    }

    /// Whether this ledger was configured with `kind`.
    #[must_use]
    pub fn holds(&self, kind: ResourceType) -> bool {
        self.stock.contains_key(&kind)
    }

    /// Quantity of `kind` on hand.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownResource` if the ledger does not hold `kind`.
    pub fn quantity(&self, kind: ResourceType) -> Result<u32> {
        self.stock
            .get(&kind)
            .copied()
            .ok_or(LedgerError::unknown_resource(kind))
    }

    /// Quantity of `kind` on hand, 0 when the ledger does not hold it.
    #[must_use]
    pub fn available(&self, kind: ResourceType) -> u32 {
        self.stock.get(&kind).copied().unwrap_or(0)
    }

    /// Add `qty` units of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownResource` if the ledger does not hold
    /// `kind`, or `LedgerError::StockOverflow` if the count would overflow.
    pub fn add_stock(&mut self, kind: ResourceType, qty: u32) -> Result<()> {
        let slot = self
            .stock
            .get_mut(&kind)
            .ok_or(LedgerError::unknown_resource(kind))?;
        *slot = slot
            .checked_add(qty)
            .ok_or(LedgerError::StockOverflow { kind })?;
        Ok(())
    }

    /// Remove `qty` units of `kind`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownResource` if the ledger does not hold
    /// `kind`, or `LedgerError::InsufficientStock` if fewer than `qty` are on
    /// hand. The stock is unchanged on error.
    pub fn remove_stock(&mut self, kind: ResourceType, qty: u32) -> Result<()> {
        let slot = self
            .stock
            .get_mut(&kind)
            .ok_or(LedgerError::unknown_resource(kind))?;
        if *slot < qty {
            return Err(LedgerError::insufficient_stock(kind, *slot, qty));
        }
        *slot -= qty;
        Ok(())
    }

    /// Copy of the stock mapping.
    #[must_use]
    pub fn stock(&self) -> StockSnapshot {
        self.stock.clone()
    }

    /// Copy of funds and stock.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            funds: self.funds,
            stock: self.stock.clone(),
        }
    }
}

/// An agent's funds and stock, serialized by one lock.
#[derive(Debug)]
pub struct Ledger<E = ()> {
    state: Mutex<LedgerState<E>>,
}

impl Ledger<()> {
    /// Create a ledger with no extra bookkeeping.
    #[must_use]
    pub fn with_funds(funds: i64, kinds: impl IntoIterator<Item = ResourceType>) -> Self {
        Self::new(funds, kinds, ())
    }
}

impl<E> Ledger<E> {
    /// Create a ledger holding `kinds` at zero stock.
    ///
    /// The set of held resources is fixed for the ledger's lifetime.
    #[must_use]
    pub fn new(funds: i64, kinds: impl IntoIterator<Item = ResourceType>, extra: E) -> Self {
        let stock = kinds.into_iter().map(|kind| (kind, 0)).collect();
        Self {
            state: Mutex::new(LedgerState {
                funds,
                stock,
                extra,
            }),
        }
    }

    /// Run `f` inside the critical section.
    ///
    /// `f` must not call into another agent's ledger.
    pub fn transact<R>(&self, f: impl FnOnce(&mut LedgerState<E>) -> R) -> R {
        let mut state = self.state.lock();
        f(&mut state)
    }

    /// Run a read-only `f` inside the critical section.
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState<E>) -> R) -> R {
        let state = self.state.lock();
        f(&state)
    }

    /// Add `qty` units of `kind` in one critical section.
    ///
    /// # Errors
    ///
    /// See [`LedgerState::add_stock`].
    pub fn restock(&self, kind: ResourceType, qty: u32) -> Result<()> {
        self.transact(|state| state.add_stock(kind, qty))
    }

    /// Current funds.
    #[must_use]
    pub fn funds(&self) -> i64 {
        self.read(LedgerState::funds)
    }

    /// Point-in-time copy of the stock.
    #[must_use]
    pub fn stock_snapshot(&self) -> StockSnapshot {
        self.read(LedgerState::stock)
    }

    /// Point-in-time copy of funds and stock.
    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.read(LedgerState::snapshot)
    }
}
