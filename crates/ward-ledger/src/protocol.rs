//! The buy/sell trading protocol.
//!
//! Both primitives run as exactly one critical section on the callee's
//! ledger: the precondition checks and the mutation cannot be separated by
//! another thread. A trade that does not happen leaves the ledger untouched
//! and reports `Declined` with an amount of 0.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ledger::{Ledger, StockSnapshot};
use crate::resource::ResourceType;

/// Unique identifier of an agent in the economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent-{}", self.0)
    }
}

/// Why a trade did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    /// Quantity was zero.
    ZeroQuantity,
    /// The callee's ledger does not hold this resource.
    NotCarried,
    /// The callee holds the resource but does not trade it this way.
    NotForSale,
    /// Not enough units on hand.
    InsufficientStock,
    /// Not enough funds to pay.
    InsufficientFunds,
    /// No free capacity slots.
    CapacityExceeded,
    /// The proposed bill was not positive.
    InvalidBill,
    /// The callee does not accept inbound pushes.
    NotAccepted,
}

impl fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ZeroQuantity => "zero quantity",
            Self::NotCarried => "not carried",
            Self::NotForSale => "not for sale",
            Self::InsufficientStock => "insufficient stock",
            Self::InsufficientFunds => "insufficient funds",
            Self::CapacityExceeded => "capacity exceeded",
            Self::InvalidBill => "invalid bill",
            Self::NotAccepted => "not accepted",
        };
        f.write_str(text)
    }
}

/// Result of a `sell` or `buy` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeOutcome {
    /// The trade happened for `amount`.
    Filled {
        /// Price charged (sell) or bill accepted (buy). Always positive.
        amount: i64,
    },
    /// The trade did not happen.
    Declined(DeclineReason),
}

impl TradeOutcome {
    /// Amount moved, 0 when declined.
    #[must_use]
    pub const fn amount(&self) -> i64 {
        match self {
            Self::Filled { amount } => *amount,
            Self::Declined(_) => 0,
        }
    }

    /// Whether the trade happened.
    #[must_use]
    pub const fn is_filled(&self) -> bool {
        matches!(self, Self::Filled { .. })
    }

    /// The decline reason, if any.
    #[must_use]
    pub const fn decline_reason(&self) -> Option<DeclineReason> {
        match self {
            Self::Filled { .. } => None,
            Self::Declined(reason) => Some(*reason),
        }
    }
}

/// Capabilities every agent exposes to its trading partners.
pub trait Trader: Send + Sync {
    /// Stable identifier.
    fn id(&self) -> AgentId;

    /// Sell `qty` units of `kind` to the caller.
    fn sell(&self, kind: ResourceType, qty: u32) -> TradeOutcome;

    /// Accept a push of `qty` units of `kind`, paying `bill` plus own labor.
    fn buy(&self, _kind: ResourceType, _qty: u32, _bill: i64) -> TradeOutcome {
        TradeOutcome::Declined(DeclineReason::NotAccepted)
    }

    /// Point-in-time copy of the stock. May be stale by the time it is used.
    fn stock_snapshot(&self) -> StockSnapshot;

    /// Current funds.
    fn funds(&self) -> i64;
}

impl<E> Ledger<E> {
    /// Sell `qty` units of `kind` at `unit_price` each.
    ///
    /// On success the stock shrinks, funds grow by the price, and the price
    /// is returned.
    pub fn sell(&self, kind: ResourceType, qty: u32, unit_price: i64) -> TradeOutcome {
        self.sell_with(kind, qty, unit_price, |_, _| {})
    }

    /// Like [`Ledger::sell`], running `on_fill` on the extra state inside
    /// the same critical section when the sale happens.
    pub fn sell_with(
        &self,
        kind: ResourceType,
        qty: u32,
        unit_price: i64,
        on_fill: impl FnOnce(&mut E, u32),
    ) -> TradeOutcome {
        self.transact(|state| {
            if qty == 0 {
                return TradeOutcome::Declined(DeclineReason::ZeroQuantity);
            }
            if unit_price <= 0 {
                return TradeOutcome::Declined(DeclineReason::NotForSale);
            }
            let Ok(have) = state.quantity(kind) else {
                return TradeOutcome::Declined(DeclineReason::NotCarried);
            };
            if have < qty {
                return TradeOutcome::Declined(DeclineReason::InsufficientStock);
            }
            let price = unit_price.saturating_mul(i64::from(qty));
            if state.remove_stock(kind, qty).is_err() {
                return TradeOutcome::Declined(DeclineReason::InsufficientStock);
            }
            state.credit_funds(price);
            on_fill(&mut state.extra, qty);
            trace!(kind = %kind, qty, price, "sold");
            TradeOutcome::Filled { amount: price }
        })
    }

    /// Accept `qty` units of `kind`, paying `bill + labor`.
    ///
    /// A bill of zero or less is declined as `InvalidBill`, so a fill always
    /// reports a positive amount.
    ///
    /// `admit` runs inside the critical section after the funds check and
    /// may decline (for example on capacity). On success `on_fill` updates
    /// the extra state and `bill` is returned.
    pub fn buy_with(
        &self,
        kind: ResourceType,
        qty: u32,
        bill: i64,
        labor: i64,
        admit: impl FnOnce(&E, u32) -> Result<(), DeclineReason>,
        on_fill: impl FnOnce(&mut E, u32),
    ) -> TradeOutcome {
        self.transact(|state| {
            if qty == 0 {
                return TradeOutcome::Declined(DeclineReason::ZeroQuantity);
            }
            if bill <= 0 || labor < 0 {
                return TradeOutcome::Declined(DeclineReason::InvalidBill);
            }
            if !state.holds(kind) {
                return TradeOutcome::Declined(DeclineReason::NotCarried);
            }
            let total = bill.saturating_add(labor);
            if state.funds() < total {
                return TradeOutcome::Declined(DeclineReason::InsufficientFunds);
            }
            if let Err(reason) = admit(&state.extra, qty) {
                return TradeOutcome::Declined(reason);
            }
            if state.add_stock(kind, qty).is_err() {
                return TradeOutcome::Declined(DeclineReason::CapacityExceeded);
            }
            state.debit_funds(total);
            on_fill(&mut state.extra, qty);
            trace!(kind = %kind, qty, bill, labor, "bought");
            TradeOutcome::Filled { amount: bill }
        })
    }
}
