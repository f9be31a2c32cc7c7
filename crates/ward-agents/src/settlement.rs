//! Buyer side of a purchase.
//!
//! A buyer never holds its own lock while calling a seller. The purchase is
//! split into three short critical sections:
//!
//! 1. **Reserve** (buyer lock): check funds, run the caller's admission
//!    hook, move the reservation out of the buyer's funds.
//! 2. **Trade** (seller lock only): `seller.sell(kind, qty)`.
//! 3. **Settle** (buyer lock): on a fill, refund the unspent part of the
//!    reservation and credit the stock; on a decline, refund everything.
//!
//! Money in a reservation is in flight and belongs to nobody until step 3,
//! so conservation only holds at quiescent points.

use tracing::{debug, error, warn};
use ward_ledger::{
    AgentId, DeclineReason, Ledger, LedgerError, LedgerState, ResourceType, TradeOutcome, Trader,
};

/// What to buy and how much to set aside for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Order {
    pub(crate) buyer: AgentId,
    pub(crate) kind: ResourceType,
    pub(crate) qty: u32,
    pub(crate) reserve: i64,
}

enum Reservation {
    Held,
    Declined(DeclineReason),
    Invalid(LedgerError),
}

/// Buy `order` from `seller` without ever nesting locks.
///
/// `admit` runs in the reserve section and may decline or take a hold on
/// the buyer's own bookkeeping (for example a bed). `settle` runs in the
/// settle section with the seller's outcome and must undo any hold on a
/// decline.
///
/// # Errors
///
/// Returns `LedgerError::UnknownResource` before calling the seller if the
/// buyer's ledger does not hold `order.kind`. Returns
/// `LedgerError::StockOverflow` if the bought units do not fit; the seller
/// keeps the payment and `settle` runs as for a decline.
pub(crate) fn purchase<E>(
    ledger: &Ledger<E>,
    seller: &dyn Trader,
    order: Order,
    admit: impl FnOnce(&mut LedgerState<E>) -> Result<(), DeclineReason>,
    settle: impl FnOnce(&mut LedgerState<E>, TradeOutcome),
) -> Result<TradeOutcome, LedgerError> {
    let reserved = ledger.transact(|state| {
        if !state.holds(order.kind) {
            return Reservation::Invalid(LedgerError::unknown_resource(order.kind));
        }
        if state.funds() < order.reserve {
            return Reservation::Declined(DeclineReason::InsufficientFunds);
        }
        if let Err(reason) = admit(state) {
            return Reservation::Declined(reason);
        }
        state.debit_funds(order.reserve);
        Reservation::Held
    });
    match reserved {
        Reservation::Held => {}
        Reservation::Declined(reason) => return Ok(TradeOutcome::Declined(reason)),
        Reservation::Invalid(err) => return Err(err),
    }

    let outcome = seller.sell(order.kind, order.qty);

    ledger.transact(|state| {
        match outcome {
            TradeOutcome::Filled { amount } => {
                if amount > order.reserve {
                    warn!(
                        buyer = %order.buyer,
                        seller = %seller.id(),
                        kind = %order.kind,
                        amount,
                        reserve = order.reserve,
                        "Seller charged more than reserved"
                    );
                }
                state.credit_funds(order.reserve - amount);
                if let Err(err) = state.add_stock(order.kind, order.qty) {
                    // The seller has been paid; only the holds can be undone.
                    error!(buyer = %order.buyer, seller = %seller.id(), kind = %order.kind, error = %err, "Purchased units could not be stocked");
                    settle(state, TradeOutcome::Declined(DeclineReason::CapacityExceeded));
                    return Err(err);
                }
                debug!(buyer = %order.buyer, seller = %seller.id(), kind = %order.kind, amount, "Purchase filled");
            }
            TradeOutcome::Declined(reason) => {
                state.credit_funds(order.reserve);
                debug!(buyer = %order.buyer, seller = %seller.id(), kind = %order.kind, reason = %reason, "Purchase declined");
            }
        }
        settle(state, outcome);
        Ok(outcome)
    })
}
