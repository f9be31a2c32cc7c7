//! Error types for ledger operations.

use thiserror::Error;

use crate::resource::ResourceType;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by ledger mutators.
///
/// These are programming errors, not trade failures. A trade that simply does
/// not happen is a [`crate::TradeOutcome::Declined`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger was not configured to hold this resource.
    #[error("ledger does not hold {kind}")]
    UnknownResource {
        /// The resource that was addressed.
        kind: ResourceType,
    },

    /// A stock decrement would take the quantity below zero.
    #[error("insufficient {kind}: have {have}, need {need}")]
    InsufficientStock {
        /// The resource that was addressed.
        kind: ResourceType,
        /// Quantity on hand.
        have: u32,
        /// Quantity requested.
        need: u32,
    },

    /// A stock increment would overflow the quantity counter.
    #[error("stock overflow for {kind}")]
    StockOverflow {
        /// The resource that was addressed.
        kind: ResourceType,
    },

    /// A cost table entry is missing or not strictly positive.
    #[error("invalid cost: {0}")]
    InvalidCost(String),
}

impl LedgerError {
    /// Create an unknown resource error.
    #[must_use]
    pub const fn unknown_resource(kind: ResourceType) -> Self {
        Self::UnknownResource { kind }
    }

    /// Create an insufficient stock error.
    #[must_use]
    pub const fn insufficient_stock(kind: ResourceType, have: u32, need: u32) -> Self {
        Self::InsufficientStock { kind, have, need }
    }
}
