//! # ward-ledger
//!
//! Funds, stock and the trading protocol for the ward economy.
//!
//! This crate provides:
//! - [`ResourceType`] and [`EmployeeRole`] - what is traded and who produces it
//! - [`CostTable`] - unit prices and salaries
//! - [`Ledger`] - an agent's funds and stock behind one exclusive lock
//! - [`Trader`] - the sell/buy capabilities every agent exposes to its peers
//!
//! ## Example
//!
//! ```rust
//! use ward_ledger::{CostTable, Ledger, ResourceType};
//!
//! let costs = CostTable::default();
//! let ledger = Ledger::with_funds(0, [ResourceType::Pill]);
//! ledger.restock(ResourceType::Pill, 5).unwrap();
//!
//! let price = costs.unit_cost(ResourceType::Pill);
//! let outcome = ledger.sell(ResourceType::Pill, 2, price);
//! assert_eq!(outcome.amount(), 2 * price);
//! assert_eq!(ledger.funds(), 2 * price);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod costs;
pub mod error;
pub mod ledger;
pub mod protocol;
pub mod resource;

pub use costs::CostTable;
pub use error::{LedgerError, Result};
pub use ledger::{Ledger, LedgerSnapshot, LedgerState, StockSnapshot};
pub use protocol::{AgentId, DeclineReason, TradeOutcome, Trader};
pub use resource::{EmployeeRole, ResourceType};
