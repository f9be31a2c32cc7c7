//! # ward-agents
//!
//! Autonomous agents trading over [`ward_ledger`] ledgers, one thread each.
//!
//! ## Agents
//!
//! - [`Supplier`] - produces raw materials and sells them to clinics
//! - [`Hospital`] - admits sick patients, pulls healed ones from clinics, discharges
//! - [`Clinic`] - buys patients and materials, sells healed patients
//! - [`Ambulance`] - pushes sick patients into hospitals
//!
//! ## Runtime
//!
//! - [`Economy`] - builds every agent from a [`SimConfig`], wires the trading
//!   graph, runs and audits it
//! - [`Reporter`] and [`Pacer`] - injected sinks and delays
//!
//! No agent ever holds its own lock while calling another agent, so the
//! trading graph can contain cycles without deadlocking.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ward_agents::{Catalogue, Economy, NoDelay, NullReporter, SimConfig, Specialty};
//!
//! let config = SimConfig::builder()
//!     .seed(1)
//!     .supplier(500, Catalogue::Pharmacy)
//!     .supplier(500, Catalogue::MedicalDevices)
//!     .hospital(1_000, 10, 5)
//!     .clinic(400, Specialty::Neurology)
//!     .ambulance(0, 25)
//!     .build();
//!
//! let economy = Economy::build(&config, Arc::new(NullReporter), Arc::new(NoDelay)).unwrap();
//! let audit = economy.run_for(Duration::from_millis(20)).unwrap();
//! assert!(audit.is_conserved());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ambulance;
pub mod clinic;
pub mod config;
pub mod economy;
pub mod error;
pub mod hospital;
pub mod pacing;
pub mod reporter;
pub mod runtime;
mod settlement;
pub mod supplier;

// Re-export main types
pub use ambulance::{Ambulance, AmbulanceBooks};
pub use clinic::{Clinic, ClinicBooks, ClinicState, Specialty};
pub use config::{
    AmbulanceConfig, ClinicConfig, HospitalConfig, SimConfig, SimConfigBuilder, SupplierConfig,
};
pub use economy::{AgentAudit, Economy, EconomyAudit};
pub use error::{AgentError, ConfigError, Result};
pub use hospital::{Hospital, HospitalBooks};
pub use pacing::{CountingPacer, NoDelay, Pacer, PacingConfig, RandomPacer};
pub use reporter::{NullReporter, RecordedEvent, RecordingReporter, Reporter, TracingReporter};
pub use runtime::{Agent, AgentEnv, AgentHandle, AgentRole, Peers, agent_rng, run_loop};
pub use supplier::{Catalogue, Supplier, SupplierBooks};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::SimConfig;
    pub use crate::economy::{Economy, EconomyAudit};
    pub use crate::error::{AgentError, Result};
    pub use crate::pacing::{NoDelay, Pacer};
    pub use crate::reporter::{Reporter, TracingReporter};
    pub use crate::runtime::{Agent, AgentRole};
    pub use ward_ledger::{AgentId, ResourceType, TradeOutcome, Trader};
}
