//! Supplier: a pure producer of raw materials.
//!
//! Each iteration the supplier picks one material from its catalogue and,
//! if it can pay the worker, produces one unit. Lack of funds just skips the
//! iteration; there is no queue and no retry counter.

use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use ward_ledger::{
    AgentId, EmployeeRole, Ledger, LedgerError, LedgerSnapshot, ResourceType, StockSnapshot,
    TradeOutcome, Trader,
};

use crate::error::{AgentError, Result};
use crate::runtime::{Agent, AgentEnv, AgentRole};

/// Which materials a supplier produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Catalogue {
    /// Syringes and pills.
    Pharmacy,
    /// Scalpels, thermometers and stethoscopes.
    MedicalDevices,
    /// An explicit list of materials.
    Custom(Vec<ResourceType>),
}

impl Catalogue {
    /// Materials in this catalogue.
    #[must_use]
    pub fn resources(&self) -> Vec<ResourceType> {
        match self {
            Self::Pharmacy => vec![ResourceType::Syringe, ResourceType::Pill],
            Self::MedicalDevices => vec![
                ResourceType::Scalpel,
                ResourceType::Thermometer,
                ResourceType::Stethoscope,
            ],
            Self::Custom(resources) => resources.clone(),
        }
    }
}

impl fmt::Display for Catalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pharmacy => write!(f, "pharmacy"),
            Self::MedicalDevices => write!(f, "medical devices"),
            Self::Custom(resources) => write!(f, "custom ({} items)", resources.len()),
        }
    }
}

/// Supplier counters, guarded by the ledger lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SupplierBooks {
    /// Units produced (each paid one salary).
    pub produced: u64,
    /// Units sold.
    pub supplied: u64,
}

/// A producer of raw materials.
#[derive(Debug)]
pub struct Supplier {
    id: AgentId,
    resources: Vec<ResourceType>,
    ledger: Ledger<SupplierBooks>,
    env: AgentEnv,
}

impl Supplier {
    /// Create a supplier producing `resources`.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidResources` if the list is empty or names a
    /// patient state.
    pub fn new(id: AgentId, fund: i64, resources: Vec<ResourceType>, env: AgentEnv) -> Result<Self> {
        if resources.is_empty() {
            return Err(AgentError::invalid_resources(id, "supplier catalogue is empty"));
        }
        if let Some(kind) = resources.iter().find(|k| k.is_patient()) {
            return Err(AgentError::invalid_resources(
                id,
                format!("suppliers cannot produce {kind}"),
            ));
        }

        let ledger = Ledger::new(fund, resources.iter().copied(), SupplierBooks::default());
        env.reporter.report_funds(id, fund);
        env.reporter.report_event(id, "Supplier created");

        Ok(Self {
            id,
            resources,
            ledger,
            env,
        })
    }

    /// Create a supplier from a named catalogue.
    ///
    /// # Errors
    ///
    /// See [`Supplier::new`].
    pub fn with_catalogue(id: AgentId, fund: i64, catalogue: &Catalogue, env: AgentEnv) -> Result<Self> {
        Self::new(id, fund, catalogue.resources(), env)
    }

    /// Materials this supplier produces.
    #[must_use]
    pub fn resources_supplied(&self) -> &[ResourceType] {
        &self.resources
    }

    /// Sum of one unit price of every material produced.
    #[must_use]
    pub fn material_cost(&self) -> i64 {
        self.resources
            .iter()
            .map(|kind| self.env.costs.unit_cost(*kind))
            .sum()
    }

    /// Units sold so far.
    #[must_use]
    pub fn quantity_supplied(&self) -> u64 {
        self.ledger.read(|s| s.extra.supplied)
    }

    /// Units produced so far.
    #[must_use]
    pub fn quantity_produced(&self) -> u64 {
        self.ledger.read(|s| s.extra.produced)
    }

    /// Produce one unit of `kind` if the worker can be paid.
    ///
    /// The simulated production delay happens outside the lock. Returns
    /// whether a unit was produced.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::UnknownResource` if `kind` is not in the
    /// catalogue.
    pub fn produce(&self, kind: ResourceType) -> std::result::Result<bool, LedgerError> {
        let labor = self.env.costs.labor_cost(kind);
        let affordable = self.ledger.read(|s| {
            s.quantity(kind)?;
            Ok::<_, LedgerError>(s.funds() >= labor)
        })?;
        if !affordable {
            debug!(agent = %self.id, kind = %kind, labor, "Cannot pay worker, skipping");
            return Ok(false);
        }

        self.env.pacer.pause();

        self.ledger.transact(|s| {
            if s.funds() < labor {
                return Ok(false);
            }
            s.add_stock(kind, 1)?;
            s.debit_funds(labor);
            s.extra.produced += 1;
            Ok(true)
        })
    }
}

impl Trader for Supplier {
    fn id(&self) -> AgentId {
        self.id
    }

    fn sell(&self, kind: ResourceType, qty: u32) -> TradeOutcome {
        let price = self.env.costs.unit_cost(kind);
        self.ledger
            .sell_with(kind, qty, price, |books, qty| books.supplied += u64::from(qty))
    }

    fn stock_snapshot(&self) -> StockSnapshot {
        self.ledger.stock_snapshot()
    }

    fn funds(&self) -> i64 {
        self.ledger.funds()
    }
}

impl Agent for Supplier {
    fn role(&self) -> AgentRole {
        AgentRole::Supplier
    }

    fn env(&self) -> &AgentEnv {
        &self.env
    }

    fn check_links(&self) -> Result<()> {
        Ok(())
    }

    fn step(&self, rng: &mut StdRng) {
        let Some(&kind) = self.resources.choose(rng) else {
            return;
        };
        match self.produce(kind) {
            Ok(true) => {}
            // A skipped unit still costs one delay.
            Ok(false) => self.env.pacer.pause(),
            Err(err) => {
                error!(agent = %self.id, kind = %kind, error = %err, "Production failed");
                self.env.pacer.pause();
            }
        }
    }

    fn amount_paid_to_workers(&self) -> i64 {
        let produced = i64::try_from(self.quantity_produced()).unwrap_or(i64::MAX);
        produced.saturating_mul(self.env.costs.salary(EmployeeRole::Supplier))
    }

    fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }
}
