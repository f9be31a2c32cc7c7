//! Hospital: a capacity-bounded receiver and dispatcher of patients.
//!
//! Beds are taken by sick patients pushed in by ambulances and by healed
//! patients pulled from clinics; they are freed by discharges and by sick
//! patients sold on to clinics. Every failed check just defers the work to
//! a later iteration.

use std::sync::Arc;

use rand::rngs::StdRng;
use tracing::{debug, error};
use ward_ledger::{
    AgentId, DeclineReason, EmployeeRole, Ledger, LedgerError, LedgerSnapshot, ResourceType,
    StockSnapshot, TradeOutcome, Trader,
};

use crate::error::Result;
use crate::runtime::{Agent, AgentEnv, AgentRole, Peers};
use crate::settlement::{Order, purchase};

/// Hospital counters, guarded by the ledger lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HospitalBooks {
    /// Total beds.
    pub capacity: u32,
    /// Beds in use, including beds held for an in-flight transfer.
    pub occupied: u32,
    /// Sick patients accepted through `buy`.
    pub admitted: u64,
    /// Healed patients pulled from clinics.
    pub transferred_in: u64,
    /// Healed patients sent home.
    pub discharged: u64,
    /// Iterations since the last discharge.
    pub since_discharge: u32,
}

impl HospitalBooks {
    fn free_beds(&self) -> u32 {
        self.capacity.saturating_sub(self.occupied)
    }
}

/// A hospital agent.
#[derive(Debug)]
pub struct Hospital {
    id: AgentId,
    discharge_interval: u32,
    ledger: Ledger<HospitalBooks>,
    clinics: Peers,
    env: AgentEnv,
}

impl Hospital {
    /// Create a hospital with `capacity` beds.
    ///
    /// At most one patient is discharged every `discharge_interval`
    /// iterations; an interval of 0 is treated as 1.
    #[must_use]
    pub fn new(id: AgentId, fund: i64, capacity: u32, discharge_interval: u32, env: AgentEnv) -> Self {
        let books = HospitalBooks {
            capacity,
            ..HospitalBooks::default()
        };
        let ledger = Ledger::new(
            fund,
            [ResourceType::PatientSick, ResourceType::PatientHealed],
            books,
        );
        env.reporter.report_funds(id, fund);
        env.reporter.report_event(id, "Hospital created");

        Self {
            id,
            discharge_interval: discharge_interval.max(1),
            ledger,
            clinics: Peers::new("clinic"),
            env,
        }
    }

    /// Fix the clinics this hospital pulls healed patients from.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::LinksAlreadySet` on a second call.
    pub fn link_clinics(&self, clinics: &[Arc<dyn Trader>]) -> Result<()> {
        self.clinics.set(self.id, clinics, self.env.reporter.as_ref())
    }

    /// Linked clinics.
    #[must_use]
    pub const fn clinics(&self) -> &Peers {
        &self.clinics
    }

    /// Total beds.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.ledger.read(|s| s.extra.capacity)
    }

    /// Beds in use.
    #[must_use]
    pub fn occupied(&self) -> u32 {
        self.ledger.read(|s| s.extra.occupied)
    }

    /// Sick patients admitted so far.
    #[must_use]
    pub fn patients_admitted(&self) -> u64 {
        self.ledger.read(|s| s.extra.admitted)
    }

    /// Healed patients transferred in from clinics so far.
    #[must_use]
    pub fn patients_transferred(&self) -> u64 {
        self.ledger.read(|s| s.extra.transferred_in)
    }

    /// Patients discharged so far.
    #[must_use]
    pub fn patients_discharged(&self) -> u64 {
        self.ledger.read(|s| s.extra.discharged)
    }

    /// Patients currently in beds plus everyone discharged.
    #[must_use]
    pub fn number_of_patients(&self) -> u64 {
        self.ledger.read(|s| {
            u64::from(s.available(ResourceType::PatientSick))
                + u64::from(s.available(ResourceType::PatientHealed))
                + s.extra.discharged
        })
    }

    /// Pull healed patients from one random clinic.
    ///
    /// Reads the clinic's advertised stock, then buys one patient at a time
    /// until the clinic runs out or this hospital runs out of beds or funds.
    /// Returns the number of patients transferred.
    pub fn intake_from_clinics(&self, rng: &mut StdRng) -> u32 {
        let Some(clinic) = self.clinics.choose(rng) else {
            return 0;
        };
        let advertised = clinic
            .stock_snapshot()
            .get(&ResourceType::PatientHealed)
            .copied()
            .unwrap_or(0);

        let nurse = self.env.costs.salary(EmployeeRole::Nurse);
        let order = Order {
            buyer: self.id,
            kind: ResourceType::PatientHealed,
            qty: 1,
            reserve: self
                .env
                .costs
                .unit_cost(ResourceType::PatientHealed)
                .saturating_add(nurse),
        };

        let mut transferred = 0;
        for _ in 0..advertised {
            let result = purchase(
                &self.ledger,
                clinic.as_ref(),
                order,
                |state| {
                    if state.extra.free_beds() == 0 {
                        return Err(DeclineReason::CapacityExceeded);
                    }
                    state.extra.occupied += 1;
                    Ok(())
                },
                |state, outcome| {
                    if outcome.is_filled() {
                        state.debit_funds(nurse);
                        state.extra.transferred_in += 1;
                    } else {
                        state.extra.occupied = state.extra.occupied.saturating_sub(1);
                    }
                },
            );

            match result {
                Ok(TradeOutcome::Filled { amount }) => {
                    transferred += 1;
                    self.env.reporter.report_event(
                        self.id,
                        &format!("Transferred a healed patient from {} for {amount}", clinic.id()),
                    );
                }
                Ok(TradeOutcome::Declined(reason)) => {
                    debug!(agent = %self.id, clinic = %clinic.id(), reason = %reason, "Intake stopped");
                    break;
                }
                Err(err) => {
                    error!(agent = %self.id, error = %err, "Intake failed");
                    break;
                }
            }
        }
        transferred
    }

    /// Advance the discharge timer and send one healed patient home when it
    /// is due.
    ///
    /// Returns whether a patient was discharged.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors, which indicate a broken invariant.
    pub fn discharge(&self) -> std::result::Result<bool, LedgerError> {
        let discharged = self.ledger.transact(|s| {
            s.extra.since_discharge = s.extra.since_discharge.saturating_add(1);
            if s.extra.since_discharge < self.discharge_interval
                || s.available(ResourceType::PatientHealed) == 0
            {
                return Ok(false);
            }
            s.remove_stock(ResourceType::PatientHealed, 1)?;
            s.extra.occupied = s.extra.occupied.saturating_sub(1);
            s.extra.discharged += 1;
            s.extra.since_discharge = 0;
            Ok::<_, LedgerError>(true)
        })?;

        if discharged {
            self.env
                .reporter
                .report_event(self.id, "Hospital discharged a healed patient");
        }
        Ok(discharged)
    }
}

impl Trader for Hospital {
    fn id(&self) -> AgentId {
        self.id
    }

    fn sell(&self, kind: ResourceType, qty: u32) -> TradeOutcome {
        if kind != ResourceType::PatientSick {
            return TradeOutcome::Declined(DeclineReason::NotForSale);
        }
        let price = self.env.costs.unit_cost(kind);
        self.ledger.sell_with(kind, qty, price, |books, qty| {
            books.occupied = books.occupied.saturating_sub(qty);
        })
    }

    fn buy(&self, kind: ResourceType, qty: u32, bill: i64) -> TradeOutcome {
        if kind != ResourceType::PatientSick {
            return TradeOutcome::Declined(DeclineReason::NotForSale);
        }
        let labor = self
            .env
            .costs
            .salary(EmployeeRole::Nurse)
            .saturating_mul(i64::from(qty));

        let outcome = self.ledger.buy_with(
            kind,
            qty,
            bill,
            labor,
            |books, qty| {
                if books.free_beds() < qty {
                    Err(DeclineReason::CapacityExceeded)
                } else {
                    Ok(())
                }
            },
            |books, qty| {
                books.occupied += qty;
                books.admitted += u64::from(qty);
            },
        );

        if outcome.is_filled() {
            self.env
                .reporter
                .report_event(self.id, &format!("Hospital admitted {qty} sick patient(s)"));
        }
        outcome
    }

    fn stock_snapshot(&self) -> StockSnapshot {
        self.ledger.stock_snapshot()
    }

    fn funds(&self) -> i64 {
        self.ledger.funds()
    }
}

impl Agent for Hospital {
    fn role(&self) -> AgentRole {
        AgentRole::Hospital
    }

    fn env(&self) -> &AgentEnv {
        &self.env
    }

    fn check_links(&self) -> Result<()> {
        self.clinics.require(self.id)
    }

    fn step(&self, rng: &mut StdRng) {
        self.intake_from_clinics(rng);
        if let Err(err) = self.discharge() {
            error!(agent = %self.id, error = %err, "Discharge failed");
        }
        self.env.pacer.pause();
    }

    fn amount_paid_to_workers(&self) -> i64 {
        let handled = self.ledger.read(|s| s.extra.admitted + s.extra.transferred_in);
        i64::try_from(handled)
            .unwrap_or(i64::MAX)
            .saturating_mul(self.env.costs.salary(EmployeeRole::Nurse))
    }

    fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }
}
