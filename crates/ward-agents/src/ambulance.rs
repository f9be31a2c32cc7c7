//! Ambulance: pushes sick patients into hospitals.

use std::sync::Arc;

use rand::rngs::StdRng;
use tracing::{debug, error};
use ward_ledger::{
    AgentId, DeclineReason, Ledger, LedgerError, LedgerSnapshot, ResourceType, StockSnapshot,
    TradeOutcome, Trader,
};

use crate::error::Result;
use crate::runtime::{Agent, AgentEnv, AgentRole, Peers};

/// Ambulance counters, guarded by the ledger lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AmbulanceBooks {
    /// Patients handed over to hospitals.
    pub delivered: u64,
}

/// An agent that brings sick patients to hospitals.
#[derive(Debug)]
pub struct Ambulance {
    id: AgentId,
    ledger: Ledger<AmbulanceBooks>,
    hospitals: Peers,
    env: AgentEnv,
}

impl Ambulance {
    /// Create an ambulance carrying `patients` sick patients.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Ledger` if the initial load cannot be stored.
    pub fn new(id: AgentId, fund: i64, patients: u32, env: AgentEnv) -> Result<Self> {
        let ledger = Ledger::new(fund, [ResourceType::PatientSick], AmbulanceBooks::default());
        ledger.restock(ResourceType::PatientSick, patients)?;
        env.reporter.report_funds(id, fund);
        env.reporter.report_event(id, "Ambulance created");

        Ok(Self {
            id,
            ledger,
            hospitals: Peers::new("hospital"),
            env,
        })
    }

    /// Fix the hospitals this ambulance delivers to.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::LinksAlreadySet` on a second call.
    pub fn link_hospitals(&self, hospitals: &[Arc<dyn Trader>]) -> Result<()> {
        self.hospitals.set(self.id, hospitals, self.env.reporter.as_ref())
    }

    /// Patients still on board.
    #[must_use]
    pub fn patients_waiting(&self) -> u32 {
        self.ledger.read(|s| s.available(ResourceType::PatientSick))
    }

    /// Patients handed over so far.
    #[must_use]
    pub fn patients_delivered(&self) -> u64 {
        self.ledger.read(|s| s.extra.delivered)
    }

    /// Hand one patient to a random hospital.
    ///
    /// The patient leaves the ambulance before the hospital is called and is
    /// put back if the hospital declines.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors, which indicate a broken invariant.
    pub fn deliver(&self, rng: &mut StdRng) -> std::result::Result<TradeOutcome, LedgerError> {
        let Some(hospital) = self.hospitals.choose(rng) else {
            return Ok(TradeOutcome::Declined(DeclineReason::NotAccepted));
        };

        let detached = self.ledger.transact(|s| {
            if s.available(ResourceType::PatientSick) == 0 {
                return Ok(false);
            }
            s.remove_stock(ResourceType::PatientSick, 1)?;
            Ok::<_, LedgerError>(true)
        })?;
        if !detached {
            return Ok(TradeOutcome::Declined(DeclineReason::InsufficientStock));
        }

        let bill = self.env.costs.unit_cost(ResourceType::PatientSick);
        let outcome = hospital.buy(ResourceType::PatientSick, 1, bill);

        self.ledger.transact(|s| match outcome {
            TradeOutcome::Filled { amount } => {
                s.credit_funds(amount);
                s.extra.delivered += 1;
                Ok(())
            }
            TradeOutcome::Declined(_) => s.add_stock(ResourceType::PatientSick, 1),
        })?;

        match outcome {
            TradeOutcome::Filled { .. } => self.env.reporter.report_event(
                self.id,
                &format!("Delivered a sick patient to {}", hospital.id()),
            ),
            TradeOutcome::Declined(reason) => {
                debug!(agent = %self.id, hospital = %hospital.id(), reason = %reason, "Delivery refused");
            }
        }
        Ok(outcome)
    }
}

impl Trader for Ambulance {
    fn id(&self) -> AgentId {
        self.id
    }

    fn sell(&self, _kind: ResourceType, _qty: u32) -> TradeOutcome {
        TradeOutcome::Declined(DeclineReason::NotForSale)
    }

    fn stock_snapshot(&self) -> StockSnapshot {
        self.ledger.stock_snapshot()
    }

    fn funds(&self) -> i64 {
        self.ledger.funds()
    }
}

impl Agent for Ambulance {
    fn role(&self) -> AgentRole {
        AgentRole::Ambulance
    }

    fn env(&self) -> &AgentEnv {
        &self.env
    }

    fn check_links(&self) -> Result<()> {
        self.hospitals.require(self.id)
    }

    fn step(&self, rng: &mut StdRng) {
        if self.patients_waiting() > 0 {
            if let Err(err) = self.deliver(rng) {
                error!(agent = %self.id, error = %err, "Delivery failed");
            }
        }
        self.env.pacer.pause();
    }

    fn amount_paid_to_workers(&self) -> i64 {
        0
    }

    fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hospital::Hospital;
    use crate::runtime::agent_rng;

    fn linked(patients: u32, hospital_fund: i64, capacity: u32) -> (Ambulance, Arc<Hospital>) {
        let ambulance = Ambulance::new(AgentId(7), 0, patients, AgentEnv::quiet()).unwrap();
        let hospital = Arc::new(Hospital::new(AgentId(2), hospital_fund, capacity, 5, AgentEnv::quiet()));
        let peer: Arc<dyn Trader> = hospital.clone();
        ambulance.link_hospitals(&[peer]).unwrap();
        (ambulance, hospital)
    }

    #[test]
    fn test_delivery_is_paid_by_hospital() {
        let (ambulance, hospital) = linked(3, 100, 10);
        let mut rng = agent_rng(Some(2), ambulance.id());

        let outcome = ambulance.deliver(&mut rng).unwrap();

        assert_eq!(outcome, TradeOutcome::Filled { amount: 20 });
        assert_eq!(ambulance.funds(), 20);
        assert_eq!(ambulance.patients_waiting(), 2);
        assert_eq!(ambulance.patients_delivered(), 1);
        assert_eq!(hospital.funds(), 100 - 20 - 5);
        assert_eq!(hospital.occupied(), 1);
    }

    #[test]
    fn test_refused_patient_stays_on_board() {
        let (ambulance, hospital) = linked(2, 100, 0);
        let mut rng = agent_rng(Some(2), ambulance.id());

        let outcome = ambulance.deliver(&mut rng).unwrap();

        assert_eq!(
            outcome.decline_reason(),
            Some(DeclineReason::CapacityExceeded)
        );
        assert_eq!(ambulance.patients_waiting(), 2);
        assert_eq!(ambulance.funds(), 0);
        assert_eq!(hospital.funds(), 100);
    }

    #[test]
    fn test_empty_ambulance_does_nothing() {
        let (ambulance, hospital) = linked(0, 100, 10);
        let mut rng = agent_rng(Some(2), ambulance.id());
        let outcome = ambulance.deliver(&mut rng).unwrap();
        assert_eq!(
            outcome,
            TradeOutcome::Declined(DeclineReason::InsufficientStock)
        );
        assert_eq!(hospital.occupied(), 0);
    }

    #[test]
    fn test_requires_hospitals() {
        let ambulance = Ambulance::new(AgentId(7), 0, 1, AgentEnv::quiet()).unwrap();
        assert!(ambulance.check_links().is_err());
        assert_eq!(ambulance.amount_paid_to_workers(), 0);
    }
}
