//! Clinic: buys sick patients and materials, sells healed patients.

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use ward_ledger::{
    AgentId, DeclineReason, EmployeeRole, Ledger, LedgerError, LedgerSnapshot, ResourceType,
    StockSnapshot, TradeOutcome, Trader,
};

use crate::error::{AgentError, Result};
use crate::runtime::{Agent, AgentEnv, AgentRole, Peers};
use crate::settlement::{Order, purchase};

/// Medical specialty, which fixes the materials a treatment consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    /// Pills and thermometers.
    Pulmonology,
    /// Syringes and stethoscopes.
    Cardiology,
    /// Pills and scalpels.
    Neurology,
}

impl Specialty {
    /// All specialties.
    pub const ALL: [Self; 3] = [Self::Pulmonology, Self::Cardiology, Self::Neurology];

    /// Resources consumed by one treatment, sick patient first.
    #[must_use]
    pub fn required_resources(self) -> Vec<ResourceType> {
        let materials = match self {
            Self::Pulmonology => [ResourceType::Pill, ResourceType::Thermometer],
            Self::Cardiology => [ResourceType::Syringe, ResourceType::Stethoscope],
            Self::Neurology => [ResourceType::Pill, ResourceType::Scalpel],
        };
        let mut required = vec![ResourceType::PatientSick];
        required.extend(materials);
        required
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pulmonology => write!(f, "pulmonology"),
            Self::Cardiology => write!(f, "cardiology"),
            Self::Neurology => write!(f, "neurology"),
        }
    }
}

/// Whether a clinic can treat right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClinicState {
    /// Every required resource is in stock.
    Ready,
    /// At least one required resource is missing.
    Short,
}

/// Clinic counters, guarded by the ledger lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClinicBooks {
    /// Patients healed so far.
    pub treated: u64,
}

/// A clinic agent.
#[derive(Debug)]
pub struct Clinic {
    id: AgentId,
    required: Vec<ResourceType>,
    ledger: Ledger<ClinicBooks>,
    hospitals: Peers,
    suppliers: Peers,
    env: AgentEnv,
}

impl Clinic {
    /// Create a clinic consuming `required` per treatment.
    ///
    /// A sick patient is always required; it is added when missing and
    /// duplicates are dropped.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::InvalidResources` if the list names a healed
    /// patient.
    pub fn new(id: AgentId, fund: i64, required: Vec<ResourceType>, env: AgentEnv) -> Result<Self> {
        if required.contains(&ResourceType::PatientHealed) {
            return Err(AgentError::invalid_resources(
                id,
                "a clinic cannot consume healed patients",
            ));
        }

        let mut list = vec![ResourceType::PatientSick];
        for kind in required {
            if !list.contains(&kind) {
                list.push(kind);
            }
        }

        let kinds = list
            .iter()
            .copied()
            .chain(std::iter::once(ResourceType::PatientHealed));
        let ledger = Ledger::new(fund, kinds, ClinicBooks::default());
        env.reporter.report_funds(id, fund);
        env.reporter.report_event(id, "Clinic created");

        Ok(Self {
            id,
            required: list,
            ledger,
            hospitals: Peers::new("hospital"),
            suppliers: Peers::new("supplier"),
            env,
        })
    }

    /// Create a clinic for a specialty.
    ///
    /// # Errors
    ///
    /// See [`Clinic::new`].
    pub fn from_specialty(id: AgentId, fund: i64, specialty: Specialty, env: AgentEnv) -> Result<Self> {
        Self::new(id, fund, specialty.required_resources(), env)
    }

    /// Fix the hospitals and suppliers this clinic buys from.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::LinksAlreadySet` on a second call.
    pub fn link(&self, hospitals: &[Arc<dyn Trader>], suppliers: &[Arc<dyn Trader>]) -> Result<()> {
        let reporter = self.env.reporter.as_ref();
        self.hospitals.set(self.id, hospitals, reporter)?;
        self.suppliers.set(self.id, suppliers, reporter)
    }

    /// Linked hospitals.
    #[must_use]
    pub const fn hospitals(&self) -> &Peers {
        &self.hospitals
    }

    /// Linked suppliers.
    #[must_use]
    pub const fn suppliers(&self) -> &Peers {
        &self.suppliers
    }

    /// Resources consumed by one treatment.
    #[must_use]
    pub fn required_resources(&self) -> &[ResourceType] {
        &self.required
    }

    /// Patients healed so far.
    #[must_use]
    pub fn patients_treated(&self) -> u64 {
        self.ledger.read(|s| s.extra.treated)
    }

    /// Sick patients waiting for treatment.
    #[must_use]
    pub fn waiting_patients(&self) -> u32 {
        self.ledger.read(|s| s.available(ResourceType::PatientSick))
    }

    /// Sick plus healed patients currently held.
    #[must_use]
    pub fn number_of_patients(&self) -> u64 {
        self.ledger.read(|s| {
            u64::from(s.available(ResourceType::PatientSick))
                + u64::from(s.available(ResourceType::PatientHealed))
        })
    }

    /// Ready when every required resource is in stock.
    #[must_use]
    pub fn verify_resources(&self) -> ClinicState {
        self.ledger.read(|s| {
            if self.required.iter().all(|kind| s.available(*kind) > 0) {
                ClinicState::Ready
            } else {
                ClinicState::Short
            }
        })
    }

    /// Buy one unit of every required resource that is out of stock.
    ///
    /// Sick patients come from hospitals, materials from suppliers that
    /// advertise the material. Each purchase stands alone; nothing is rolled
    /// back if a later one fails. Returns the number of units bought.
    pub fn order_resources(&self, rng: &mut StdRng) -> u32 {
        let missing: Vec<ResourceType> = self.ledger.read(|s| {
            self.required
                .iter()
                .copied()
                .filter(|kind| s.available(*kind) == 0)
                .collect()
        });

        let mut bought = 0;
        for kind in missing {
            let sellers = if kind.is_patient() {
                self.hospitals.shuffled(rng)
            } else {
                self.suppliers
                    .shuffled(rng)
                    .into_iter()
                    .filter(|s| s.stock_snapshot().get(&kind).is_some_and(|q| *q > 0))
                    .collect()
            };

            match self.buy_one(kind, &sellers) {
                Ok(true) => bought += 1,
                Ok(false) => {}
                Err(err) => error!(agent = %self.id, kind = %kind, error = %err, "Order failed"),
            }
        }
        bought
    }

    fn buy_one(&self, kind: ResourceType, sellers: &[Arc<dyn Trader>]) -> std::result::Result<bool, LedgerError> {
        let order = Order {
            buyer: self.id,
            kind,
            qty: 1,
            reserve: self.env.costs.unit_cost(kind),
        };
        for seller in sellers {
            match purchase(&self.ledger, seller.as_ref(), order, |_| Ok(()), |_, _| {})? {
                TradeOutcome::Filled { amount } => {
                    self.env.reporter.report_event(
                        self.id,
                        &format!("Bought {kind} from {} for {amount}", seller.id()),
                    );
                    return Ok(true);
                }
                TradeOutcome::Declined(DeclineReason::InsufficientFunds) => {
                    debug!(agent = %self.id, kind = %kind, "Cannot afford order");
                    return Ok(false);
                }
                TradeOutcome::Declined(_) => {}
            }
        }
        Ok(false)
    }

    /// Heal one sick patient if every required resource is in stock.
    ///
    /// The doctor is paid even when that takes funds below zero. Returns
    /// whether a patient was healed.
    ///
    /// # Errors
    ///
    /// Propagates ledger errors, which indicate a broken invariant.
    pub fn treat_patient(&self) -> std::result::Result<bool, LedgerError> {
        if self.verify_resources() == ClinicState::Short {
            return Ok(false);
        }

        self.env.pacer.pause();

        let doctor = self.env.costs.salary(EmployeeRole::Doctor);
        let healed = self.ledger.transact(|s| {
            if !self.required.iter().all(|kind| s.available(*kind) > 0) {
                return Ok(false);
            }
            for kind in &self.required {
                s.remove_stock(*kind, 1)?;
            }
            s.add_stock(ResourceType::PatientHealed, 1)?;
            s.debit_funds(doctor);
            s.extra.treated += 1;
            Ok::<_, LedgerError>(true)
        })?;

        if healed {
            self.env
                .reporter
                .report_event(self.id, "Clinic has healed a new patient");
            let funds = self.ledger.funds();
            if funds < 0 {
                warn!(agent = %self.id, funds, "Clinic is treating on credit");
            }
        }
        Ok(healed)
    }
}

impl Trader for Clinic {
    fn id(&self) -> AgentId {
        self.id
    }

    fn sell(&self, kind: ResourceType, qty: u32) -> TradeOutcome {
        if kind != ResourceType::PatientHealed {
            return TradeOutcome::Declined(DeclineReason::NotForSale);
        }
        let price = self.env.costs.unit_cost(kind);
        self.ledger.sell(kind, qty, price)
    }

    fn stock_snapshot(&self) -> StockSnapshot {
        self.ledger.stock_snapshot()
    }

    fn funds(&self) -> i64 {
        self.ledger.funds()
    }
}

impl Agent for Clinic {
    fn role(&self) -> AgentRole {
        AgentRole::Clinic
    }

    fn env(&self) -> &AgentEnv {
        &self.env
    }

    fn check_links(&self) -> Result<()> {
        self.hospitals.require(self.id)?;
        self.suppliers.require(self.id)
    }

    fn step(&self, rng: &mut StdRng) {
        match self.verify_resources() {
            ClinicState::Short => {
                self.order_resources(rng);
                self.env.pacer.pause();
            }
            ClinicState::Ready => {
                if let Err(err) = self.treat_patient() {
                    error!(agent = %self.id, error = %err, "Treatment failed");
                }
            }
        }
    }

    fn amount_paid_to_workers(&self) -> i64 {
        i64::try_from(self.patients_treated())
            .unwrap_or(i64::MAX)
            .saturating_mul(self.env.costs.salary(EmployeeRole::Doctor))
    }

    fn snapshot(&self) -> LedgerSnapshot {
        self.ledger.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacing::CountingPacer;
    use crate::reporter::NullReporter;
    use crate::runtime::agent_rng;
    use test_case::test_case;
    use ward_ledger::CostTable;

    struct Stall {
        id: AgentId,
        ledger: Ledger,
        price: i64,
    }

    impl Trader for Stall {
        fn id(&self) -> AgentId {
            self.id
        }
        fn sell(&self, kind: ResourceType, qty: u32) -> TradeOutcome {
            self.ledger.sell(kind, qty, self.price)
        }
        fn stock_snapshot(&self) -> StockSnapshot {
            self.ledger.stock_snapshot()
        }
        fn funds(&self) -> i64 {
            self.ledger.funds()
        }
    }

    fn stall(id: u32, kinds: &[(ResourceType, u32)], price: i64) -> Arc<Stall> {
        let ledger = Ledger::with_funds(0, kinds.iter().map(|(k, _)| *k));
        for (kind, qty) in kinds {
            ledger.restock(*kind, *qty).unwrap();
        }
        Arc::new(Stall {
            id: AgentId(id),
            ledger,
            price,
        })
    }

    fn pulmonology(fund: i64) -> Clinic {
        Clinic::from_specialty(AgentId(3), fund, Specialty::Pulmonology, AgentEnv::quiet()).unwrap()
    }

    #[test_case(Specialty::Pulmonology, ResourceType::Thermometer ; "pulmonology")]
    #[test_case(Specialty::Cardiology, ResourceType::Stethoscope ; "cardiology")]
    #[test_case(Specialty::Neurology, ResourceType::Scalpel ; "neurology")]
    fn test_specialty_requirements(specialty: Specialty, material: ResourceType) {
        let required = specialty.required_resources();
        assert_eq!(required[0], ResourceType::PatientSick);
        assert_eq!(required.len(), 3);
        assert!(required.contains(&material));
    }

    #[test]
    fn test_new_adds_sick_patient_and_dedupes() {
        let clinic = Clinic::new(
            AgentId(1),
            0,
            vec![ResourceType::Pill, ResourceType::Pill],
            AgentEnv::quiet(),
        )
        .unwrap();
        assert_eq!(
            clinic.required_resources(),
            &[ResourceType::PatientSick, ResourceType::Pill]
        );
        assert!(
            Clinic::new(AgentId(1), 0, vec![ResourceType::PatientHealed], AgentEnv::quiet())
                .is_err()
        );
    }

    #[test]
    fn test_orders_missing_resources_from_the_right_partners() {
        let clinic = pulmonology(1_000);
        let hospital = stall(10, &[(ResourceType::PatientSick, 4)], 20);
        let devices = stall(
            20,
            &[(ResourceType::Thermometer, 1), (ResourceType::Scalpel, 9)],
            12,
        );
        let pharmacy = stall(21, &[(ResourceType::Pill, 1)], 5);
        let hospitals: Vec<Arc<dyn Trader>> = vec![hospital.clone()];
        let suppliers: Vec<Arc<dyn Trader>> = vec![devices.clone(), pharmacy.clone()];
        clinic.link(&hospitals, &suppliers).unwrap();

        assert_eq!(clinic.verify_resources(), ClinicState::Short);
        let mut rng = agent_rng(Some(5), clinic.id());
        assert_eq!(clinic.order_resources(&mut rng), 3);

        assert_eq!(clinic.verify_resources(), ClinicState::Ready);
        assert_eq!(clinic.funds(), 1_000 - 20 - 5 - 12);
        assert_eq!(hospital.funds(), 20);
        assert_eq!(pharmacy.funds(), 5);
        assert_eq!(devices.funds(), 12);
        assert_eq!(devices.ledger.snapshot().quantity(ResourceType::Scalpel), 9);
    }

    #[test]
    fn test_order_never_overdraws() {
        let clinic = pulmonology(10);
        let hospital = stall(10, &[(ResourceType::PatientSick, 4)], 20);
        let hospitals: Vec<Arc<dyn Trader>> = vec![hospital.clone()];
        clinic.link(&hospitals, &[]).unwrap();

        let mut rng = agent_rng(Some(5), clinic.id());
        assert_eq!(clinic.order_resources(&mut rng), 0);
        assert_eq!(clinic.funds(), 10);
        assert_eq!(hospital.ledger.snapshot().quantity(ResourceType::PatientSick), 4);
    }

    #[test]
    fn test_treatment_consumes_one_of_each_and_pays_doctor() {
        let clinic = pulmonology(10);
        clinic
            .ledger
            .transact(|s| {
                s.add_stock(ResourceType::PatientSick, 2)?;
                s.add_stock(ResourceType::Pill, 1)?;
                s.add_stock(ResourceType::Thermometer, 1)
            })
            .unwrap();

        assert!(clinic.treat_patient().unwrap());

        let snap = clinic.snapshot();
        assert_eq!(snap.quantity(ResourceType::PatientSick), 1);
        assert_eq!(snap.quantity(ResourceType::Pill), 0);
        assert_eq!(snap.quantity(ResourceType::PatientHealed), 1);
        // Treated on credit: 10 - 15.
        assert_eq!(snap.funds, -5);
        assert_eq!(clinic.patients_treated(), 1);
        assert_eq!(clinic.amount_paid_to_workers(), 15);
        assert_eq!(clinic.number_of_patients(), 2);

        assert!(!clinic.treat_patient().unwrap());
        assert_eq!(clinic.patients_treated(), 1);
    }

    #[test]
    fn test_short_clinic_paces_every_step() {
        let pacer = Arc::new(CountingPacer::new());
        let env = AgentEnv::new(
            Arc::new(CostTable::default()),
            Arc::new(NullReporter),
            pacer.clone(),
        );
        let clinic = Clinic::from_specialty(AgentId(3), 1_000, Specialty::Pulmonology, env).unwrap();
        let empty = stall(10, &[(ResourceType::PatientSick, 0)], 20);
        let hospitals: Vec<Arc<dyn Trader>> = vec![empty.clone()];
        let suppliers: Vec<Arc<dyn Trader>> = vec![empty];
        clinic.link(&hospitals, &suppliers).unwrap();

        let mut rng = agent_rng(Some(2), clinic.id());
        for _ in 0..100 {
            clinic.step(&mut rng);
        }

        assert_eq!(clinic.verify_resources(), ClinicState::Short);
        assert_eq!(pacer.pauses(), 100);
        assert_eq!(clinic.funds(), 1_000);
    }

    #[test]
    fn test_only_healed_patients_are_sold() {
        let clinic = pulmonology(0);
        clinic.ledger.restock(ResourceType::Pill, 3).unwrap();
        clinic.ledger.restock(ResourceType::PatientHealed, 1).unwrap();

        assert_eq!(
            clinic.sell(ResourceType::Pill, 1),
            TradeOutcome::Declined(DeclineReason::NotForSale)
        );
        assert_eq!(
            clinic.sell(ResourceType::PatientHealed, 1),
            TradeOutcome::Filled { amount: 60 }
        );
        assert_eq!(clinic.funds(), 60);
    }

    #[test]
    fn test_requires_hospitals_and_suppliers() {
        let clinic = pulmonology(0);
        assert!(matches!(
            clinic.check_links(),
            Err(AgentError::MissingPartners { partner: "hospital", .. })
        ));

        let hospital: Arc<dyn Trader> = stall(10, &[], 1);
        clinic.link(std::slice::from_ref(&hospital), &[]).unwrap();
        assert!(matches!(
            clinic.check_links(),
            Err(AgentError::MissingPartners { partner: "supplier", .. })
        ));
    }
}
