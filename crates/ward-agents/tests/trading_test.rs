//! Agents trading with each other across threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::thread;

use ward_agents::{
    Agent, AgentEnv, AgentHandle, Catalogue, Clinic, Hospital, NoDelay, RecordingReporter,
    Specialty, Supplier, agent_rng,
};
use ward_ledger::{AgentId, CostTable, DeclineReason, ResourceType, TradeOutcome, Trader};

fn quiet_env() -> AgentEnv {
    AgentEnv::quiet()
}

// ============================================================================
// Hospital intake
// ============================================================================

#[test]
fn full_hospital_declines_without_side_effects() {
    let hospital = Hospital::new(AgentId(1), 10_000, 10, 5, quiet_env());
    for _ in 0..10 {
        assert!(hospital.buy(ResourceType::PatientSick, 1, 20).is_filled());
    }
    let before = hospital.snapshot();
    let admitted = hospital.patients_admitted();

    let outcome = hospital.buy(ResourceType::PatientSick, 1, 20);

    assert_eq!(outcome.amount(), 0);
    assert_eq!(
        outcome,
        TradeOutcome::Declined(DeclineReason::CapacityExceeded)
    );
    assert_eq!(hospital.snapshot(), before);
    assert_eq!(hospital.patients_admitted(), admitted);
}

#[test]
fn concurrent_pushes_respect_capacity_and_money() {
    const THREADS: usize = 6;
    const PUSHES: usize = 500;
    const CAPACITY: u32 = 40;
    const FUND: i64 = 100_000;

    let costs = CostTable::default();
    let bill = costs.unit_cost(ResourceType::PatientSick);
    let nurse = costs.salary(ward_ledger::EmployeeRole::Nurse);
    let hospital = Arc::new(Hospital::new(AgentId(1), FUND, CAPACITY, 1, quiet_env()));

    let received = Arc::new(AtomicI64::new(0));
    let accepted = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();
    for _ in 0..THREADS {
        let hospital = Arc::clone(&hospital);
        let received = Arc::clone(&received);
        let accepted = Arc::clone(&accepted);
        handles.push(thread::spawn(move || {
            for _ in 0..PUSHES {
                let outcome = hospital.buy(ResourceType::PatientSick, 1, bill);
                if outcome.is_filled() {
                    received.fetch_add(outcome.amount(), Ordering::Relaxed);
                    accepted.fetch_add(1, Ordering::Relaxed);
                }
                assert!(hospital.occupied() <= CAPACITY);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let accepted = accepted.load(Ordering::Relaxed);
    assert_eq!(accepted, u64::from(CAPACITY));
    assert_eq!(hospital.occupied(), CAPACITY);
    assert_eq!(hospital.patients_admitted(), accepted);
    assert_eq!(
        hospital.funds() + received.load(Ordering::Relaxed) + hospital.amount_paid_to_workers(),
        FUND
    );
    assert_eq!(hospital.amount_paid_to_workers(), nurse * i64::from(CAPACITY));
}

// ============================================================================
// Supplier under load
// ============================================================================

#[test]
fn running_supplier_never_oversells() {
    const BUYERS: usize = 4;
    const ATTEMPTS: usize = 5_000;
    const FUND: i64 = 3_000;

    let supplier = Arc::new(
        Supplier::with_catalogue(AgentId(0), FUND, &Catalogue::Pharmacy, quiet_env()).unwrap(),
    );
    let loop_handle = AgentHandle::spawn(supplier.clone(), agent_rng(Some(4), AgentId(0))).unwrap();

    let paid = Arc::new(AtomicI64::new(0));
    let bought = Arc::new(AtomicU64::new(0));
    let mut handles = Vec::new();
    for i in 0..BUYERS {
        let supplier = Arc::clone(&supplier);
        let paid = Arc::clone(&paid);
        let bought = Arc::clone(&bought);
        let kind = if i % 2 == 0 {
            ResourceType::Pill
        } else {
            ResourceType::Syringe
        };
        handles.push(thread::spawn(move || {
            for _ in 0..ATTEMPTS {
                let outcome = supplier.sell(kind, 1);
                if outcome.is_filled() {
                    paid.fetch_add(outcome.amount(), Ordering::Relaxed);
                    bought.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    loop_handle.stop();
    loop_handle.join().unwrap();

    let snap = supplier.snapshot();
    let on_hand = u64::from(snap.quantity(ResourceType::Pill))
        + u64::from(snap.quantity(ResourceType::Syringe));
    let bought = bought.load(Ordering::Relaxed);
    assert_eq!(supplier.quantity_supplied(), bought);
    assert_eq!(supplier.quantity_produced(), bought + on_hand);
    assert_eq!(
        snap.funds + supplier.amount_paid_to_workers(),
        FUND + paid.load(Ordering::Relaxed)
    );
    assert!(snap.funds >= 0);
}

// ============================================================================
// Clinic and hospital trading both ways
// ============================================================================

#[test]
fn clinic_and_hospital_trade_in_both_directions_without_deadlock() {
    let reporter = Arc::new(RecordingReporter::new());
    let env = AgentEnv::new(
        Arc::new(CostTable::default()),
        reporter.clone(),
        Arc::new(NoDelay),
    );
    let supplier = Arc::new(
        Supplier::new(
            AgentId(0),
            10_000,
            vec![ResourceType::Syringe, ResourceType::Stethoscope],
            env.clone(),
        )
        .unwrap(),
    );
    let hospital = Arc::new(Hospital::new(AgentId(1), 10_000, 8, 1, env.clone()));
    let clinic = Arc::new(Clinic::from_specialty(AgentId(2), 5_000, Specialty::Cardiology, env).unwrap());

    let hospitals: Vec<Arc<dyn Trader>> = vec![hospital.clone()];
    let suppliers: Vec<Arc<dyn Trader>> = vec![supplier.clone()];
    let clinics: Vec<Arc<dyn Trader>> = vec![clinic.clone()];
    clinic.link(&hospitals, &suppliers).unwrap();
    hospital.link_clinics(&clinics).unwrap();

    let initial = 10_000 + 10_000 + 5_000;
    let pushed = 30u32;
    let agents: Vec<Arc<dyn Agent>> = vec![supplier.clone(), hospital.clone(), clinic.clone()];
    let loops: Vec<AgentHandle> = agents
        .iter()
        .map(|a| AgentHandle::spawn(Arc::clone(a), agent_rng(Some(8), a.id())).unwrap())
        .collect();

    let mut delivered = 0;
    while delivered < pushed {
        if hospital.buy(ResourceType::PatientSick, 1, 20).is_filled() {
            delivered += 1;
        }
        thread::yield_now();
    }
    while clinic.patients_treated() < 5 {
        thread::yield_now();
    }

    for handle in &loops {
        handle.stop();
    }
    for handle in &loops {
        handle.join().unwrap();
    }

    // The test thread acted as an ambulance: it was paid 20 per patient.
    let funds: i64 = agents.iter().map(|a| a.funds()).sum();
    let workers: i64 = agents.iter().map(|a| a.amount_paid_to_workers()).sum();
    assert_eq!(funds + workers + i64::from(pushed) * 20, initial);

    let patients = hospital.number_of_patients() + clinic.number_of_patients();
    assert_eq!(patients, u64::from(pushed));
    assert!(!reporter.links().is_empty());
}
