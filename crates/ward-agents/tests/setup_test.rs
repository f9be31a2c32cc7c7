//! Setup errors: agents missing trading partners refuse to run.

use std::sync::Arc;
use std::time::Duration;

use ward_agents::{
    Agent, AgentEnv, AgentError, AgentHandle, Ambulance, Economy, Hospital, NoDelay,
    RecordingReporter, SimConfig, Specialty, agent_rng,
};
use ward_ledger::{AgentId, CostTable, Trader};

fn recording_env() -> (AgentEnv, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::new());
    let env = AgentEnv::new(
        Arc::new(CostTable::default()),
        reporter.clone(),
        Arc::new(NoDelay),
    );
    (env, reporter)
}

#[test]
fn clinic_without_partners_exits_immediately() {
    let reporter = Arc::new(RecordingReporter::new());
    let config = SimConfig::builder().clinic(100, Specialty::Neurology).build();
    let economy = Economy::build(&config, reporter.clone(), Arc::new(NoDelay)).unwrap();

    economy.start().unwrap();
    // No stop requested: the loop must end on its own.
    economy.join().unwrap();

    let clinic = &economy.clinics()[0];
    let events = reporter.events_for(clinic.id());
    assert!(events.iter().any(|e| e.contains("no linked hospital")));
    assert!(!events.iter().any(|e| e.starts_with("[START]")));
    assert_eq!(clinic.patients_treated(), 0);
    assert_eq!(clinic.funds(), 100);
}

#[test]
fn ambulance_without_hospitals_keeps_its_patients() {
    let (env, reporter) = recording_env();
    let ambulance = Arc::new(Ambulance::new(AgentId(4), 0, 3, env).unwrap());
    let handle = AgentHandle::spawn(ambulance.clone(), agent_rng(Some(1), AgentId(4))).unwrap();
    handle.join().unwrap();

    assert!(handle.is_finished());
    assert_eq!(ambulance.patients_waiting(), 3);
    let events = reporter.events_for(AgentId(4));
    assert_eq!(events.len(), 2, "{events:?}");
    assert!(events[1].contains("refusing to start"));
}

#[test]
fn links_cannot_be_rewired() {
    let (env, _reporter) = recording_env();
    let hospital = Hospital::new(AgentId(1), 0, 1, 1, env.clone());
    let ambulance = Ambulance::new(AgentId(2), 0, 0, env).unwrap();
    let peer: Arc<dyn Trader> = Arc::new(hospital);

    ambulance.link_hospitals(std::slice::from_ref(&peer)).unwrap();
    let err = ambulance
        .link_hospitals(std::slice::from_ref(&peer))
        .unwrap_err();
    assert!(matches!(err, AgentError::LinksAlreadySet { .. }));
    assert!(ambulance.check_links().is_ok());
}

#[test]
fn suppliers_run_alone() {
    let config = SimConfig::builder()
        .supplier(30, ward_agents::Catalogue::MedicalDevices)
        .build();
    let reporter = Arc::new(RecordingReporter::new());
    let economy = Economy::build(&config, reporter.clone(), Arc::new(NoDelay)).unwrap();

    let audit = economy.run_for(Duration::from_millis(20)).unwrap();

    let supplier = &economy.suppliers()[0];
    assert_eq!(supplier.quantity_produced(), 10);
    assert_eq!(audit.funds_total(), 0);
    assert!(audit.is_conserved());
    assert!(
        reporter
            .events_for(supplier.id())
            .contains(&"[START] supplier routine".to_string())
    );
}
