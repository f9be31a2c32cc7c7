//! Economy assembly, lifecycle and conservation audit.
//!
//! The economy owns every agent, wires the fixed trading graph, and runs one
//! thread per agent. Money is conserved across the whole economy: every
//! unit spent by one agent is either received by another or paid to a
//! worker. [`Economy::audit`] checks this at a quiescent point.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ward_ledger::{AgentId, StockSnapshot, Trader};

use crate::ambulance::Ambulance;
use crate::clinic::Clinic;
use crate::config::SimConfig;
use crate::error::{AgentError, Result};
use crate::hospital::Hospital;
use crate::pacing::Pacer;
use crate::reporter::Reporter;
use crate::runtime::{Agent, AgentEnv, AgentHandle, AgentRole, agent_rng};
use crate::supplier::Supplier;

/// One agent's line in an [`EconomyAudit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAudit {
    /// Agent identifier.
    pub id: AgentId,
    /// Agent role.
    pub role: AgentRole,
    /// Funds at construction.
    pub initial_funds: i64,
    /// Funds now.
    pub funds: i64,
    /// Labor paid so far.
    pub paid_to_workers: i64,
    /// Stock now.
    pub stock: StockSnapshot,
}

/// Point-in-time money accounting over every agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyAudit {
    /// Per-agent lines, in id order.
    pub agents: Vec<AgentAudit>,
    /// When the audit was taken.
    pub taken_at: DateTime<Utc>,
}

impl EconomyAudit {
    /// Sum of starting funds.
    #[must_use]
    pub fn initial_total(&self) -> i64 {
        self.agents.iter().map(|a| a.initial_funds).sum()
    }

    /// Sum of current funds.
    #[must_use]
    pub fn funds_total(&self) -> i64 {
        self.agents.iter().map(|a| a.funds).sum()
    }

    /// Sum of labor paid.
    #[must_use]
    pub fn worker_pay_total(&self) -> i64 {
        self.agents.iter().map(|a| a.paid_to_workers).sum()
    }

    /// `funds + worker pay - initial`; zero when money is conserved.
    #[must_use]
    pub fn discrepancy(&self) -> i64 {
        self.funds_total() + self.worker_pay_total() - self.initial_total()
    }

    /// Whether no money was created or destroyed.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.discrepancy() == 0
    }
}

impl fmt::Display for EconomyAudit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for agent in &self.agents {
            let stock: Vec<String> = agent
                .stock
                .iter()
                .map(|(kind, qty)| format!("{kind}={qty}"))
                .collect();
            writeln!(
                f,
                "{:<9} {:<10} funds {:>8} (start {:>6}) workers {:>7}  [{}]",
                agent.id,
                agent.role,
                agent.funds,
                agent.initial_funds,
                agent.paid_to_workers,
                stock.join(", ")
            )?;
        }
        write!(
            f,
            "initial {} = funds {} + workers {} ({})",
            self.initial_total(),
            self.funds_total(),
            self.worker_pay_total(),
            if self.is_conserved() {
                "conserved".to_string()
            } else {
                format!("off by {}", self.discrepancy())
            }
        )
    }
}

/// Every agent of one simulation run.
pub struct Economy {
    seed: Option<u64>,
    suppliers: Vec<Arc<Supplier>>,
    hospitals: Vec<Arc<Hospital>>,
    clinics: Vec<Arc<Clinic>>,
    ambulances: Vec<Arc<Ambulance>>,
    agents: Vec<Arc<dyn Agent>>,
    initial_funds: BTreeMap<AgentId, i64>,
    start_lock: Mutex<()>,
    handles: OnceLock<Vec<AgentHandle>>,
}

impl Economy {
    /// Validate `config`, construct every agent and wire the trading graph.
    ///
    /// Ids are handed out in order: suppliers, hospitals, clinics, then
    /// ambulances. Clinics are linked to every hospital and every supplier,
    /// hospitals to every clinic, ambulances to every hospital.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or an agent cannot
    /// be built.
    pub fn build(config: &SimConfig, reporter: Arc<dyn Reporter>, pacer: Arc<dyn Pacer>) -> Result<Self> {
        config.validate()?;

        let env = AgentEnv::new(Arc::new(config.costs.clone()), reporter, pacer);
        let mut next = 0u32;
        let mut next_id = || {
            let id = AgentId(next);
            next += 1;
            id
        };

        let mut suppliers = Vec::with_capacity(config.suppliers.len());
        for cfg in &config.suppliers {
            suppliers.push(Arc::new(Supplier::with_catalogue(
                next_id(),
                cfg.fund,
                &cfg.catalogue,
                env.clone(),
            )?));
        }

        let hospitals: Vec<Arc<Hospital>> = config
            .hospitals
            .iter()
            .map(|cfg| {
                Arc::new(Hospital::new(
                    next_id(),
                    cfg.fund,
                    cfg.capacity,
                    cfg.discharge_interval,
                    env.clone(),
                ))
            })
            .collect();

        let mut clinics = Vec::with_capacity(config.clinics.len());
        for cfg in &config.clinics {
            clinics.push(Arc::new(Clinic::from_specialty(
                next_id(),
                cfg.fund,
                cfg.specialty,
                env.clone(),
            )?));
        }

        let mut ambulances = Vec::with_capacity(config.ambulances.len());
        for cfg in &config.ambulances {
            ambulances.push(Arc::new(Ambulance::new(
                next_id(),
                cfg.fund,
                cfg.patients,
                env.clone(),
            )?));
        }

        let hospital_peers = as_traders(&hospitals);
        let clinic_peers = as_traders(&clinics);
        let supplier_peers = as_traders(&suppliers);
        for clinic in &clinics {
            clinic.link(&hospital_peers, &supplier_peers)?;
        }
        for hospital in &hospitals {
            hospital.link_clinics(&clinic_peers)?;
        }
        for ambulance in &ambulances {
            ambulance.link_hospitals(&hospital_peers)?;
        }

        let mut agents: Vec<Arc<dyn Agent>> = Vec::with_capacity(config.agent_count());
        agents.extend(suppliers.iter().map(|a| Arc::clone(a) as Arc<dyn Agent>));
        agents.extend(hospitals.iter().map(|a| Arc::clone(a) as Arc<dyn Agent>));
        agents.extend(clinics.iter().map(|a| Arc::clone(a) as Arc<dyn Agent>));
        agents.extend(ambulances.iter().map(|a| Arc::clone(a) as Arc<dyn Agent>));

        let initial_funds = agents.iter().map(|a| (a.id(), a.funds())).collect();

        info!(
            suppliers = suppliers.len(),
            hospitals = hospitals.len(),
            clinics = clinics.len(),
            ambulances = ambulances.len(),
            "Economy built"
        );

        Ok(Self {
            seed: config.seed,
            suppliers,
            hospitals,
            clinics,
            ambulances,
            agents,
            initial_funds,
            start_lock: Mutex::new(()),
            handles: OnceLock::new(),
        })
    }

    /// Spawn one thread per agent.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::AlreadyStarted` on a second call, or
    /// `AgentError::Io` if a thread cannot be spawned (threads already
    /// started are stopped and joined first).
    pub fn start(&self) -> Result<()> {
        let _guard = self.start_lock.lock();
        if self.handles.get().is_some() {
            return Err(AgentError::AlreadyStarted);
        }

        let mut handles = Vec::with_capacity(self.agents.len());
        for agent in &self.agents {
            let rng = agent_rng(self.seed, agent.id());
            match AgentHandle::spawn(Arc::clone(agent), rng) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    warn!(agent = %agent.id(), error = %err, "Spawn failed, stopping economy");
                    for handle in &handles {
                        handle.stop();
                    }
                    for handle in &handles {
                        let _ = handle.join();
                    }
                    return Err(err);
                }
            }
        }

        info!(agents = handles.len(), "Economy started");
        self.handles
            .set(handles)
            .map_err(|_| AgentError::AlreadyStarted)
    }

    /// Ask every agent to stop after its current iteration.
    pub fn stop(&self) {
        if let Some(handles) = self.handles.get() {
            for handle in handles {
                handle.stop();
            }
        }
    }

    /// Wait for every agent loop to exit.
    ///
    /// Every handle is joined even if one fails.
    ///
    /// # Errors
    ///
    /// Returns the first `AgentError::Panicked` seen.
    pub fn join(&self) -> Result<()> {
        let Some(handles) = self.handles.get() else {
            return Ok(());
        };
        let mut first = None;
        for handle in handles {
            if let Err(err) = handle.join() {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Stop, then join.
    ///
    /// # Errors
    ///
    /// See [`Economy::join`].
    pub fn shutdown(&self) -> Result<()> {
        self.stop();
        let result = self.join();
        info!("Economy stopped");
        result
    }

    /// Start, let the agents run for `duration`, then shut down and audit.
    ///
    /// # Errors
    ///
    /// See [`Economy::start`] and [`Economy::join`].
    pub fn run_for(&self, duration: Duration) -> Result<EconomyAudit> {
        self.start()?;
        thread::sleep(duration);
        self.shutdown()?;
        Ok(self.audit())
    }

    /// Whether [`Economy::start`] has run.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.handles.get().is_some()
    }

    /// Account for every agent's money.
    ///
    /// Only meaningful while no trade is in flight, i.e. before start or
    /// after join.
    #[must_use]
    pub fn audit(&self) -> EconomyAudit {
        let agents = self
            .agents
            .iter()
            .map(|agent| {
                let snapshot = agent.snapshot();
                AgentAudit {
                    id: agent.id(),
                    role: agent.role(),
                    initial_funds: self.initial_funds.get(&agent.id()).copied().unwrap_or(0),
                    funds: snapshot.funds,
                    paid_to_workers: agent.amount_paid_to_workers(),
                    stock: snapshot.stock,
                }
            })
            .collect();
        EconomyAudit {
            agents,
            taken_at: Utc::now(),
        }
    }

    /// Every agent, in id order.
    #[must_use]
    pub fn agents(&self) -> &[Arc<dyn Agent>] {
        &self.agents
    }

    /// Suppliers, in id order.
    #[must_use]
    pub fn suppliers(&self) -> &[Arc<Supplier>] {
        &self.suppliers
    }

    /// Hospitals, in id order.
    #[must_use]
    pub fn hospitals(&self) -> &[Arc<Hospital>] {
        &self.hospitals
    }

    /// Clinics, in id order.
    #[must_use]
    pub fn clinics(&self) -> &[Arc<Clinic>] {
        &self.clinics
    }

    /// Ambulances, in id order.
    #[must_use]
    pub fn ambulances(&self) -> &[Arc<Ambulance>] {
        &self.ambulances
    }
}

impl fmt::Debug for Economy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Economy")
            .field("seed", &self.seed)
            .field("agents", &self.agents.len())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Drop for Economy {
    fn drop(&mut self) {
        self.stop();
        if let Err(err) = self.join() {
            warn!(error = %err, "Agent failed while the economy was dropped");
        }
    }
}

fn as_traders<T: Trader + 'static>(agents: &[Arc<T>]) -> Vec<Arc<dyn Trader>> {
    agents
        .iter()
        .map(|a| Arc::clone(a) as Arc<dyn Trader>)
        .collect()
}
