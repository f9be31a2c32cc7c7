//! Agent control loop, trading links and thread handles.
//!
//! Every agent runs on its own thread. Each iteration the loop polls the
//! stop flag, runs one [`Agent::step`], then publishes a snapshot. Stopping
//! is cooperative: the current iteration always finishes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use ward_ledger::{AgentId, CostTable, LedgerSnapshot, Trader};

use crate::error::{AgentError, Result};
use crate::pacing::{NoDelay, Pacer};
use crate::reporter::{NullReporter, Reporter};

/// Which state machine an agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Produces raw materials.
    Supplier,
    /// Holds beds, admits and discharges patients.
    Hospital,
    /// Treats sick patients.
    Clinic,
    /// Brings sick patients to hospitals.
    Ambulance,
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Supplier => write!(f, "supplier"),
            Self::Hospital => write!(f, "hospital"),
            Self::Clinic => write!(f, "clinic"),
            Self::Ambulance => write!(f, "ambulance"),
        }
    }
}

/// Collaborators injected into every agent at construction.
#[derive(Clone)]
pub struct AgentEnv {
    /// Prices and salaries.
    pub costs: Arc<CostTable>,
    /// Snapshot and event sink.
    pub reporter: Arc<dyn Reporter>,
    /// Simulated work delay.
    pub pacer: Arc<dyn Pacer>,
}

impl AgentEnv {
    /// Bundle the collaborators.
    #[must_use]
    pub fn new(costs: Arc<CostTable>, reporter: Arc<dyn Reporter>, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            costs,
            reporter,
            pacer,
        }
    }

    /// Default costs, no reporting, no delays.
    #[must_use]
    pub fn quiet() -> Self {
        Self::new(
            Arc::new(CostTable::default()),
            Arc::new(NullReporter),
            Arc::new(NoDelay),
        )
    }
}

impl fmt::Debug for AgentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentEnv")
            .field("costs", &self.costs)
            .finish_non_exhaustive()
    }
}

/// An independently scheduled economic actor.
pub trait Agent: Trader + 'static {
    /// The state machine this agent runs.
    fn role(&self) -> AgentRole;

    /// Injected collaborators.
    fn env(&self) -> &AgentEnv;

    /// Verify the agent has every trading partner it needs.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::MissingPartners` when the loop must not start.
    fn check_links(&self) -> Result<()>;

    /// Run one loop iteration.
    fn step(&self, rng: &mut StdRng);

    /// Total labor cost paid so far.
    fn amount_paid_to_workers(&self) -> i64;

    /// Point-in-time copy of funds and stock.
    fn snapshot(&self) -> LedgerSnapshot;
}

/// Trading partners of one kind, fixed once before the loop starts.
///
/// Holds weak references so that mutually linked agents do not keep each
/// other alive.
#[derive(Default)]
pub struct Peers {
    partner: &'static str,
    cell: OnceLock<Vec<Weak<dyn Trader>>>,
}

impl Peers {
    /// Create an unset link list for partners called `partner`.
    #[must_use]
    pub fn new(partner: &'static str) -> Self {
        Self {
            partner,
            cell: OnceLock::new(),
        }
    }

    /// Fix the partner list and declare each link to the reporter.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::LinksAlreadySet` on a second call.
    pub fn set(&self, owner: AgentId, peers: &[Arc<dyn Trader>], reporter: &dyn Reporter) -> Result<()> {
        let weak = peers.iter().map(Arc::downgrade).collect();
        self.cell.set(weak).map_err(|_| AgentError::LinksAlreadySet {
            agent: owner,
            partner: self.partner,
        })?;
        for peer in peers {
            reporter.set_link(owner, peer.id());
        }
        Ok(())
    }

    /// Name of this kind of partner.
    #[must_use]
    pub const fn partner(&self) -> &'static str {
        self.partner
    }

    /// Number of linked partners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cell.get().map_or(0, Vec::len)
    }

    /// Whether no partner is linked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Partners still alive, in link order.
    #[must_use]
    pub fn live(&self) -> Vec<Arc<dyn Trader>> {
        self.cell
            .get()
            .map(|peers| peers.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default()
    }

    /// Partners still alive, in random order.
    #[must_use]
    pub fn shuffled(&self, rng: &mut StdRng) -> Vec<Arc<dyn Trader>> {
        let mut peers = self.live();
        peers.shuffle(rng);
        peers
    }

    /// One live partner chosen uniformly at random.
    #[must_use]
    pub fn choose(&self, rng: &mut StdRng) -> Option<Arc<dyn Trader>> {
        self.live().choose(rng).cloned()
    }

    /// Identifiers of the linked partners.
    #[must_use]
    pub fn ids(&self) -> Vec<AgentId> {
        self.live().iter().map(|p| p.id()).collect()
    }

    /// Fail with `MissingPartners` when nothing is linked.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::MissingPartners` if the list is empty.
    pub fn require(&self, owner: AgentId) -> Result<()> {
        if self.is_empty() {
            return Err(AgentError::missing_partners(owner, self.partner));
        }
        Ok(())
    }
}

impl fmt::Debug for Peers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peers")
            .field("partner", &self.partner)
            .field("ids", &self.ids())
            .finish()
    }
}

/// Random source for one agent.
///
/// Seeded runs give every agent its own reproducible stream.
#[must_use]
pub fn agent_rng(seed: Option<u64>, agent: AgentId) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(u64::from(agent.0))),
        None => StdRng::from_entropy(),
    }
}

/// Run `agent` until `stop` is raised.
///
/// Returns immediately, after reporting the problem once, if the agent is
/// missing trading partners.
pub fn run_loop(agent: &dyn Agent, stop: &AtomicBool, rng: &mut StdRng) {
    let id = agent.id();
    let role = agent.role();
    let reporter = Arc::clone(&agent.env().reporter);

    if let Err(err) = agent.check_links() {
        error!(agent = %id, role = %role, error = %err, "Setup error");
        reporter.report_event(id, &err.to_string());
        return;
    }

    info!(agent = %id, role = %role, "Routine started");
    reporter.report_event(id, &format!("[START] {role} routine"));

    while !stop.load(Ordering::Acquire) {
        agent.step(rng);

        let snapshot = agent.snapshot();
        reporter.report_funds(id, snapshot.funds);
        reporter.report_stock(id, &snapshot.stock);
    }

    info!(agent = %id, role = %role, "Routine stopped");
    reporter.report_event(id, &format!("[STOP] {role} routine"));
}

/// Handle on a running agent thread.
#[derive(Debug)]
pub struct AgentHandle {
    id: AgentId,
    role: AgentRole,
    stop: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl AgentHandle {
    /// Start `agent`'s loop on a new named thread.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Io` if the thread cannot be spawned.
    pub fn spawn(agent: Arc<dyn Agent>, mut rng: StdRng) -> Result<Self> {
        let id = agent.id();
        let role = agent.role();
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name(format!("{role}-{}", id.0))
            .spawn(move || run_loop(agent.as_ref(), &flag, &mut rng))?;

        Ok(Self {
            id,
            role,
            stop,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Agent identifier.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Agent role.
    #[must_use]
    pub const fn role(&self) -> AgentRole {
        self.role
    }

    /// Request cooperative termination.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Whether termination was requested.
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread
            .lock()
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
    }

    /// Block until the loop has exited. Later calls return immediately.
    ///
    /// # Errors
    ///
    /// Returns `AgentError::Panicked` if the agent thread panicked.
    pub fn join(&self) -> Result<()> {
        let Some(thread) = self.thread.lock().take() else {
            return Ok(());
        };
        thread.join().map_err(|_| {
            warn!(agent = %self.id, "Agent thread panicked");
            AgentError::Panicked { agent: self.id }
        })
    }
}
