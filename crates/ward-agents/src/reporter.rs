//! Reporting surface for agent snapshots and events.
//!
//! Agents push their funds and stock after every loop iteration, plus
//! free-form events and the trading links declared at setup. The sink is
//! injected at construction; nothing here is global.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, trace};
use ward_ledger::{AgentId, StockSnapshot};

/// Sink for agent snapshots and events.
pub trait Reporter: Send + Sync {
    /// Latest funds of an agent.
    fn report_funds(&self, agent: AgentId, funds: i64);

    /// Latest stock of an agent.
    fn report_stock(&self, agent: AgentId, stock: &StockSnapshot);

    /// A human-readable event.
    fn report_event(&self, agent: AgentId, text: &str);

    /// A trading link from `agent` to `peer`.
    fn set_link(&self, agent: AgentId, peer: AgentId);
}

/// Reporter that emits `tracing` events.
///
/// Snapshots are logged at `trace` level since they arrive every iteration.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report_funds(&self, agent: AgentId, funds: i64) {
        trace!(agent = %agent, funds, "funds");
    }

    fn report_stock(&self, agent: AgentId, stock: &StockSnapshot) {
        trace!(agent = %agent, stock = ?stock, "stock");
    }

    fn report_event(&self, agent: AgentId, text: &str) {
        info!(agent = %agent, "{text}");
    }

    fn set_link(&self, agent: AgentId, peer: AgentId) {
        debug!(agent = %agent, peer = %peer, "link");
    }
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report_funds(&self, _agent: AgentId, _funds: i64) {}
    fn report_stock(&self, _agent: AgentId, _stock: &StockSnapshot) {}
    fn report_event(&self, _agent: AgentId, _text: &str) {}
    fn set_link(&self, _agent: AgentId, _peer: AgentId) {}
}

/// An event captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Agent that reported it.
    pub agent: AgentId,
    /// Event text.
    pub text: String,
    /// When it was reported.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Recording {
    funds: BTreeMap<AgentId, i64>,
    stock: BTreeMap<AgentId, StockSnapshot>,
    events: Vec<RecordedEvent>,
    links: BTreeSet<(AgentId, AgentId)>,
}

/// Reporter that keeps the latest snapshot per agent and every event.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    inner: Mutex<Recording>,
}

impl RecordingReporter {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest reported funds of `agent`.
    #[must_use]
    pub fn latest_funds(&self, agent: AgentId) -> Option<i64> {
        self.inner.lock().funds.get(&agent).copied()
    }

    /// Latest reported stock of `agent`.
    #[must_use]
    pub fn latest_stock(&self, agent: AgentId) -> Option<StockSnapshot> {
        self.inner.lock().stock.get(&agent).cloned()
    }

    /// All events in report order.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.inner.lock().events.clone()
    }

    /// Event texts reported by `agent`.
    #[must_use]
    pub fn events_for(&self, agent: AgentId) -> Vec<String> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.agent == agent)
            .map(|e| e.text.clone())
            .collect()
    }

    /// All declared links.
    #[must_use]
    pub fn links(&self) -> BTreeSet<(AgentId, AgentId)> {
        self.inner.lock().links.clone()
    }
}

impl Reporter for RecordingReporter {
    fn report_funds(&self, agent: AgentId, funds: i64) {
        self.inner.lock().funds.insert(agent, funds);
    }

    fn report_stock(&self, agent: AgentId, stock: &StockSnapshot) {
        self.inner.lock().stock.insert(agent, stock.clone());
    }

    fn report_event(&self, agent: AgentId, text: &str) {
        self.inner.lock().events.push(RecordedEvent {
            agent,
            text: text.to_string(),
            at: Utc::now(),
        });
    }

    fn set_link(&self, agent: AgentId, peer: AgentId) {
        self.inner.lock().links.insert((agent, peer));
    }
}
