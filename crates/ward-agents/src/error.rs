//! Error types for agents, configuration and the economy.

use thiserror::Error;
use ward_ledger::{AgentId, LedgerError};

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised while building, wiring or running agents.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent has no trading partner of a kind it needs to run.
    #[error("{agent} has no linked {partner}; refusing to start")]
    MissingPartners {
        /// The misconfigured agent.
        agent: AgentId,
        /// The kind of partner that is missing.
        partner: &'static str,
    },

    /// Trading links were already fixed for this agent.
    #[error("{agent} already has its {partner} links set")]
    LinksAlreadySet {
        /// The agent.
        agent: AgentId,
        /// The kind of partner the links were for.
        partner: &'static str,
    },

    /// A supplier catalogue or clinic requirement list is unusable.
    #[error("invalid resource list for {agent}: {message}")]
    InvalidResources {
        /// The agent.
        agent: AgentId,
        /// What is wrong with the list.
        message: String,
    },

    /// The agent's thread panicked.
    #[error("{agent} panicked")]
    Panicked {
        /// The agent whose thread panicked.
        agent: AgentId,
    },

    /// The economy was started twice.
    #[error("economy already started")]
    AlreadyStarted,

    /// A ledger rejected a mutation.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Spawning a thread failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create a missing partners error.
    #[must_use]
    pub const fn missing_partners(agent: AgentId, partner: &'static str) -> Self {
        Self::MissingPartners { agent, partner }
    }

    /// Create an invalid resources error.
    #[must_use]
    pub fn invalid_resources(agent: AgentId, message: impl Into<String>) -> Self {
        Self::InvalidResources {
            agent,
            message: message.into(),
        }
    }
}

/// Errors in the simulation configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The cost table is unusable.
    #[error(transparent)]
    Costs(#[from] LedgerError),

    /// Reading or writing the config file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
