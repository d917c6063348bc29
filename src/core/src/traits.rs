//! Trait seams for external collaborators
//!
//! The pipeline never talks to custody, settlement rails, the risk oracle,
//! or voting parties directly; it goes through these traits so every layer
//! can be exercised against stubs in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;
use crate::types::{Agent, AgentId, Amount, SettledOutcome, Transaction, VoteRecord};

/// Wallet/account balances, owned externally
#[async_trait]
pub trait CustodyService: Send + Sync {
    /// Current spendable balance for an agent
    async fn get_balance(&self, agent_id: &AgentId) -> Result<Amount>;
}

/// What the settlement layer predicts about a proposed transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityEstimate {
    /// Whether the transfer is structurally executable
    pub feasible: bool,

    /// Estimated execution cost in smallest currency unit
    pub estimated_cost: Amount,

    /// Estimated settlement latency
    pub estimated_latency: Duration,
}

/// Settlement-rail probe. Never invoked for actual execution by this core.
#[async_trait]
pub trait SettlementNetwork: Send + Sync {
    async fn estimate_feasibility(&self, transaction: &Transaction) -> Result<FeasibilityEstimate>;
}

/// Agent-side context handed to the risk scorer
#[derive(Debug, Clone)]
pub struct RiskContext {
    /// Requesting agent's current state
    pub agent: Agent,

    /// Recent settled outcomes for the agent, newest last
    pub history: Vec<SettledOutcome>,

    /// Pattern heuristic flags raised earlier in the pipeline; they lower
    /// confidence here but never reject on their own
    pub pattern_flags: Vec<String>,
}

/// Action the scorer recommends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendedAction {
    Approve,
    Review,
    Block,
}

/// A fraud-risk assessment, from the oracle or the local fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Fraud probability (0-1)
    pub risk_score: f64,

    /// Named signals that contributed to the score
    pub indicators: Vec<String>,

    /// Recommended disposition
    pub recommended_action: RecommendedAction,
}

/// External AI/ML risk scoring service (bounded-timeout call)
#[async_trait]
pub trait RiskScoringService: Send + Sync {
    async fn score(&self, transaction: &Transaction, context: &RiskContext)
        -> Result<RiskAssessment>;
}

/// One independent voting party ("division")
#[async_trait]
pub trait VotingParty: Send + Sync {
    /// Stable voter identifier, recorded on every vote
    fn id(&self) -> &str;

    /// Judge a transaction. Slow voters are timed out by the coordinator
    /// and treated as rejects.
    async fn vote(&self, transaction: &Transaction) -> Result<VoteRecord>;
}
