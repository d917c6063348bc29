//! Stub collaborators and wiring helpers for end-to-end pipeline tests.
//!
//! Every external seam gets a controllable stand-in: custody, the
//! settlement rail, the risk scorer, voting parties, the trail store, and
//! the alert sink. Defaults are friendly, so a test only overrides the
//! seam it is exercising.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use veriflow_audit::{AlertSink, InMemoryTrailStore, OperatorAlert, TrailStore};
use veriflow_core::error::{PipelineError, Result};
use veriflow_core::traits::{
    CustodyService, FeasibilityEstimate, RecommendedAction, RiskAssessment, RiskContext,
    RiskScoringService, SettlementNetwork, VotingParty,
};
use veriflow_core::types::{
    Agent, AgentId, Amount, AuditTrail, Tier, Transaction, VoteDecision, VoteRecord,
};
use veriflow_pipeline::{Collaborators, PipelineConfig, PipelineCoordinator};

/// Fixed certificate signing key shared by every test pipeline
pub const SIGNING_KEY: [u8; 32] = [7u8; 32];

/// Custody that is always down; the pipeline falls back to the balance the
/// agent was registered with, which makes tests deterministic.
pub struct UnreachableCustody;

#[async_trait]
impl CustodyService for UnreachableCustody {
    async fn get_balance(&self, agent_id: &AgentId) -> Result<Amount> {
        Err(PipelineError::Collaborator(format!(
            "custody unreachable for {}",
            agent_id
        )))
    }
}

/// Custody reporting one fixed balance for every agent
pub struct FixedCustody(pub Amount);

#[async_trait]
impl CustodyService for FixedCustody {
    async fn get_balance(&self, _agent_id: &AgentId) -> Result<Amount> {
        Ok(self.0)
    }
}

/// Settlement rail returning a fixed estimate
pub struct StubRail {
    pub feasible: bool,
    pub estimated_cost: Amount,
}

impl Default for StubRail {
    fn default() -> Self {
        Self {
            feasible: true,
            estimated_cost: 150,
        }
    }
}

#[async_trait]
impl SettlementNetwork for StubRail {
    async fn estimate_feasibility(&self, _transaction: &Transaction) -> Result<FeasibilityEstimate> {
        Ok(FeasibilityEstimate {
            feasible: self.feasible,
            estimated_cost: self.estimated_cost,
            estimated_latency: Duration::from_secs(5),
        })
    }
}

/// Rail whose probe always errors
pub struct BrokenRail;

#[async_trait]
impl SettlementNetwork for BrokenRail {
    async fn estimate_feasibility(&self, _transaction: &Transaction) -> Result<FeasibilityEstimate> {
        Err(PipelineError::Collaborator("rail probe failed".to_string()))
    }
}

/// Risk scorer returning a fixed score
pub struct FixedScorer(pub f64);

#[async_trait]
impl RiskScoringService for FixedScorer {
    async fn score(
        &self,
        _transaction: &Transaction,
        _context: &RiskContext,
    ) -> Result<RiskAssessment> {
        Ok(RiskAssessment {
            risk_score: self.0,
            indicators: vec!["stub_model".to_string()],
            recommended_action: if self.0 >= 0.7 {
                RecommendedAction::Block
            } else {
                RecommendedAction::Approve
            },
        })
    }
}

/// Scorer that always errors, forcing the deterministic fallback
pub struct DownScorer;

#[async_trait]
impl RiskScoringService for DownScorer {
    async fn score(
        &self,
        _transaction: &Transaction,
        _context: &RiskContext,
    ) -> Result<RiskAssessment> {
        Err(PipelineError::Collaborator("scoring service down".to_string()))
    }
}

/// Voting party with a fixed decision, optional latency, and a call counter
pub struct StubVoter {
    id: String,
    decision: VoteDecision,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StubVoter {
    pub fn approving(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            decision: VoteDecision::Approve,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(id: impl Into<String>) -> Self {
        Self {
            decision: VoteDecision::Reject,
            ..Self::approving(id)
        }
    }

    pub fn slow(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::approving(id)
        }
    }

    /// How many votes this party has been asked for
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VotingParty for StubVoter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn vote(&self, transaction: &Transaction) -> Result<VoteRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(VoteRecord {
            voter_id: self.id.clone(),
            transaction_id: transaction.id,
            decision: self.decision,
            confidence: 0.9,
            rationale: "stub vote".to_string(),
            cast_at: Utc::now(),
        })
    }
}

/// Trail store whose every persist fails
pub struct BrokenStore;

#[async_trait]
impl TrailStore for BrokenStore {
    async fn persist(&self, _trail: &AuditTrail) -> Result<()> {
        Err(PipelineError::Internal("store offline".to_string()))
    }

    async fn latest(&self, _transaction_id: Uuid) -> Option<AuditTrail> {
        None
    }

    async fn in_range(
        &self,
        _from: chrono::DateTime<Utc>,
        _to: chrono::DateTime<Utc>,
    ) -> Vec<AuditTrail> {
        Vec::new()
    }
}

/// Alert sink recording everything it is handed
#[derive(Default)]
pub struct CapturingAlerts(RwLock<Vec<OperatorAlert>>);

impl CapturingAlerts {
    pub fn alerts(&self) -> Vec<OperatorAlert> {
        self.0.read().clone()
    }
}

impl AlertSink for CapturingAlerts {
    fn raise(&self, alert: OperatorAlert) {
        self.0.write().push(alert);
    }
}

/// `n` approving voters named `division-0..n`
pub fn approving_voters(n: usize) -> Vec<Arc<dyn VotingParty>> {
    (0..n)
        .map(|i| Arc::new(StubVoter::approving(format!("division-{}", i))) as Arc<dyn VotingParty>)
        .collect()
}

/// Friendly defaults: unreachable custody (registered balances win), a
/// feasible rail, a low-risk scorer, four approving voters, an in-memory
/// store, and a null-ish capturing alert sink.
pub fn collaborators() -> Collaborators {
    Collaborators {
        custody: Arc::new(UnreachableCustody),
        settlement: Arc::new(StubRail::default()),
        risk_scorer: Arc::new(FixedScorer(0.1)),
        voters: approving_voters(4),
        trail_store: Arc::new(InMemoryTrailStore::new()),
        alert_sink: Arc::new(CapturingAlerts::default()),
    }
}

/// Build a pipeline with the default configuration
pub fn pipeline(collaborators: Collaborators) -> PipelineCoordinator {
    PipelineCoordinator::new(PipelineConfig::default(), SIGNING_KEY, collaborators)
        .expect("default pipeline config is valid")
}

/// Register an agent and issue its certificate
pub fn onboard(pipeline: &PipelineCoordinator, id: &str, tier: Tier, balance: Amount) {
    pipeline.register_agent(Agent::new(id, tier, balance));
    pipeline
        .issue_certificate(&id.to_string(), tier)
        .expect("agent was just registered");
}
