//! Demo wiring: stub collaborators driving the pipeline end to end

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use veriflow_audit::{InMemoryTrailStore, NullAlertSink};
use veriflow_core::error::Result as CoreResult;
use veriflow_core::traits::{
    CustodyService, FeasibilityEstimate, RecommendedAction, RiskAssessment, RiskContext,
    RiskScoringService, SettlementNetwork, VotingParty,
};
use veriflow_core::types::{
    Agent, AgentId, Amount, Tier, Transaction, VoteDecision, VoteRecord,
};
use veriflow_pipeline::{Collaborators, PipelineConfig, PipelineCoordinator};

struct StubCustody;

#[async_trait]
impl CustodyService for StubCustody {
    async fn get_balance(&self, _agent_id: &AgentId) -> CoreResult<Amount> {
        Ok(20_000) // $200.00
    }
}

struct StubRail;

#[async_trait]
impl SettlementNetwork for StubRail {
    async fn estimate_feasibility(
        &self,
        _transaction: &Transaction,
    ) -> CoreResult<FeasibilityEstimate> {
        Ok(FeasibilityEstimate {
            feasible: true,
            estimated_cost: 120,
            estimated_latency: Duration::from_secs(3),
        })
    }
}

struct StubScorer;

#[async_trait]
impl RiskScoringService for StubScorer {
    async fn score(
        &self,
        _transaction: &Transaction,
        _context: &RiskContext,
    ) -> CoreResult<RiskAssessment> {
        Ok(RiskAssessment {
            risk_score: 0.1,
            indicators: Vec::new(),
            recommended_action: RecommendedAction::Approve,
        })
    }
}

struct ApprovingVoter(String);

#[async_trait]
impl VotingParty for ApprovingVoter {
    fn id(&self) -> &str {
        &self.0
    }

    async fn vote(&self, transaction: &Transaction) -> CoreResult<VoteRecord> {
        Ok(VoteRecord {
            voter_id: self.0.clone(),
            transaction_id: transaction.id,
            decision: VoteDecision::Approve,
            confidence: 0.92,
            rationale: "within normal operating profile".to_string(),
            cast_at: Utc::now(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut signing_key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut signing_key);

    let voters: Vec<Arc<dyn VotingParty>> = (0..4)
        .map(|i| Arc::new(ApprovingVoter(format!("division-{}", i))) as Arc<dyn VotingParty>)
        .collect();
    let pipeline = PipelineCoordinator::new(
        PipelineConfig::default(),
        signing_key,
        Collaborators {
            custody: Arc::new(StubCustody),
            settlement: Arc::new(StubRail),
            risk_scorer: Arc::new(StubScorer),
            voters,
            trail_store: Arc::new(InMemoryTrailStore::new()),
            alert_sink: Arc::new(NullAlertSink),
        },
    )?;

    let agent = Agent::new("demo-agent", Tier::Bronze, 20_000);
    pipeline.register_agent(agent);
    pipeline.issue_certificate(&"demo-agent".to_string(), Tier::Bronze)?;

    let transaction = Transaction::new("demo-agent", 5_000, "acct-counterparty", "demo transfer");
    let decision = pipeline.validate(&transaction).await?;
    info!(
        outcome = decision.outcome.as_str(),
        layers = decision.trail.results.len(),
        "pipeline decision"
    );

    let report = pipeline
        .generate_compliance_report(Utc::now() - chrono::Duration::hours(1), Utc::now())
        .await;
    info!(total = report.total, approved = report.approved, "compliance report");
    Ok(())
}
