//! Full-pipeline flows: clean approvals, layer-ordered rejections, and the
//! deterministic fallback path.

use std::sync::Arc;

use veriflow_core::types::{PipelineLayer, PipelineOutcome, RejectionKind, Tier, Transaction};
use veriflow_credential::CredentialConfig;
use veriflow_e2e::*;
use veriflow_pipeline::{PipelineConfig, PipelineCoordinator};

#[tokio::test]
async fn clean_transfer_is_approved_with_full_trail() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "alice", Tier::Bronze, 20_000);

    // $50.00 from a $200.00 balance.
    let tx = Transaction::new("alice", 5_000, "acct-grocer", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();

    assert_eq!(decision.outcome, PipelineOutcome::Approved);
    assert_eq!(decision.trail.results.len(), 5);
    assert!(decision.trail.all_passed());
    assert_eq!(
        decision.trail.results.last().unwrap().layer,
        PipelineLayer::SettlementFeasibility
    );

    // The sealed trail is durably retrievable.
    let stored = pipeline.audit_trail(tx.id).await.unwrap();
    assert_eq!(stored.outcome, PipelineOutcome::Approved);
    assert_eq!(stored.results.len(), 5);
}

#[tokio::test]
async fn scam_shaped_transfer_is_rejected_by_the_fallback() {
    // Scoring service is down; the deterministic estimator must both
    // engage and reject: round amount + zero address + urgency language.
    let mut collab = collaborators();
    collab.risk_scorer = Arc::new(DownScorer);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "mallory", Tier::Gold, 2_000_000);

    let tx = Transaction::new(
        "mallory",
        999_900,
        "0x0000000000000000000000000000000000000000",
        "URGENT: act now",
    );
    let decision = pipeline.validate(&tx).await.unwrap();

    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.rejection, Some(RejectionKind::FraudSuspected));

    let fraud = decision.trail.results.last().unwrap();
    assert_eq!(fraud.layer, PipelineLayer::FraudAssessment);
    assert_eq!(fraud.metadata["method"], "fallback");

    let report = pipeline
        .generate_compliance_report(
            tx.created_at - chrono::Duration::minutes(1),
            chrono::Utc::now() + chrono::Duration::minutes(1),
        )
        .await;
    assert_eq!(report.rejected, 1);
    assert_eq!(report.fraud_detected, 1);
    assert_eq!(report.fallback_assessments, 1);
}

#[tokio::test]
async fn velocity_exhaustion_short_circuits_before_consensus() {
    // Two admissions per minute across every tier, so promotion between
    // approvals cannot widen the budget mid-test.
    let mut config = PipelineConfig::default();
    let limits = veriflow_validation::VelocityLimits {
        per_minute: 2,
        per_hour: 50,
        per_day: 500,
    };
    config.validator.velocity_table = veriflow_validation::TierVelocityTable {
        bronze: limits,
        silver: limits,
        gold: limits,
        platinum: limits,
    };

    let voters: Vec<Arc<StubVoter>> = (0..4)
        .map(|i| Arc::new(StubVoter::approving(format!("division-{}", i))))
        .collect();
    let mut collab = collaborators();
    collab.voters = voters
        .iter()
        .map(|v| v.clone() as Arc<dyn veriflow_core::traits::VotingParty>)
        .collect();

    let pipeline = PipelineCoordinator::new(config, SIGNING_KEY, collab).unwrap();
    onboard(&pipeline, "bob", Tier::Bronze, 1_000_000);

    for i in 0..2 {
        let tx = Transaction::new("bob", 1_000, "acct-9", format!("transfer {}", i));
        let decision = pipeline.validate(&tx).await.unwrap();
        assert_eq!(decision.outcome, PipelineOutcome::Approved);
    }

    let tx = Transaction::new("bob", 1_000, "acct-9", "one too many");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.rejection, Some(RejectionKind::LimitExceeded));

    // The rejection happened at the rate layer; no votes were gathered
    // for the third transaction.
    assert_eq!(decision.trail.results.len(), 2);
    for voter in &voters {
        assert_eq!(voter.calls(), 2);
    }
}

#[tokio::test]
async fn expired_certificate_fails_the_first_layer() {
    let mut config = PipelineConfig::default();
    config.credential = CredentialConfig {
        validity: chrono::Duration::zero(),
    };
    let pipeline = PipelineCoordinator::new(config, SIGNING_KEY, collaborators()).unwrap();
    onboard(&pipeline, "carol", Tier::Silver, 50_000);

    let tx = Transaction::new("carol", 1_000, "acct-9", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();

    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.results.len(), 1);
    assert_eq!(decision.trail.results[0].layer, PipelineLayer::Credential);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::CredentialInvalid)
    );
}

#[tokio::test]
async fn deactivated_agent_is_rejected() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "dave", Tier::Bronze, 20_000);
    pipeline.deactivate_agent(&"dave".to_string()).unwrap();

    let tx = Transaction::new("dave", 1_000, "acct-9", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::CredentialInvalid)
    );
}

#[tokio::test]
async fn insufficient_balance_is_rejected_at_the_rate_layer() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "erin", Tier::Bronze, 500);

    let tx = Transaction::new("erin", 1_000, "acct-9", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.rejection, Some(RejectionKind::LimitExceeded));
    assert_eq!(decision.trail.results.len(), 2);
}

#[tokio::test]
async fn blacklisted_counterparty_is_rejected() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "frank", Tier::Bronze, 20_000);
    pipeline.blacklist_counterparty("acct-sanctioned");

    let tx = Transaction::new("frank", 1_000, "acct-sanctioned", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.rejection, Some(RejectionKind::Blacklisted));
}

#[tokio::test]
async fn infeasible_rail_estimate_rejects_after_fraud_layer() {
    let mut collab = collaborators();
    collab.settlement = Arc::new(StubRail {
        feasible: false,
        estimated_cost: 150,
    });
    let pipeline = pipeline(collab);
    onboard(&pipeline, "grace", Tier::Bronze, 20_000);

    let tx = Transaction::new("grace", 1_000, "acct-9", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::SettlementInfeasible)
    );
    assert_eq!(decision.trail.results.len(), 5);
}

#[tokio::test]
async fn broken_rail_probe_is_a_rejection_not_an_error() {
    let mut collab = collaborators();
    collab.settlement = Arc::new(BrokenRail);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "heidi", Tier::Bronze, 20_000);

    let tx = Transaction::new("heidi", 1_000, "acct-9", "transfer");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::SettlementInfeasible)
    );
}

#[tokio::test]
async fn unknown_agent_is_an_error_not_a_rejection() {
    let pipeline = pipeline(collaborators());
    let tx = Transaction::new("nobody", 1_000, "acct-9", "transfer");
    assert!(pipeline.validate(&tx).await.is_err());
}
