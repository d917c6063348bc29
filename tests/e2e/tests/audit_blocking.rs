//! Audit persistence failure: the one fatal condition. A transaction whose
//! trail cannot be persisted is frozen, alerted on, and never approved.

use std::sync::Arc;

use veriflow_audit::ComplianceEventKind;
use veriflow_core::types::{PipelineOutcome, Tier, Transaction};
use veriflow_e2e::*;

#[tokio::test]
async fn persistence_failure_freezes_an_otherwise_clean_transaction() {
    let alerts = Arc::new(CapturingAlerts::default());
    let mut collab = collaborators();
    collab.trail_store = Arc::new(BrokenStore);
    collab.alert_sink = alerts.clone();
    let pipeline = pipeline(collab);
    onboard(&pipeline, "alice", Tier::Bronze, 20_000);

    // Every layer would pass; only the audit write fails.
    let tx = Transaction::new("alice", 5_000, "acct-9", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();

    assert_eq!(decision.outcome, PipelineOutcome::Blocked);
    assert_eq!(decision.trail.outcome, PipelineOutcome::Blocked);
    assert!(decision.trail.results.iter().all(|r| r.is_pass()));

    let raised = alerts.alerts();
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].transaction_id, tx.id);

    let events = pipeline.compliance_events();
    assert!(events
        .iter()
        .any(|e| e.kind == ComplianceEventKind::TransactionBlocked));
}

#[tokio::test]
async fn blocked_decision_is_cached_for_resubmission() {
    let mut collab = collaborators();
    collab.trail_store = Arc::new(BrokenStore);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "bob", Tier::Bronze, 20_000);

    let tx = Transaction::new("bob", 5_000, "acct-9", "groceries");
    assert_eq!(
        pipeline.validate(&tx).await.unwrap().outcome,
        PipelineOutcome::Blocked
    );
    assert_eq!(
        pipeline.validate(&tx).await.unwrap().outcome,
        PipelineOutcome::Blocked
    );
}

#[tokio::test]
async fn rejection_with_a_broken_store_is_also_blocked() {
    // The rejected trail cannot be sealed either; freezing wins over
    // reporting an unpersisted rejection.
    let mut collab = collaborators();
    collab.trail_store = Arc::new(BrokenStore);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "carol", Tier::Bronze, 500);

    let tx = Transaction::new("carol", 5_000, "acct-9", "over balance");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Blocked);
}
