//! Reputation writeback through the pipeline: settled outcomes move the
//! score, tier changes reissue certificates, and confirmed fraud demotes.

use veriflow_audit::ComplianceEventKind;
use veriflow_core::types::{PipelineOutcome, Tier, Transaction};
use veriflow_e2e::*;

#[tokio::test]
async fn approvals_promote_and_reissue_the_certificate() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "alice", Tier::Bronze, 20_000);

    let tx = Transaction::new("alice", 5_000, "acct-9", "groceries");
    assert_eq!(
        pipeline.validate(&tx).await.unwrap().outcome,
        PipelineOutcome::Approved
    );

    // A clean record scores above the Platinum threshold; the Bronze
    // certificate is superseded and the revocation shows up as a
    // compliance event.
    let snapshot = pipeline.get_reputation(&"alice".to_string());
    assert_eq!(snapshot.tier, Tier::Platinum);
    assert_eq!(snapshot.success_rate, 1.0);
    assert!(pipeline
        .compliance_events()
        .iter()
        .any(|e| e.kind == ComplianceEventKind::CertificateRevoked));
}

#[tokio::test]
async fn confirmed_fraud_demotes_immediately() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "bob", Tier::Bronze, 20_000);

    let tx = Transaction::new("bob", 5_000, "acct-9", "groceries");
    pipeline.validate(&tx).await.unwrap();
    let before = pipeline.get_reputation(&"bob".to_string());
    assert_eq!(before.tier, Tier::Platinum);

    pipeline
        .confirm_fraud(&"bob".to_string(), "chargeback confirmed by issuer")
        .await
        .unwrap();

    let after = pipeline.get_reputation(&"bob".to_string());
    assert!(after.score < before.score);
    assert_eq!(after.fraud_incidents, 1);
    assert_ne!(after.tier, Tier::Platinum);
    assert!(pipeline
        .compliance_events()
        .iter()
        .any(|e| e.kind == ComplianceEventKind::FraudConfirmed));
}

#[tokio::test]
async fn confirming_fraud_for_an_unknown_agent_is_an_error() {
    let pipeline = pipeline(collaborators());
    assert!(pipeline
        .confirm_fraud(&"stranger".to_string(), "noise")
        .await
        .is_err());
}

#[tokio::test]
async fn rejections_drag_the_success_rate_down() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "carol", Tier::Bronze, 500);

    for i in 0..10 {
        let tx = Transaction::new("carol", 5_000, "acct-9", format!("over balance {}", i));
        assert_eq!(
            pipeline.validate(&tx).await.unwrap().outcome,
            PipelineOutcome::Rejected
        );
    }

    let snapshot = pipeline.get_reputation(&"carol".to_string());
    assert_eq!(snapshot.success_rate, 0.0);
    assert!(snapshot.tier < Tier::Gold);
}
