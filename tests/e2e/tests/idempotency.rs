//! Idempotent re-submission, id reuse, and cancellation semantics.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use veriflow_core::traits::VotingParty;
use veriflow_core::types::{PipelineOutcome, RejectionKind, Tier, Transaction};
use veriflow_e2e::*;

#[tokio::test]
async fn resubmission_returns_the_cached_decision_once() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "alice", Tier::Bronze, 20_000);

    let tx = Transaction::new("alice", 5_000, "acct-9", "groceries");
    let first = pipeline.validate(&tx).await.unwrap();
    assert_eq!(first.outcome, PipelineOutcome::Approved);

    for _ in 0..3 {
        let again = pipeline.validate(&tx).await.unwrap();
        assert_eq!(again.outcome, PipelineOutcome::Approved);
        assert_eq!(again.trail.completed_at, first.trail.completed_at);
    }

    // Exactly one sealed trail exists for the id.
    let report = pipeline
        .generate_compliance_report(
            tx.created_at - chrono::Duration::minutes(1),
            chrono::Utc::now() + chrono::Duration::minutes(1),
        )
        .await;
    assert_eq!(report.total, 1);
    assert_eq!(report.approved, 1);
}

#[tokio::test]
async fn resubmission_does_not_consume_velocity_budget() {
    // Two admissions per minute for every tier; a replayed approval must
    // count once against that budget.
    let mut config = veriflow_pipeline::PipelineConfig::default();
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
    let pipeline =
        veriflow_pipeline::PipelineCoordinator::new(config, SIGNING_KEY, collaborators()).unwrap();
    onboard(&pipeline, "bob", Tier::Bronze, 1_000_000);

    let tx = Transaction::new("bob", 1_000, "acct-9", "transfer");
    pipeline.validate(&tx).await.unwrap();
    for _ in 0..10 {
        pipeline.validate(&tx).await.unwrap();
    }

    // One budget slot left.
    let fresh = Transaction::new("bob", 1_000, "acct-9", "second transfer");
    assert_eq!(
        pipeline.validate(&fresh).await.unwrap().outcome,
        PipelineOutcome::Approved
    );
    let over = Transaction::new("bob", 1_000, "acct-9", "third transfer");
    let decision = pipeline.validate(&over).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(decision.trail.rejection, Some(RejectionKind::LimitExceeded));
}

#[tokio::test]
async fn concurrent_resubmission_is_validated_once() {
    // Slow voters hold the first submission inside the pipeline while the
    // second one arrives.
    let voters: Vec<Arc<StubVoter>> = (0..4)
        .map(|i| {
            Arc::new(StubVoter::slow(
                format!("division-{}", i),
                Duration::from_millis(200),
            ))
        })
        .collect();
    let mut collab = collaborators();
    collab.voters = voters
        .iter()
        .map(|v| v.clone() as Arc<dyn VotingParty>)
        .collect();
    let pipeline = Arc::new(pipeline(collab));
    onboard(&pipeline, "fay", Tier::Bronze, 20_000);

    let tx = Transaction::new("fay", 5_000, "acct-9", "groceries");
    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        let tx = tx.clone();
        async move { pipeline.validate(&tx).await }
    });
    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        let tx = tx.clone();
        async move { pipeline.validate(&tx).await }
    });

    let a = first.await.unwrap().unwrap();
    let b = second.await.unwrap().unwrap();
    assert_eq!(a.outcome, PipelineOutcome::Approved);
    assert_eq!(b.outcome, PipelineOutcome::Approved);
    assert_eq!(a.trail.completed_at, b.trail.completed_at);

    // One sealed trail, one vote request per voter.
    let report = pipeline
        .generate_compliance_report(
            tx.created_at - chrono::Duration::minutes(1),
            chrono::Utc::now() + chrono::Duration::minutes(1),
        )
        .await;
    assert_eq!(report.total, 1);
    for voter in &voters {
        assert_eq!(voter.calls(), 1);
    }
}

#[tokio::test]
async fn id_reuse_with_a_different_payload_is_rejected() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "carol", Tier::Bronze, 20_000);

    let tx = Transaction::new("carol", 5_000, "acct-9", "groceries");
    let original = pipeline.validate(&tx).await.unwrap();
    assert_eq!(original.outcome, PipelineOutcome::Approved);

    let mut forged = tx.clone();
    forged.amount = 9_000;
    let decision = pipeline.validate(&forged).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::DuplicateTransactionId)
    );

    // The original sealed trail still owns the id, and the genuine payload
    // still replays the approval.
    let stored = pipeline.audit_trail(tx.id).await.unwrap();
    assert_eq!(stored.outcome, PipelineOutcome::Approved);
    let replay = pipeline.validate(&tx).await.unwrap();
    assert_eq!(replay.outcome, PipelineOutcome::Approved);
}

#[tokio::test]
async fn cancellation_before_validation_seals_a_cancelled_trail() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "dave", Tier::Bronze, 20_000);

    let id = Uuid::new_v4();
    let trail = pipeline
        .cancel(id, &"dave".to_string())
        .await
        .unwrap()
        .expect("not in flight, sealed immediately");
    assert_eq!(trail.outcome, PipelineOutcome::Cancelled);
    assert_eq!(
        pipeline.audit_trail(id).await.unwrap().outcome,
        PipelineOutcome::Cancelled
    );

    // The id is consumed: a later submission under it replays the
    // cancellation instead of validating.
    let mut tx = Transaction::new("dave", 5_000, "acct-9", "late arrival");
    tx.id = id;
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Cancelled);
}

#[tokio::test]
async fn cancellation_mid_flight_is_honored_at_the_next_layer() {
    let mut collab = collaborators();
    collab.voters = (0..4)
        .map(|i| {
            Arc::new(StubVoter::slow(
                format!("division-{}", i),
                Duration::from_millis(300),
            )) as Arc<dyn VotingParty>
        })
        .collect();
    let pipeline = Arc::new(pipeline(collab));
    onboard(&pipeline, "hana", Tier::Bronze, 20_000);

    let tx = Transaction::new("hana", 5_000, "acct-9", "groceries");
    let running = tokio::spawn({
        let pipeline = pipeline.clone();
        let tx = tx.clone();
        async move { pipeline.validate(&tx).await }
    });

    // Let the run reach the consensus layer, then cancel under it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let deferred = pipeline.cancel(tx.id, &"hana".to_string()).await.unwrap();
    assert!(deferred.is_none(), "in-flight cancellation is deferred");

    let decision = running.await.unwrap().unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Cancelled);
    assert!(!decision.trail.results.is_empty());
    assert!(decision.trail.results.len() < 5);
    assert!(decision.trail.results.iter().all(|r| r.is_pass()));

    let sealed = pipeline.audit_trail(tx.id).await.expect("cancellation sealed");
    assert_eq!(sealed.outcome, PipelineOutcome::Cancelled);
}

#[tokio::test]
async fn cancellation_after_a_failed_validation_is_not_deferred() {
    let mut collab = collaborators();
    // Three voters is below the consensus floor, so validation errors out
    // at the consensus layer.
    collab.voters = approving_voters(3);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "gus", Tier::Bronze, 20_000);

    let tx = Transaction::new("gus", 5_000, "acct-9", "groceries");
    assert!(pipeline.validate(&tx).await.is_err());

    // The failed run released the id, so the cancellation seals now
    // instead of waiting on a validation that is no longer running.
    let trail = pipeline
        .cancel(tx.id, &"gus".to_string())
        .await
        .unwrap()
        .expect("id is no longer in flight");
    assert_eq!(trail.outcome, PipelineOutcome::Cancelled);
    assert_eq!(
        pipeline.audit_trail(tx.id).await.unwrap().outcome,
        PipelineOutcome::Cancelled
    );
}

#[tokio::test]
async fn cancelling_a_terminal_transaction_is_an_error() {
    let pipeline = pipeline(collaborators());
    onboard(&pipeline, "erin", Tier::Bronze, 20_000);

    let tx = Transaction::new("erin", 5_000, "acct-9", "groceries");
    pipeline.validate(&tx).await.unwrap();
    assert!(pipeline.cancel(tx.id, &"erin".to_string()).await.is_err());
}
