//! Consensus policy behavior through the full pipeline: unanimity,
//! threshold mode, voter timeouts, and the minimum voter floor.

use std::sync::Arc;
use std::time::Duration;

use veriflow_consensus::{ConsensusPolicy, MIN_VOTERS};
use veriflow_core::traits::VotingParty;
use veriflow_core::types::{PipelineLayer, PipelineOutcome, RejectionKind, Tier, Transaction};
use veriflow_e2e::*;
use veriflow_pipeline::{PipelineConfig, PipelineCoordinator};

fn mixed_voters(approving: usize, rejecting: usize) -> Vec<Arc<dyn VotingParty>> {
    let mut voters = approving_voters(approving);
    for i in 0..rejecting {
        voters.push(Arc::new(StubVoter::rejecting(format!("dissent-{}", i))));
    }
    voters
}

#[tokio::test]
async fn one_dissenter_defeats_unanimity() {
    let mut collab = collaborators();
    collab.voters = mixed_voters(3, 1);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "alice", Tier::Bronze, 20_000);

    let tx = Transaction::new("alice", 5_000, "acct-9", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();

    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::ConsensusRejected)
    );
    let consensus = decision.trail.results.last().unwrap();
    assert_eq!(consensus.layer, PipelineLayer::Consensus);
    assert_eq!(decision.trail.results.len(), 3);
}

#[tokio::test]
async fn threshold_mode_tolerates_a_minority_dissent() {
    let mut config = PipelineConfig::default();
    config.consensus.policy = ConsensusPolicy::Threshold { ratio: 0.66 };

    let mut collab = collaborators();
    collab.voters = mixed_voters(3, 1); // 75% approval
    let pipeline = PipelineCoordinator::new(config, SIGNING_KEY, collab).unwrap();
    onboard(&pipeline, "bob", Tier::Bronze, 20_000);

    let tx = Transaction::new("bob", 5_000, "acct-9", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Approved);
}

#[tokio::test]
async fn threshold_mode_still_rejects_below_the_ratio() {
    let mut config = PipelineConfig::default();
    config.consensus.policy = ConsensusPolicy::Threshold { ratio: 0.66 };

    let mut collab = collaborators();
    collab.voters = mixed_voters(2, 2); // 50% approval
    let pipeline = PipelineCoordinator::new(config, SIGNING_KEY, collab).unwrap();
    onboard(&pipeline, "carol", Tier::Bronze, 20_000);

    let tx = Transaction::new("carol", 5_000, "acct-9", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::ConsensusRejected)
    );
}

#[tokio::test]
async fn timed_out_voter_is_an_implicit_reject() {
    let mut config = PipelineConfig::default();
    config.consensus.voter_timeout = Duration::from_millis(50);

    let mut collab = collaborators();
    let mut voters = approving_voters(3);
    voters.push(Arc::new(StubVoter::slow(
        "division-slow",
        Duration::from_millis(500),
    )));
    collab.voters = voters;
    let pipeline = PipelineCoordinator::new(config, SIGNING_KEY, collab).unwrap();
    onboard(&pipeline, "dave", Tier::Bronze, 20_000);

    let tx = Transaction::new("dave", 5_000, "acct-9", "groceries");
    let decision = pipeline.validate(&tx).await.unwrap();

    // Unanimity with one implicit reject fails the layer.
    assert_eq!(decision.outcome, PipelineOutcome::Rejected);
    assert_eq!(
        decision.trail.rejection,
        Some(RejectionKind::ConsensusRejected)
    );
}

#[tokio::test]
async fn fewer_than_the_minimum_voters_is_an_error() {
    let mut collab = collaborators();
    collab.voters = approving_voters(MIN_VOTERS - 1);
    let pipeline = pipeline(collab);
    onboard(&pipeline, "erin", Tier::Bronze, 20_000);

    let tx = Transaction::new("erin", 5_000, "acct-9", "groceries");
    assert!(pipeline.validate(&tx).await.is_err());
}
