//! Parallel vote gathering and decision aggregation

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{ConsensusError, Result};
use veriflow_core::traits::VotingParty;
use veriflow_core::types::{
    PipelineLayer, RejectionKind, Transaction, ValidationResult, VoteDecision, VoteRecord,
};

/// Minimum voting parties for any policy
pub const MIN_VOTERS: usize = 4;

/// Default per-voter response budget
const DEFAULT_VOTER_TIMEOUT: Duration = Duration::from_secs(2);

/// How votes aggregate into a decision.
///
/// Two distinct named modes; which applies is deployment policy, never an
/// assumption.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsensusPolicy {
    /// Every voter must approve (core pipeline default)
    Unanimous,

    /// Approval ratio must meet `ratio` (e.g. 0.66 for the autonomous
    /// approval mode)
    Threshold { ratio: f64 },
}

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub policy: ConsensusPolicy,

    /// Per-voter response budget; a slower voter is an implicit reject
    pub voter_timeout: Duration,

    /// Minimum voter count, at least [`MIN_VOTERS`]
    pub min_voters: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            policy: ConsensusPolicy::Unanimous,
            voter_timeout: DEFAULT_VOTER_TIMEOUT,
            min_voters: MIN_VOTERS,
        }
    }
}

impl ConsensusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_voters < MIN_VOTERS {
            return Err(ConsensusError::Configuration(format!(
                "min_voters must be at least {}",
                MIN_VOTERS
            )));
        }
        if let ConsensusPolicy::Threshold { ratio } = self.policy {
            if !(0.0..=1.0).contains(&ratio) || ratio == 0.0 {
                return Err(ConsensusError::Configuration(format!(
                    "threshold ratio must be in (0, 1], got {}",
                    ratio
                )));
            }
        }
        Ok(())
    }
}

/// The layer result plus the immutable set of votes behind it
#[derive(Debug, Clone)]
pub struct ConsensusDecision {
    pub result: ValidationResult,
    pub votes: Vec<VoteRecord>,
}

/// Gathers votes in parallel and aggregates them under the configured policy
pub struct ConsensusCoordinator {
    config: ConsensusConfig,
}

impl ConsensusCoordinator {
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Collect one vote per configured voter and compute the decision.
    ///
    /// Voters run concurrently (gather pattern); each is bounded by the
    /// per-voter timeout so the slowest acceptable response bounds the
    /// whole stage.
    pub async fn collect_votes(
        &self,
        transaction: &Transaction,
        voters: &[Arc<dyn VotingParty>],
    ) -> Result<ConsensusDecision> {
        if voters.len() < self.config.min_voters {
            return Err(ConsensusError::InsufficientVoters {
                have: voters.len(),
                need: self.config.min_voters,
            });
        }

        let started = Instant::now();
        let ballots = voters.iter().map(|voter| {
            let voter = voter.clone();
            async move {
                let voter_id = voter.id().to_string();
                match timeout(self.config.voter_timeout, voter.vote(transaction)).await {
                    Ok(Ok(vote)) => vote,
                    Ok(Err(e)) => {
                        warn!(voter_id = %voter_id, error = %e, "voter returned an error");
                        Self::implicit_reject(&voter_id, transaction, "voter error")
                    }
                    Err(_) => {
                        warn!(voter_id = %voter_id, "voter timed out");
                        Self::implicit_reject(&voter_id, transaction, "vote timed out")
                    }
                }
            }
        });
        let votes: Vec<VoteRecord> = join_all(ballots).await;

        let approvals = votes
            .iter()
            .filter(|v| v.decision == VoteDecision::Approve)
            .count();
        let mean_confidence =
            votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len() as f64;
        let approved = match self.config.policy {
            ConsensusPolicy::Unanimous => approvals == votes.len(),
            ConsensusPolicy::Threshold { ratio } => {
                approvals as f64 / votes.len() as f64 >= ratio
            }
        };

        debug!(
            transaction_id = %transaction.id,
            approvals,
            total = votes.len(),
            mean_confidence,
            approved,
            "votes tallied"
        );

        let metadata = serde_json::json!({
            "policy": format!("{:?}", self.config.policy),
            "approvals": approvals,
            "total_voters": votes.len(),
            "rejecting_voters": votes
                .iter()
                .filter(|v| v.decision != VoteDecision::Approve)
                .map(|v| v.voter_id.clone())
                .collect::<Vec<_>>(),
        });
        let result = if approved {
            ValidationResult::pass(
                PipelineLayer::Consensus,
                format!("{}/{} voters approved", approvals, votes.len()),
            )
        } else {
            info!(transaction_id = %transaction.id, approvals, total = votes.len(), "consensus rejected");
            ValidationResult::fail(
                PipelineLayer::Consensus,
                RejectionKind::ConsensusRejected,
                format!("only {}/{} voters approved", approvals, votes.len()),
            )
        }
        .with_score(mean_confidence)
        .with_metadata(metadata)
        .with_elapsed_ms(started.elapsed().as_millis() as u64);

        Ok(ConsensusDecision { result, votes })
    }

    /// Synthetic fail-safe vote for a voter that stalled or errored
    fn implicit_reject(voter_id: &str, transaction: &Transaction, rationale: &str) -> VoteRecord {
        VoteRecord {
            voter_id: voter_id.to_string(),
            transaction_id: transaction.id,
            decision: VoteDecision::Reject,
            confidence: 0.0,
            rationale: rationale.to_string(),
            cast_at: Utc::now(),
        }
    }
}
