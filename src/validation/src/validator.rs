//! Ordered fail-fast checks ahead of consensus

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::Result;
use crate::patterns::{PatternDetector, PatternFlag};
use crate::velocity::{TierVelocityTable, VelocityTracker};
use veriflow_core::types::{
    Agent, PipelineLayer, RejectionKind, Transaction, ValidationResult,
};
use veriflow_credential::{CredentialRegistry, Verification};

/// Validator configuration
#[derive(Debug, Clone, Default)]
pub struct ValidatorConfig {
    /// Per-tier rolling-window caps
    pub velocity_table: TierVelocityTable,
}

/// Outcome of the rate-and-pattern layer: one result plus any advisory
/// pattern flags for later layers.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub result: ValidationResult,
    pub flags: Vec<PatternFlag>,
}

impl RateDecision {
    pub fn is_pass(&self) -> bool {
        self.result.is_pass()
    }
}

/// Runs the ordered static and behavioral checks.
///
/// Never consumes velocity budget itself; the coordinator records an
/// admission only after the transaction is fully approved, holding the
/// per-agent lock across check and record.
pub struct RateValidator {
    credentials: Arc<CredentialRegistry>,
    velocity: VelocityTracker,
    patterns: PatternDetector,
    blacklist: DashSet<String>,
}

impl RateValidator {
    pub fn new(config: ValidatorConfig, credentials: Arc<CredentialRegistry>) -> Result<Self> {
        Ok(Self {
            credentials,
            velocity: VelocityTracker::new(config.velocity_table)?,
            patterns: PatternDetector::new(),
            blacklist: DashSet::new(),
        })
    }

    /// Run all checks in order, failing fast with a distinct reason.
    pub fn check(&self, transaction: &Transaction, agent: &Agent, now: DateTime<Utc>) -> RateDecision {
        let started = Instant::now();
        let layer = PipelineLayer::RatePattern;

        // 1. Agent must be active.
        if !agent.active {
            return Self::reject(
                layer,
                RejectionKind::CredentialInvalid,
                format!("agent {} is deactivated", agent.id),
                started,
            );
        }

        // 2. Certificate must verify (delegated to the registry).
        if let Verification::Invalid(failure) = self.credentials.verify(&agent.id) {
            return Self::reject(
                layer,
                RejectionKind::CredentialInvalid,
                format!("certificate check failed: {}", failure.description()),
                started,
            );
        }

        // 3. Balance and per-transaction cap.
        if agent.available_balance < transaction.amount {
            return Self::reject(
                layer,
                RejectionKind::LimitExceeded,
                format!(
                    "insufficient balance: have {}, need {}",
                    agent.available_balance, transaction.amount
                ),
                started,
            );
        }
        if transaction.amount > agent.credit_limit {
            return Self::reject(
                layer,
                RejectionKind::LimitExceeded,
                format!(
                    "amount {} exceeds credit limit {}",
                    transaction.amount, agent.credit_limit
                ),
                started,
            );
        }

        // 4. Blacklist membership.
        if self.blacklist.contains(&transaction.counterparty) {
            info!(
                transaction_id = %transaction.id,
                counterparty = %transaction.counterparty,
                "blacklisted counterparty"
            );
            return Self::reject(
                layer,
                RejectionKind::Blacklisted,
                format!("counterparty {} is blacklisted", transaction.counterparty),
                started,
            );
        }

        // 5. Velocity windows for the agent's tier.
        if let Some(window) = self.velocity.would_exceed(&agent.id, agent.tier, now) {
            return Self::reject(
                layer,
                RejectionKind::LimitExceeded,
                format!(
                    "{} velocity limit reached for tier {}",
                    window.as_str(),
                    agent.tier.as_str()
                ),
                started,
            );
        }

        // 6. Pattern heuristics: advisory only.
        let flags = self.patterns.inspect(transaction);
        let penalty = PatternDetector::combined_penalty(&flags);
        let flag_names: Vec<&str> = flags.iter().map(PatternFlag::as_str).collect();
        debug!(transaction_id = %transaction.id, ?flag_names, penalty, "rate checks passed");

        let result = ValidationResult::pass(layer, "rate and pattern checks passed")
            .with_score(1.0 - penalty)
            .with_metadata(serde_json::json!({
                "pattern_flags": flag_names,
                "confidence_penalty": penalty,
            }))
            .with_elapsed_ms(started.elapsed().as_millis() as u64);
        RateDecision { result, flags }
    }

    /// Consume one velocity slot after final approval
    pub fn record_admission(&self, agent: &Agent, now: DateTime<Utc>) {
        self.velocity.record_admission(&agent.id, now);
    }

    /// Authoritative velocity re-check for the admission step. The
    /// coordinator calls this under the per-agent lock so two concurrent
    /// validations cannot both claim the last budget slot.
    pub fn velocity_exceeded(
        &self,
        agent: &Agent,
        now: DateTime<Utc>,
    ) -> Option<crate::velocity::WindowKind> {
        self.velocity.would_exceed(&agent.id, agent.tier, now)
    }

    /// Add a counterparty to the blacklist
    pub fn blacklist_counterparty(&self, counterparty: impl Into<String>) {
        self.blacklist.insert(counterparty.into());
    }

    /// Remove a counterparty from the blacklist
    pub fn unblacklist_counterparty(&self, counterparty: &str) {
        self.blacklist.remove(counterparty);
    }

    fn reject(
        layer: PipelineLayer,
        kind: RejectionKind,
        reason: String,
        started: Instant,
    ) -> RateDecision {
        debug!(%reason, "rate check failed");
        RateDecision {
            result: ValidationResult::fail(layer, kind, reason)
                .with_elapsed_ms(started.elapsed().as_millis() as u64),
            flags: Vec::new(),
        }
    }
}
