//! Validation results, audit trails, and rejection taxonomy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::{AgentId, Amount};

/// The pipeline layer that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineLayer {
    /// Coordinator-level admission checks (idempotency, id reuse) that run
    /// before the first validation layer
    Admission,
    Credential,
    RatePattern,
    Consensus,
    FraudAssessment,
    SettlementFeasibility,
    Audit,
}

impl PipelineLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineLayer::Admission => "admission",
            PipelineLayer::Credential => "credential",
            PipelineLayer::RatePattern => "rate_pattern",
            PipelineLayer::Consensus => "consensus",
            PipelineLayer::FraudAssessment => "fraud_assessment",
            PipelineLayer::SettlementFeasibility => "settlement_feasibility",
            PipelineLayer::Audit => "audit",
        }
    }
}

/// Outcome of exactly one pipeline layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Layer passed; pipeline continues
    Pass,

    /// Layer rejected the transaction; pipeline short-circuits
    Fail,

    /// Layer hit a system fault (distinct from a business rejection)
    Error,
}

/// Structured reason a transaction was rejected. These are expected business
/// outcomes, never system failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionKind {
    /// Missing, expired, or tampered certificate
    CredentialInvalid,

    /// Balance, per-transaction cap, or velocity window exceeded
    LimitExceeded,

    /// Counterparty on the blacklist
    Blacklisted,

    /// A voter rejected or timed out under the active consensus policy
    ConsensusRejected,

    /// Oracle or fallback risk score above threshold
    FraudSuspected,

    /// Settlement layer cannot structurally execute the transfer
    SettlementInfeasible,

    /// Transaction id resubmitted with a different payload
    DuplicateTransactionId,
}

impl RejectionKind {
    pub fn description(&self) -> &'static str {
        match self {
            RejectionKind::CredentialInvalid => "certificate missing, expired, or tampered",
            RejectionKind::LimitExceeded => "balance, cap, or velocity limit exceeded",
            RejectionKind::Blacklisted => "counterparty is blacklisted",
            RejectionKind::ConsensusRejected => "voting parties did not reach approval",
            RejectionKind::FraudSuspected => "risk score above fraud threshold",
            RejectionKind::SettlementInfeasible => "transaction cannot settle structurally",
            RejectionKind::DuplicateTransactionId => "transaction id reused with a new payload",
        }
    }
}

/// One layer's outcome for one transaction attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Layer that produced this result
    pub layer: PipelineLayer,

    /// Pass, fail, or error
    pub status: ValidationStatus,

    /// Rejection taxonomy entry when status is `Fail`
    pub rejection: Option<RejectionKind>,

    /// Layer-specific score or metric (risk score, mean confidence, ...)
    pub score: Option<f64>,

    /// Human-readable reason, always populated
    pub reason: String,

    /// Wall-clock time the layer spent, in milliseconds
    pub elapsed_ms: u64,

    /// Layer-specific structured metadata (oracle method, indicators,
    /// pattern flags). Null when the layer has nothing to add.
    pub metadata: serde_json::Value,
}

impl ValidationResult {
    /// Build a passing result
    pub fn pass(layer: PipelineLayer, reason: impl Into<String>) -> Self {
        Self {
            layer,
            status: ValidationStatus::Pass,
            rejection: None,
            score: None,
            reason: reason.into(),
            elapsed_ms: 0,
            metadata: serde_json::Value::Null,
        }
    }

    /// Build a failing result carrying its rejection kind
    pub fn fail(layer: PipelineLayer, kind: RejectionKind, reason: impl Into<String>) -> Self {
        Self {
            layer,
            status: ValidationStatus::Fail,
            rejection: Some(kind),
            score: None,
            reason: reason.into(),
            elapsed_ms: 0,
            metadata: serde_json::Value::Null,
        }
    }

    /// Build an error result for a system fault inside a layer
    pub fn error(layer: PipelineLayer, reason: impl Into<String>) -> Self {
        Self {
            layer,
            status: ValidationStatus::Error,
            rejection: None,
            score: None,
            reason: reason.into(),
            elapsed_ms: 0,
            metadata: serde_json::Value::Null,
        }
    }

    /// Attach a numeric score or metric
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Attach structured metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record elapsed time
    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn is_pass(&self) -> bool {
        self.status == ValidationStatus::Pass
    }
}

/// Terminal decision for one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineOutcome {
    /// Every layer passed and the trail was sealed
    Approved,

    /// A layer failed; the trail records the first failing reason
    Rejected,

    /// Cancelled upstream before reaching a terminal decision
    Cancelled,

    /// Audit persistence failed after bounded retry; frozen pending operator
    /// action, never reported as approved
    Blocked,
}

impl PipelineOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Approved => "approved",
            PipelineOutcome::Rejected => "rejected",
            PipelineOutcome::Cancelled => "cancelled",
            PipelineOutcome::Blocked => "blocked",
        }
    }
}

/// Append-only record of one transaction's trip through the pipeline.
///
/// Sealed exactly once when the transaction reaches a terminal outcome;
/// sealed trails are never edited, corrections are appended as new linked
/// records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    /// Transaction the trail describes
    pub transaction_id: Uuid,

    /// Originating agent
    pub agent_id: AgentId,

    /// Per-layer results in pipeline order. Partial only for non-approved
    /// outcomes.
    pub results: Vec<ValidationResult>,

    /// Terminal decision
    pub outcome: PipelineOutcome,

    /// First failing layer's rejection, when rejected
    pub rejection: Option<RejectionKind>,

    /// When validation began
    pub initiated_at: DateTime<Utc>,

    /// When the terminal decision was reached
    pub completed_at: DateTime<Utc>,

    /// Total pipeline wall-clock time in milliseconds
    pub total_elapsed_ms: u64,

    /// Id of a prior trail this one corrects, if any
    pub corrects: Option<Uuid>,
}

impl AuditTrail {
    /// Whether every recorded layer passed
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(ValidationResult::is_pass)
    }

    /// The first failing result, if any
    pub fn first_failure(&self) -> Option<&ValidationResult> {
        self.results.iter().find(|r| !r.is_pass())
    }
}

/// A settled transaction outcome, the unit of reputation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettledOutcome {
    /// Transaction that settled
    pub transaction_id: Uuid,

    /// Amount moved (or attempted)
    pub amount: Amount,

    /// Terminal pipeline outcome
    pub outcome: PipelineOutcome,

    /// Set when the transaction was later confirmed fraudulent
    pub fraud_confirmed: bool,

    /// Settlement timestamp
    pub completed_at: DateTime<Utc>,
}
