//! Error types shared across the pipeline

use thiserror::Error;
use uuid::Uuid;

/// System-level pipeline errors.
///
/// Business rejections (limits, blacklists, failed consensus, fraud flags)
/// are NOT errors: they travel as `ValidationStatus::Fail` plus a
/// [`crate::types::RejectionKind`] inside the audit trail. `Err` is reserved
/// for faults the pipeline cannot absorb.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Agent is not registered with the pipeline
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Transaction id is unknown (cancellation, trail lookup)
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),

    /// Sealed audit trail could not be durably written after bounded retry.
    /// The one fatal condition: funds must never settle without a trail.
    #[error("Audit persistence failed for transaction {transaction_id}: {reason}")]
    AuditPersistence { transaction_id: Uuid, reason: String },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// External collaborator returned a malformed response
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal invariant violation
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
