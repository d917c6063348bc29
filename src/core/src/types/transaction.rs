//! Transactions and consensus votes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::{AgentId, Amount};

/// Declared transaction class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    /// Standard peer transfer
    Transfer,

    /// Payment for goods or services
    Payment,

    /// Reversal of a prior settled payment
    Refund,

    /// Funds held pending a condition
    Escrow,
}

/// A proposed funds movement. Immutable once created; a transaction id is
/// never reused for a different payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction id
    pub id: Uuid,

    /// Originating agent
    pub agent_id: AgentId,

    /// Amount in smallest currency unit
    pub amount: Amount,

    /// Counterparty address or identifier
    pub counterparty: String,

    /// Free-text description supplied by the agent
    pub description: String,

    /// Declared transaction class
    pub tx_type: TransactionType,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Optional settlement deadline
    pub deadline: Option<DateTime<Utc>>,
}

impl Transaction {
    /// Build a transfer with a fresh id, created now
    pub fn new(
        agent_id: impl Into<AgentId>,
        amount: Amount,
        counterparty: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            amount,
            counterparty: counterparty.into(),
            description: description.into(),
            tx_type: TransactionType::Transfer,
            created_at: Utc::now(),
            deadline: None,
        }
    }

    /// Content fingerprint used to detect id reuse with a different payload.
    ///
    /// Covers every caller-supplied field; excludes nothing but the id
    /// itself, so two submissions with equal ids and equal fingerprints are
    /// the same transaction.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.agent_id.as_bytes());
        hasher.update(&self.amount.to_le_bytes());
        hasher.update(self.counterparty.as_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(format!("{:?}", self.tx_type).as_bytes());
        hasher.update(self.created_at.timestamp_millis().to_le_bytes().as_ref());
        hasher.finalize().to_hex().to_string()
    }
}

/// One voting party's judgment on a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteDecision {
    Approve,
    Reject,
    Abstain,
}

/// A single division's vote. Immutable once cast; the set of votes for a
/// transaction is owned by the consensus coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Voting party identifier
    pub voter_id: String,

    /// Transaction being judged
    pub transaction_id: Uuid,

    /// The vote
    pub decision: VoteDecision,

    /// Voter confidence in its own decision (0-1)
    pub confidence: f64,

    /// Free-text rationale
    pub rationale: String,

    /// When the vote was cast
    pub cast_at: DateTime<Utc>,
}
