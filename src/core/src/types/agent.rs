//! Agents, tiers, and credentials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable agent identifier, assigned externally and never reused
pub type AgentId = String;

/// Monetary amount in smallest currency unit (e.g. cents)
pub type Amount = u64;

/// Ranked agent classification controlling velocity limits and permissions.
///
/// Ordering is meaningful: `Bronze < Silver < Gold < Platinum`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    /// All tiers in ascending order
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Platinum];

    /// Human-readable tier name
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
        }
    }

    /// Permissions granted by this tier
    pub fn permissions(&self) -> Vec<Permission> {
        match self {
            Tier::Bronze => vec![Permission::Transfer],
            Tier::Silver => vec![Permission::Transfer, Permission::HighValueTransfer],
            Tier::Gold | Tier::Platinum => vec![
                Permission::Transfer,
                Permission::HighValueTransfer,
                Permission::BulkTransfer,
            ],
        }
    }
}

/// Action classes a certificate may grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Ordinary funds transfer
    Transfer,

    /// Transfers above the standard per-transaction cap
    HighValueTransfer,

    /// Batched multi-counterparty transfers
    BulkTransfer,
}

/// An autonomous principal allowed to propose funds movements.
///
/// Agents are never deleted, only deactivated. Tier and reputation are
/// rewritten by the registry and reputation engine after settled outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Stable identifier
    pub id: AgentId,

    /// Current tier (drives velocity limits and permissions)
    pub tier: Tier,

    /// Spendable balance as last reported by the custody service
    pub available_balance: Amount,

    /// Maximum single-transaction amount
    pub credit_limit: Amount,

    /// Reputation score (0-100)
    pub reputation_score: f64,

    /// Active certificate, if one has been issued
    pub certificate_id: Option<Uuid>,

    /// Deactivated agents fail the earliest pipeline check
    pub active: bool,
}

impl Agent {
    /// Create an active agent with a neutral starting reputation
    pub fn new(id: impl Into<AgentId>, tier: Tier, available_balance: Amount) -> Self {
        Self {
            id: id.into(),
            tier,
            available_balance,
            credit_limit: available_balance,
            reputation_score: 50.0,
            certificate_id: None,
            active: true,
        }
    }
}

/// A time-boxed credential binding an agent to a tier and permission set.
///
/// Certificates are reissued on tier change, never mutated; superseded
/// certificates are revoked and retained for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    /// Unique certificate id
    pub id: Uuid,

    /// Agent the certificate is bound to
    pub agent_id: AgentId,

    /// Tier at issue time
    pub tier: Tier,

    /// Permission set granted at issue time
    pub permissions: Vec<Permission>,

    /// Issue timestamp
    pub issued_at: DateTime<Utc>,

    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,

    /// Keyed-hash integrity signature over {agent_id, tier, expiry}, hex
    pub signature: String,

    /// Set when superseded by a reissue or explicitly revoked
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Certificate {
    /// Whether the certificate has passed its expiry
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the certificate has been revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Derived, recomputable view of an agent's trustworthiness.
///
/// Never persisted as ground truth; recomputed from outcome history and
/// cached with explicit invalidation on each settled outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationSnapshot {
    /// Agent the snapshot describes
    pub agent_id: AgentId,

    /// Weighted score (0-100)
    pub score: f64,

    /// Tier the score maps to
    pub tier: Tier,

    /// Fraction of settled transactions that were approved (0-1)
    pub success_rate: f64,

    /// Confirmed fraud incidents on record
    pub fraud_incidents: u64,

    /// Compliance component (0-1)
    pub compliance_score: f64,

    /// Community rating component (0-1)
    pub community_rating: f64,

    /// Uptime component (0-1)
    pub uptime: f64,

    /// When the snapshot was computed
    pub computed_at: DateTime<Utc>,
}
