//! Certificate issuance, verification, and revocation

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CredentialError, Result};
use veriflow_core::types::{AgentId, Certificate, Tier};

/// Default certificate validity (one year)
const DEFAULT_VALIDITY_DAYS: i64 = 365;

/// Registry configuration
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// How long an issued certificate stays valid
    pub validity: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            validity: Duration::days(DEFAULT_VALIDITY_DAYS),
        }
    }
}

/// Why verification failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    /// Agent has no active certificate
    NoCertificate,

    /// Certificate is past its expiry
    Expired,

    /// Stored signature does not match a recomputed one
    IntegrityMismatch,
}

impl CredentialFailure {
    pub fn description(&self) -> &'static str {
        match self {
            CredentialFailure::NoCertificate => "no active certificate on record",
            CredentialFailure::Expired => "certificate past expiry",
            CredentialFailure::IntegrityMismatch => "certificate signature mismatch",
        }
    }
}

/// Verification outcome
#[derive(Debug, Clone)]
pub enum Verification {
    /// Certificate is present, unexpired, and integrity-checked
    Valid(Certificate),

    /// Certificate is unusable; the transaction must not proceed
    Invalid(CredentialFailure),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

/// Receives revocation events for compliance recording
pub trait RevocationSink: Send + Sync {
    fn certificate_revoked(&self, certificate: &Certificate, reason: &str);
}

/// Sink that drops revocation events (tests, standalone use)
#[derive(Debug, Default)]
pub struct NullRevocationSink;

impl RevocationSink for NullRevocationSink {
    fn certificate_revoked(&self, _certificate: &Certificate, _reason: &str) {}
}

/// Issues and verifies per-agent certificates.
///
/// One active certificate per agent at a time; issuing a new one revokes the
/// prior. Revoked certificates are retained, never overwritten.
pub struct CredentialRegistry {
    config: CredentialConfig,

    /// Keyed-hash signing key. Held in memory only; rotation reissues
    /// everything.
    signing_key: [u8; 32],

    /// Active certificate per agent
    active: DashMap<AgentId, Certificate>,

    /// Revoked certificates per agent, in revocation order
    revoked: DashMap<AgentId, Vec<Certificate>>,

    /// Revocation event fan-out
    revocation_sink: Arc<dyn RevocationSink>,
}

impl CredentialRegistry {
    pub fn new(
        signing_key: [u8; 32],
        config: CredentialConfig,
        revocation_sink: Arc<dyn RevocationSink>,
    ) -> Self {
        Self {
            config,
            signing_key,
            active: DashMap::new(),
            revoked: DashMap::new(),
            revocation_sink,
        }
    }

    /// Issue a certificate for `agent_id` at `tier`, revoking any prior
    /// active certificate for that agent.
    pub fn issue(&self, agent_id: &AgentId, tier: Tier) -> Certificate {
        if self.active.contains_key(agent_id) {
            // Reissue path: supersede, never mutate.
            if let Err(e) = self.revoke(agent_id, "superseded by reissue") {
                warn!(agent_id = %agent_id, error = %e, "revocation on reissue failed");
            }
        }

        let now = Utc::now();
        let expires_at = now + self.config.validity;
        let certificate = Certificate {
            id: Uuid::new_v4(),
            agent_id: agent_id.clone(),
            tier,
            permissions: tier.permissions(),
            issued_at: now,
            expires_at,
            signature: self.sign(agent_id, tier, expires_at),
            revoked_at: None,
        };

        info!(
            agent_id = %agent_id,
            tier = tier.as_str(),
            certificate_id = %certificate.id,
            "issued certificate"
        );
        self.active.insert(agent_id.clone(), certificate.clone());
        certificate
    }

    /// Verify the agent's active certificate.
    ///
    /// Fails with `NoCertificate`, `Expired`, or `IntegrityMismatch`, in
    /// that order of precedence.
    pub fn verify(&self, agent_id: &AgentId) -> Verification {
        let cert = match self.active.get(agent_id) {
            Some(entry) => entry.clone(),
            None => return Verification::Invalid(CredentialFailure::NoCertificate),
        };

        let now = Utc::now();
        if cert.is_expired(now) {
            debug!(agent_id = %agent_id, expires_at = %cert.expires_at, "certificate expired");
            return Verification::Invalid(CredentialFailure::Expired);
        }

        let expected = self.sign(&cert.agent_id, cert.tier, cert.expires_at);
        if expected != cert.signature {
            warn!(agent_id = %agent_id, certificate_id = %cert.id, "certificate integrity mismatch");
            return Verification::Invalid(CredentialFailure::IntegrityMismatch);
        }

        Verification::Valid(cert)
    }

    /// Revoke the agent's active certificate, retaining it in the revocation
    /// log and notifying the compliance sink.
    pub fn revoke(&self, agent_id: &AgentId, reason: &str) -> Result<Certificate> {
        let (_, mut cert) = self
            .active
            .remove(agent_id)
            .ok_or_else(|| CredentialError::NoActiveCertificate(agent_id.clone()))?;

        cert.revoked_at = Some(Utc::now());
        info!(agent_id = %agent_id, certificate_id = %cert.id, reason, "revoked certificate");
        self.revocation_sink.certificate_revoked(&cert, reason);
        self.revoked
            .entry(agent_id.clone())
            .or_default()
            .push(cert.clone());
        Ok(cert)
    }

    /// The agent's active certificate, if any
    pub fn active_certificate(&self, agent_id: &AgentId) -> Option<Certificate> {
        self.active.get(agent_id).map(|c| c.clone())
    }

    /// Revoked certificates for an agent, oldest first
    pub fn revocation_history(&self, agent_id: &AgentId) -> Vec<Certificate> {
        self.revoked
            .get(agent_id)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Keyed BLAKE3 MAC over the fields that must not change after issue
    fn sign(&self, agent_id: &AgentId, tier: Tier, expires_at: DateTime<Utc>) -> String {
        let mut hasher = blake3::Hasher::new_keyed(&self.signing_key);
        hasher.update(agent_id.as_bytes());
        hasher.update(tier.as_str().as_bytes());
        for permission in tier.permissions() {
            hasher.update(format!("{:?}", permission).as_bytes());
        }
        hasher.update(&expires_at.timestamp_millis().to_le_bytes());
        hasher.finalize().to_hex().to_string()
    }
}
