//! Trail sealing, bounded-retry persistence, and reporting queries

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::store::TrailStore;
use veriflow_core::error::{PipelineError, Result};
use veriflow_core::types::{
    AgentId, AuditTrail, PipelineOutcome, RejectionKind, ValidationResult,
};

/// Default extra persistence attempts after the first
const DEFAULT_PERSIST_RETRIES: usize = 2;

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Additional persistence attempts before the failure is fatal
    pub persist_retries: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            persist_retries: DEFAULT_PERSIST_RETRIES,
        }
    }
}

/// Operator-facing alert raised on fatal conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorAlert {
    pub transaction_id: Uuid,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

/// Receives operator alerts (pager, ticketing, log shipper)
pub trait AlertSink: Send + Sync {
    fn raise(&self, alert: OperatorAlert);
}

/// Sink that only logs the alert
#[derive(Debug, Default)]
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn raise(&self, alert: OperatorAlert) {
        error!(
            transaction_id = %alert.transaction_id,
            message = %alert.message,
            "operator alert"
        );
    }
}

/// Non-trail compliance events kept alongside the trails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComplianceEventKind {
    /// A certificate was revoked
    CertificateRevoked,

    /// A transaction was frozen after audit persistence failed
    TransactionBlocked,

    /// A confirmed fraud incident was registered
    FraudConfirmed,
}

/// One compliance event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEvent {
    pub kind: ComplianceEventKind,
    pub agent_id: AgentId,
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate counts for one day
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyBucket {
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
}

/// Aggregate view over sealed trails in a date range
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub blocked: u64,

    /// Trails rejected with `FraudSuspected`
    pub fraud_detected: u64,

    /// Trails whose fraud layer ran on the fallback path
    pub fallback_assessments: u64,

    /// Mean total pipeline latency across the range
    pub average_latency_ms: f64,

    /// Per-day outcome counts, keyed by date
    pub daily: BTreeMap<NaiveDate, DailyBucket>,
}

/// Seals trails, persists them with bounded retry, and answers reporting
/// queries. Persistence exhaustion is the pipeline's only fatal error.
pub struct ComplianceRecorder {
    config: RecorderConfig,
    store: Arc<dyn TrailStore>,
    alerts: Arc<dyn AlertSink>,

    /// Non-trail compliance events, append-only
    events: RwLock<Vec<ComplianceEvent>>,
}

impl ComplianceRecorder {
    pub fn new(
        config: RecorderConfig,
        store: Arc<dyn TrailStore>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            config,
            store,
            alerts,
            events: RwLock::new(Vec::new()),
        }
    }

    /// Seal and persist a trail for a terminal outcome.
    ///
    /// Partial result lists are permitted only for non-approved outcomes.
    /// On persistence exhaustion the error carries `AuditPersistence` and
    /// an operator alert has already been raised; the caller must report
    /// the transaction as blocked, never approved.
    pub async fn record(
        &self,
        transaction_id: Uuid,
        agent_id: &AgentId,
        results: Vec<ValidationResult>,
        outcome: PipelineOutcome,
        rejection: Option<RejectionKind>,
        initiated_at: DateTime<Utc>,
    ) -> Result<AuditTrail> {
        debug_assert!(
            outcome != PipelineOutcome::Approved
                || (!results.is_empty() && results.iter().all(ValidationResult::is_pass))
        );

        let completed_at = Utc::now();
        let trail = AuditTrail {
            transaction_id,
            agent_id: agent_id.clone(),
            results,
            outcome,
            rejection,
            initiated_at,
            completed_at,
            total_elapsed_ms: (completed_at - initiated_at).num_milliseconds().max(0) as u64,
            corrects: None,
        };

        self.persist_with_retry(&trail).await?;
        info!(
            transaction_id = %transaction_id,
            outcome = outcome.as_str(),
            layers = trail.results.len(),
            "audit trail sealed"
        );
        Ok(trail)
    }

    /// Append a correction linked to a prior record. The prior record is
    /// left untouched.
    pub async fn record_correction(&self, mut corrected: AuditTrail) -> Result<AuditTrail> {
        corrected.corrects = Some(corrected.transaction_id);
        corrected.completed_at = Utc::now();
        self.persist_with_retry(&corrected).await?;
        Ok(corrected)
    }

    /// Append a compliance event (revocation, fraud confirmation, freeze)
    pub fn record_event(&self, kind: ComplianceEventKind, agent_id: &AgentId, detail: impl Into<String>) {
        self.events.write().push(ComplianceEvent {
            kind,
            agent_id: agent_id.clone(),
            detail: detail.into(),
            occurred_at: Utc::now(),
        });
    }

    /// Compliance events in chronological order
    pub fn events(&self) -> Vec<ComplianceEvent> {
        self.events.read().clone()
    }

    /// Most recent sealed record for a transaction
    pub async fn trail(&self, transaction_id: Uuid) -> Option<AuditTrail> {
        self.store.latest(transaction_id).await
    }

    /// Pure read over sealed trails in `[from, to)`
    pub async fn report(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> ComplianceReport {
        let trails = self.store.in_range(from, to).await;
        let mut report = ComplianceReport {
            from,
            to,
            total: trails.len() as u64,
            approved: 0,
            rejected: 0,
            cancelled: 0,
            blocked: 0,
            fraud_detected: 0,
            fallback_assessments: 0,
            average_latency_ms: 0.0,
            daily: BTreeMap::new(),
        };

        let mut latency_sum = 0u64;
        for trail in &trails {
            match trail.outcome {
                PipelineOutcome::Approved => report.approved += 1,
                PipelineOutcome::Rejected => report.rejected += 1,
                PipelineOutcome::Cancelled => report.cancelled += 1,
                PipelineOutcome::Blocked => report.blocked += 1,
            }
            if trail.rejection == Some(RejectionKind::FraudSuspected) {
                report.fraud_detected += 1;
            }
            if trail
                .results
                .iter()
                .any(|r| r.metadata.get("method").and_then(|m| m.as_str()) == Some("fallback"))
            {
                report.fallback_assessments += 1;
            }
            latency_sum += trail.total_elapsed_ms;

            let bucket = report
                .daily
                .entry(trail.completed_at.date_naive())
                .or_default();
            bucket.total += 1;
            match trail.outcome {
                PipelineOutcome::Approved => bucket.approved += 1,
                PipelineOutcome::Rejected => bucket.rejected += 1,
                _ => {}
            }
        }
        if !trails.is_empty() {
            report.average_latency_ms = latency_sum as f64 / trails.len() as f64;
        }
        report
    }

    async fn persist_with_retry(&self, trail: &AuditTrail) -> Result<()> {
        let mut last_error = String::new();
        for attempt in 0..=self.config.persist_retries {
            match self.store.persist(trail).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        transaction_id = %trail.transaction_id,
                        attempt,
                        error = %e,
                        "trail persistence attempt failed"
                    );
                    last_error = e.to_string();
                }
            }
        }

        let alert = OperatorAlert {
            transaction_id: trail.transaction_id,
            message: format!(
                "audit trail could not be persisted after {} attempts: {}",
                self.config.persist_retries + 1,
                last_error
            ),
            raised_at: Utc::now(),
        };
        self.alerts.raise(alert);
        Err(PipelineError::AuditPersistence {
            transaction_id: trail.transaction_id,
            reason: last_error,
        })
    }
}
