//! Orchestration of the fixed-order validation pipeline

use chrono::Utc;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::metrics;
use crate::state::PipelineState;
use veriflow_audit::{
    AlertSink, ComplianceEvent, ComplianceEventKind, ComplianceRecorder, ComplianceReport,
    TrailStore,
};
use veriflow_consensus::ConsensusCoordinator;
use veriflow_core::error::{PipelineError, Result};
use veriflow_core::traits::{CustodyService, RiskContext, RiskScoringService, SettlementNetwork, VotingParty};
use veriflow_core::types::{
    Agent, AgentId, AuditTrail, Certificate, PipelineLayer, PipelineOutcome, RejectionKind,
    ReputationSnapshot, SettledOutcome, Tier, Transaction, ValidationResult,
};
use veriflow_credential::{CredentialRegistry, RevocationSink, Verification};
use veriflow_oracle::{AssessmentMethod, FraudOracleAdapter};
use veriflow_reputation::ReputationEngine;
use veriflow_settlement::FeasibilityChecker;
use veriflow_validation::{PatternFlag, RateValidator};

/// External services the pipeline consumes
pub struct Collaborators {
    pub custody: Arc<dyn CustodyService>,
    pub settlement: Arc<dyn SettlementNetwork>,
    pub risk_scorer: Arc<dyn RiskScoringService>,
    pub voters: Vec<Arc<dyn VotingParty>>,
    pub trail_store: Arc<dyn TrailStore>,
    pub alert_sink: Arc<dyn AlertSink>,
}

/// The single value `validate` returns: terminal outcome plus the trail
/// behind it
#[derive(Debug, Clone)]
pub struct PipelineDecision {
    pub outcome: PipelineOutcome,
    pub trail: AuditTrail,
}

/// Cached terminal decision for idempotent re-submission
#[derive(Clone)]
struct CachedDecision {
    /// Payload fingerprint; `None` for decisions sealed without a payload
    /// (cancellations), which consume the id outright
    fingerprint: Option<String>,
    decision: PipelineDecision,
}

/// How often a submission blocked on an in-flight duplicate re-checks the
/// decision cache
const IN_FLIGHT_POLL: Duration = Duration::from_millis(2);

/// Bridges registry revocations into the compliance event log
struct RevocationBridge(Arc<ComplianceRecorder>);

impl RevocationSink for RevocationBridge {
    fn certificate_revoked(&self, certificate: &Certificate, reason: &str) {
        self.0.record_event(
            ComplianceEventKind::CertificateRevoked,
            &certificate.agent_id,
            format!("certificate {} revoked: {}", certificate.id, reason),
        );
    }
}

/// Runs every funds movement through the layer order, short-circuiting on
/// the first rejection and sealing a trail for every terminal outcome.
pub struct PipelineCoordinator {
    config: PipelineConfig,
    credentials: Arc<CredentialRegistry>,
    reputation: Arc<ReputationEngine>,
    validator: RateValidator,
    consensus: ConsensusCoordinator,
    oracle: FraudOracleAdapter,
    settlement: FeasibilityChecker,
    recorder: Arc<ComplianceRecorder>,
    custody: Arc<dyn CustodyService>,
    voters: Vec<Arc<dyn VotingParty>>,

    /// Registered agents by id
    agents: DashMap<AgentId, Agent>,

    /// Per-agent admission locks serializing counter and tier writes
    agent_locks: DashMap<AgentId, Arc<Mutex<()>>>,

    /// Terminal decisions by transaction id
    decisions: DashMap<Uuid, CachedDecision>,

    /// Cancellations requested for in-flight transactions
    cancel_requests: DashSet<Uuid>,

    /// Transactions currently inside `validate`
    in_flight: DashSet<Uuid>,
}

/// Frees the in-flight slot on every exit from `validate` and `cancel`,
/// error returns included, so a failed run never wedges its transaction id.
struct InFlightGuard<'a> {
    coordinator: &'a PipelineCoordinator,
    transaction_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight.remove(&self.transaction_id);
        self.coordinator.cancel_requests.remove(&self.transaction_id);
    }
}

impl PipelineCoordinator {
    pub fn new(
        config: PipelineConfig,
        signing_key: [u8; 32],
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        let recorder = Arc::new(ComplianceRecorder::new(
            config.recorder.clone(),
            collaborators.trail_store,
            collaborators.alert_sink,
        ));
        let credentials = Arc::new(CredentialRegistry::new(
            signing_key,
            config.credential.clone(),
            Arc::new(RevocationBridge(recorder.clone())),
        ));
        let reputation = Arc::new(
            ReputationEngine::new(config.reputation.clone())
                .map_err(|e| PipelineError::Configuration(e.to_string()))?,
        );
        let validator = RateValidator::new(config.validator.clone(), credentials.clone())
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let consensus = ConsensusCoordinator::new(config.consensus.clone())
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let oracle = FraudOracleAdapter::new(config.oracle.clone(), collaborators.risk_scorer)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        let settlement =
            FeasibilityChecker::new(config.settlement.clone(), collaborators.settlement)
                .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        Ok(Self {
            config,
            credentials,
            reputation,
            validator,
            consensus,
            oracle,
            settlement,
            recorder,
            custody: collaborators.custody,
            voters: collaborators.voters,
            agents: DashMap::new(),
            agent_locks: DashMap::new(),
            decisions: DashMap::new(),
            cancel_requests: DashSet::new(),
            in_flight: DashSet::new(),
        })
    }

    /// Register an agent with the pipeline. Existing agents are replaced.
    pub fn register_agent(&self, agent: Agent) {
        self.agents.insert(agent.id.clone(), agent);
    }

    /// Deactivate an agent. Agents are never deleted.
    pub fn deactivate_agent(&self, agent_id: &AgentId) -> Result<()> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PipelineError::AgentNotFound(agent_id.clone()))?;
        agent.active = false;
        Ok(())
    }

    /// Issue (or reissue) a certificate, updating the agent's tier
    pub fn issue_certificate(&self, agent_id: &AgentId, tier: Tier) -> Result<Certificate> {
        let mut agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| PipelineError::AgentNotFound(agent_id.clone()))?;
        let certificate = self.credentials.issue(agent_id, tier);
        agent.tier = tier;
        agent.certificate_id = Some(certificate.id);
        Ok(certificate)
    }

    /// Current reputation snapshot for an agent
    pub fn get_reputation(&self, agent_id: &AgentId) -> ReputationSnapshot {
        self.reputation.snapshot(agent_id)
    }

    /// Aggregate compliance report over sealed trails
    pub async fn generate_compliance_report(
        &self,
        from: chrono::DateTime<Utc>,
        to: chrono::DateTime<Utc>,
    ) -> ComplianceReport {
        self.recorder.report(from, to).await
    }

    /// Most recent sealed trail for a transaction
    pub async fn audit_trail(&self, transaction_id: Uuid) -> Option<AuditTrail> {
        self.recorder.trail(transaction_id).await
    }

    /// Compliance events (revocations, freezes, fraud confirmations) in
    /// chronological order
    pub fn compliance_events(&self) -> Vec<ComplianceEvent> {
        self.recorder.events()
    }

    /// Blacklist a counterparty for all future transactions
    pub fn blacklist_counterparty(&self, counterparty: impl Into<String>) {
        self.validator.blacklist_counterparty(counterparty);
    }

    /// Register a confirmed fraud incident: reputation takes the hit
    /// immediately and the tier is resynced.
    pub async fn confirm_fraud(&self, agent_id: &AgentId, detail: &str) -> Result<()> {
        if !self.agents.contains_key(agent_id) {
            return Err(PipelineError::AgentNotFound(agent_id.clone()));
        }
        self.reputation.record_fraud_incident(agent_id, Utc::now());
        self.recorder
            .record_event(ComplianceEventKind::FraudConfirmed, agent_id, detail);

        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock().await;
        self.sync_tier(agent_id);
        Ok(())
    }

    /// Cancel a transaction before it reaches a terminal state.
    ///
    /// Returns the sealed cancellation trail when the transaction was not
    /// in flight; returns `None` when it was, in which case `validate`
    /// seals the cancellation at the next layer boundary. Cancelling an
    /// already-terminal transaction is an error.
    pub async fn cancel(
        &self,
        transaction_id: Uuid,
        agent_id: &AgentId,
    ) -> Result<Option<AuditTrail>> {
        if !self.in_flight.insert(transaction_id) {
            // A running validation holds the slot; it seals the
            // cancellation at its next layer boundary.
            self.cancel_requests.insert(transaction_id);
            return Ok(None);
        }
        let _in_flight = InFlightGuard {
            coordinator: self,
            transaction_id,
        };

        // Terminal-state check under the slot, so a decision sealed by a
        // concurrent validation cannot be overwritten.
        if self.decisions.contains_key(&transaction_id) {
            return Err(PipelineError::Internal(format!(
                "transaction {} already reached a terminal state",
                transaction_id
            )));
        }

        // Not in flight: seal the cancellation now and consume the id.
        let trail = self
            .recorder
            .record(
                transaction_id,
                agent_id,
                Vec::new(),
                PipelineOutcome::Cancelled,
                None,
                Utc::now(),
            )
            .await?;
        metrics::record_decision(PipelineOutcome::Cancelled.as_str());
        self.decisions.insert(
            transaction_id,
            CachedDecision {
                fingerprint: None,
                decision: PipelineDecision {
                    outcome: PipelineOutcome::Cancelled,
                    trail: trail.clone(),
                },
            },
        );
        info!(transaction_id = %transaction_id, "transaction cancelled before validation");
        Ok(Some(trail))
    }

    /// The single synchronous entry point: run a transaction through every
    /// layer in order, short-circuiting on the first rejection, and return
    /// the terminal decision with its sealed trail.
    pub async fn validate(&self, transaction: &Transaction) -> Result<PipelineDecision> {
        // Idempotency: a terminal decision is returned as-is; id reuse with
        // a different payload is rejected without touching the original
        // sealed trail. Admission is gated on the in-flight set, so two
        // concurrent submissions of one id cannot both run the pipeline:
        // the loser waits for the winner's sealed decision and replays it.
        loop {
            if let Some(decision) = self.replay_cached(transaction) {
                return Ok(decision);
            }
            if self.in_flight.insert(transaction.id) {
                break;
            }
            tokio::time::sleep(IN_FLIGHT_POLL).await;
        }
        let _in_flight = InFlightGuard {
            coordinator: self,
            transaction_id: transaction.id,
        };

        let mut agent = self
            .agents
            .get(&transaction.agent_id)
            .map(|a| a.clone())
            .ok_or_else(|| PipelineError::AgentNotFound(transaction.agent_id.clone()))?;

        let initiated_at = Utc::now();
        let mut state = PipelineState::Initiated;
        let mut results: Vec<ValidationResult> = Vec::with_capacity(6);

        // Balance refresh from custody; a stale stored balance is the
        // fallback when custody is unreachable.
        match self.custody.get_balance(&agent.id).await {
            Ok(balance) => {
                agent.available_balance = balance;
                if let Some(mut stored) = self.agents.get_mut(&agent.id) {
                    stored.available_balance = balance;
                }
            }
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "custody unreachable, using stored balance")
            }
        }

        // Layer 1: credential.
        let result = self.check_credential(&agent);
        if let Some(decision) = self
            .push_and_gate(transaction, &agent, &mut results, result, initiated_at)
            .await?
        {
            return Ok(decision);
        }
        state = self.advance(state, transaction.id);

        // Layer 2: rate and pattern.
        let rate = self.validator.check(transaction, &agent, Utc::now());
        let pattern_flags = rate.flags.clone();
        if let Some(decision) = self
            .push_and_gate(transaction, &agent, &mut results, rate.result, initiated_at)
            .await?
        {
            return Ok(decision);
        }
        state = self.advance(state, transaction.id);

        // Layer 3: consensus.
        let consensus = self
            .consensus
            .collect_votes(transaction, &self.voters)
            .await
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        if let Some(decision) = self
            .push_and_gate(transaction, &agent, &mut results, consensus.result, initiated_at)
            .await?
        {
            return Ok(decision);
        }
        state = self.advance(state, transaction.id);

        // Layer 4: fraud assessment. No per-agent lock is held across this
        // await.
        let context = RiskContext {
            agent: agent.clone(),
            history: self
                .reputation
                .recent_history(&agent.id, self.config.history_window),
            pattern_flags: pattern_flags
                .iter()
                .map(|f| PatternFlag::as_str(f).to_string())
                .collect(),
        };
        let fraud = self.oracle.assess(transaction, &context).await;
        if fraud.method == AssessmentMethod::Fallback {
            metrics::record_fallback();
        }
        if let Some(decision) = self
            .push_and_gate(transaction, &agent, &mut results, fraud.result, initiated_at)
            .await?
        {
            return Ok(decision);
        }
        state = self.advance(state, transaction.id);

        // Layer 5: settlement feasibility.
        let settlement = self.settlement.check(transaction).await;
        if let Some(decision) = self
            .push_and_gate(transaction, &agent, &mut results, settlement.result, initiated_at)
            .await?
        {
            return Ok(decision);
        }
        state = self.advance(state, transaction.id);

        // Layer 6: admission and audit, under the per-agent lock so the
        // velocity read-modify-write is serialized.
        let lock = self.agent_lock(&agent.id);
        let _guard = lock.lock().await;

        let now = Utc::now();
        if let Some(window) = self.validator.velocity_exceeded(&agent, now) {
            let result = ValidationResult::fail(
                PipelineLayer::RatePattern,
                RejectionKind::LimitExceeded,
                format!(
                    "{} velocity window filled by a concurrent admission",
                    window.as_str()
                ),
            );
            results.push(result);
            return self
                .finish_rejected(transaction, &agent, results, initiated_at, false)
                .await;
        }

        state = self.advance(state, transaction.id); // Audited
        match self
            .recorder
            .record(
                transaction.id,
                &agent.id,
                results.clone(),
                PipelineOutcome::Approved,
                None,
                initiated_at,
            )
            .await
        {
            Ok(trail) => {
                self.validator.record_admission(&agent, now);
                self.writeback(&agent.id, transaction, PipelineOutcome::Approved);
                state = self.advance(state, transaction.id);
                debug_assert_eq!(state, PipelineState::Approved);
                info!(
                    transaction_id = %transaction.id,
                    agent_id = %agent.id,
                    elapsed_ms = trail.total_elapsed_ms,
                    "transaction approved"
                );
                Ok(self.cache_decision(transaction, PipelineOutcome::Approved, trail))
            }
            Err(e) => self.finish_blocked(transaction, &agent, results, initiated_at, e),
        }
    }

    // --- layer helpers -----------------------------------------------------

    fn check_credential(&self, agent: &Agent) -> ValidationResult {
        let started = Instant::now();
        let result = match self.credentials.verify(&agent.id) {
            Verification::Valid(cert) => ValidationResult::pass(
                PipelineLayer::Credential,
                format!("certificate {} valid until {}", cert.id, cert.expires_at),
            ),
            Verification::Invalid(failure) => ValidationResult::fail(
                PipelineLayer::Credential,
                RejectionKind::CredentialInvalid,
                failure.description(),
            ),
        };
        result.with_elapsed_ms(started.elapsed().as_millis() as u64)
    }

    /// Push a layer result; on pass check for a pending cancellation, on
    /// fail seal the rejection. `Some(decision)` means the pipeline is
    /// done.
    async fn push_and_gate(
        &self,
        transaction: &Transaction,
        agent: &Agent,
        results: &mut Vec<ValidationResult>,
        result: ValidationResult,
        initiated_at: chrono::DateTime<Utc>,
    ) -> Result<Option<PipelineDecision>> {
        metrics::observe_layer(result.layer.as_str(), result.elapsed_ms);
        let passed = result.is_pass();
        results.push(result);

        if !passed {
            return self
                .finish_rejected(transaction, agent, results.clone(), initiated_at, true)
                .await
                .map(Some);
        }

        if self.cancel_requests.remove(&transaction.id).is_some() {
            let trail = self
                .recorder
                .record(
                    transaction.id,
                    &agent.id,
                    results.clone(),
                    PipelineOutcome::Cancelled,
                    None,
                    initiated_at,
                )
                .await?;
            info!(transaction_id = %transaction.id, "cancellation honored mid-pipeline");
            metrics::record_decision(PipelineOutcome::Cancelled.as_str());
            return Ok(Some(self.cache_decision(
                transaction,
                PipelineOutcome::Cancelled,
                trail,
            )));
        }
        Ok(None)
    }

    /// Seal a rejected trail and write back the settled outcome
    async fn finish_rejected(
        &self,
        transaction: &Transaction,
        agent: &Agent,
        results: Vec<ValidationResult>,
        initiated_at: chrono::DateTime<Utc>,
        take_lock: bool,
    ) -> Result<PipelineDecision> {
        let rejection = results.iter().rev().find_map(|r| r.rejection);
        match self
            .recorder
            .record(
                transaction.id,
                &agent.id,
                results.clone(),
                PipelineOutcome::Rejected,
                rejection,
                initiated_at,
            )
            .await
        {
            Ok(trail) => {
                if take_lock {
                    let lock = self.agent_lock(&agent.id);
                    let _guard = lock.lock().await;
                    self.writeback(&agent.id, transaction, PipelineOutcome::Rejected);
                } else {
                    // Caller already holds the per-agent lock.
                    self.writeback(&agent.id, transaction, PipelineOutcome::Rejected);
                }
                info!(
                    transaction_id = %transaction.id,
                    rejection = ?rejection,
                    "transaction rejected"
                );
                Ok(self.cache_decision(transaction, PipelineOutcome::Rejected, trail))
            }
            Err(e) => self.finish_blocked(transaction, agent, results, initiated_at, e),
        }
    }

    /// Audit persistence failed after bounded retry: freeze the
    /// transaction. Never reported as approved; the alert has already been
    /// raised by the recorder.
    fn finish_blocked(
        &self,
        transaction: &Transaction,
        agent: &Agent,
        results: Vec<ValidationResult>,
        initiated_at: chrono::DateTime<Utc>,
        error: PipelineError,
    ) -> Result<PipelineDecision> {
        warn!(
            transaction_id = %transaction.id,
            error = %error,
            "audit persistence exhausted, freezing transaction"
        );
        self.recorder.record_event(
            ComplianceEventKind::TransactionBlocked,
            &agent.id,
            format!("transaction {} frozen: {}", transaction.id, error),
        );

        let completed_at = Utc::now();
        // Local, unpersisted trail: the durable store is the thing that
        // failed.
        let trail = AuditTrail {
            transaction_id: transaction.id,
            agent_id: agent.id.clone(),
            results,
            outcome: PipelineOutcome::Blocked,
            rejection: None,
            initiated_at,
            completed_at,
            total_elapsed_ms: (completed_at - initiated_at).num_milliseconds().max(0) as u64,
            corrects: None,
        };
        Ok(self.cache_decision(transaction, PipelineOutcome::Blocked, trail))
    }

    /// Cached decision for a re-submitted id, or the duplicate-id rejection
    /// when the payload differs. `None` means the id is unknown.
    fn replay_cached(&self, transaction: &Transaction) -> Option<PipelineDecision> {
        let cached = self.decisions.get(&transaction.id)?;
        let matches = cached
            .fingerprint
            .as_deref()
            .map_or(true, |f| f == transaction.fingerprint());
        if matches {
            debug!(transaction_id = %transaction.id, "idempotent re-submission, cached decision");
            metrics::record_cached_decision();
            return Some(cached.decision.clone());
        }
        Some(self.duplicate_id_decision(transaction))
    }

    /// Terminal decision for an id reused with a different payload. The
    /// original sealed trail owns the id, so this rejection is returned
    /// unsealed and never cached.
    fn duplicate_id_decision(&self, transaction: &Transaction) -> PipelineDecision {
        warn!(transaction_id = %transaction.id, "transaction id reused with a different payload");
        let now = Utc::now();
        let result = ValidationResult::fail(
            PipelineLayer::Admission,
            RejectionKind::DuplicateTransactionId,
            RejectionKind::DuplicateTransactionId.description(),
        );
        PipelineDecision {
            outcome: PipelineOutcome::Rejected,
            trail: AuditTrail {
                transaction_id: transaction.id,
                agent_id: transaction.agent_id.clone(),
                results: vec![result],
                outcome: PipelineOutcome::Rejected,
                rejection: Some(RejectionKind::DuplicateTransactionId),
                initiated_at: now,
                completed_at: now,
                total_elapsed_ms: 0,
                corrects: None,
            },
        }
    }

    // --- bookkeeping -------------------------------------------------------

    fn cache_decision(
        &self,
        transaction: &Transaction,
        outcome: PipelineOutcome,
        trail: AuditTrail,
    ) -> PipelineDecision {
        metrics::record_decision(outcome.as_str());
        self.in_flight.remove(&transaction.id);
        self.cancel_requests.remove(&transaction.id);
        let decision = PipelineDecision { outcome, trail };
        self.decisions.insert(
            transaction.id,
            CachedDecision {
                fingerprint: Some(transaction.fingerprint()),
                decision: decision.clone(),
            },
        );
        decision
    }

    /// Settled-outcome writeback: reputation history, snapshot
    /// invalidation, and tier resync. Callers hold the per-agent lock.
    fn writeback(&self, agent_id: &AgentId, transaction: &Transaction, outcome: PipelineOutcome) {
        self.reputation.record_outcome(
            agent_id,
            SettledOutcome {
                transaction_id: transaction.id,
                amount: transaction.amount,
                outcome,
                fraud_confirmed: false,
                completed_at: Utc::now(),
            },
        );
        self.sync_tier(agent_id);
    }

    /// Reissue the certificate when the reputation score maps to a
    /// different tier than the agent currently holds.
    fn sync_tier(&self, agent_id: &AgentId) {
        let snapshot = self.reputation.snapshot(agent_id);
        let Some(mut agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        if snapshot.tier != agent.tier {
            info!(
                agent_id = %agent_id,
                from = agent.tier.as_str(),
                to = snapshot.tier.as_str(),
                score = snapshot.score,
                "tier reassignment"
            );
            let certificate = self.credentials.issue(agent_id, snapshot.tier);
            agent.tier = snapshot.tier;
            agent.certificate_id = Some(certificate.id);
        }
        agent.reputation_score = snapshot.score;
    }

    fn agent_lock(&self, agent_id: &AgentId) -> Arc<Mutex<()>> {
        self.agent_locks
            .entry(agent_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn advance(&self, state: PipelineState, transaction_id: Uuid) -> PipelineState {
        let next = state.advance();
        debug!(
            transaction_id = %transaction_id,
            from = state.as_str(),
            to = next.as_str(),
            "state transition"
        );
        next
    }
}
