//! Score computation, tier mapping, and snapshot caching

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::{ReputationError, Result};
use veriflow_core::types::{AgentId, PipelineOutcome, ReputationSnapshot, SettledOutcome, Tier};

/// Maximum settled outcomes retained per agent
const MAX_OUTCOME_HISTORY: usize = 1000;

/// Default fraud decay period (90 days)
const DEFAULT_FRAUD_DECAY_DAYS: i64 = 90;

/// Residual weight of a fraud incident after its decay period has elapsed
const DECAYED_INCIDENT_WEIGHT: f64 = 0.25;

/// Component weights; must sum to 1.0
#[derive(Debug, Clone, Copy)]
pub struct ReputationWeights {
    pub success_rate: f64,
    pub fraud: f64,
    pub compliance: f64,
    pub community: f64,
    pub uptime: f64,
}

impl Default for ReputationWeights {
    fn default() -> Self {
        Self {
            success_rate: 0.30,
            fraud: 0.25,
            compliance: 0.20,
            community: 0.15,
            uptime: 0.10,
        }
    }
}

impl ReputationWeights {
    pub fn validate(&self) -> Result<()> {
        let sum = self.success_rate + self.fraud + self.compliance + self.community + self.uptime;
        if (sum - 1.0).abs() > 0.001 {
            return Err(ReputationError::Configuration(format!(
                "weights must sum to 1.0, got {}",
                sum
            )));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub weights: ReputationWeights,

    /// How long a confirmed fraud incident counts at full weight
    pub fraud_decay: Duration,

    /// Tier thresholds, checked highest first: (tier, minimum score)
    pub tier_thresholds: [(Tier, f64); 3],
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            weights: ReputationWeights::default(),
            fraud_decay: Duration::days(DEFAULT_FRAUD_DECAY_DAYS),
            tier_thresholds: [
                (Tier::Platinum, 90.0),
                (Tier::Gold, 75.0),
                (Tier::Silver, 60.0),
            ],
        }
    }
}

/// Per-agent reputation inputs
#[derive(Debug, Clone)]
struct AgentRecord {
    /// Settled outcomes, oldest first, capped at `MAX_OUTCOME_HISTORY`
    history: VecDeque<SettledOutcome>,

    /// Timestamps of confirmed fraud incidents
    fraud_incidents: Vec<DateTime<Utc>>,

    /// Compliance component (0-1), fed by the compliance recorder
    compliance_score: f64,

    /// Community rating component (0-1), fed externally
    community_rating: f64,

    /// Uptime component (0-1), fed externally
    uptime: f64,
}

impl Default for AgentRecord {
    fn default() -> Self {
        Self {
            history: VecDeque::with_capacity(64),
            fraud_incidents: Vec::new(),
            compliance_score: 1.0,
            community_rating: 0.8,
            uptime: 1.0,
        }
    }
}

impl AgentRecord {
    fn add_outcome(&mut self, outcome: SettledOutcome) {
        if self.history.len() >= MAX_OUTCOME_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(outcome);
    }

    /// Approved share of settled outcomes; neutral 0.5 with no history
    fn success_rate(&self) -> f64 {
        if self.history.is_empty() {
            return 0.5;
        }
        let approved = self
            .history
            .iter()
            .filter(|o| o.outcome == PipelineOutcome::Approved)
            .count();
        approved as f64 / self.history.len() as f64
    }

    /// Inverse fraud component. Incidents inside the decay window count at
    /// full weight; older ones keep a residual so a fraud record never
    /// fully washes out.
    fn fraud_component(&self, decay: Duration, now: DateTime<Utc>) -> f64 {
        let effective: f64 = self
            .fraud_incidents
            .iter()
            .map(|at| {
                if now.signed_duration_since(*at) <= decay {
                    1.0
                } else {
                    DECAYED_INCIDENT_WEIGHT
                }
            })
            .sum();
        1.0 / (1.0 + effective)
    }
}

/// Computes and caches per-agent reputation.
///
/// Thread-safe via per-key maps; callers serialize writes for one agent at
/// the pipeline's per-agent admission lock, so no additional locking is
/// needed here.
pub struct ReputationEngine {
    config: ReputationConfig,
    records: DashMap<AgentId, AgentRecord>,
    snapshots: DashMap<AgentId, ReputationSnapshot>,
}

impl ReputationEngine {
    pub fn new(config: ReputationConfig) -> Result<Self> {
        config.weights.validate()?;
        Ok(Self {
            config,
            records: DashMap::new(),
            snapshots: DashMap::new(),
        })
    }

    /// Record a settled outcome and invalidate the cached snapshot
    pub fn record_outcome(&self, agent_id: &AgentId, outcome: SettledOutcome) {
        self.records
            .entry(agent_id.clone())
            .or_default()
            .add_outcome(outcome);
        self.snapshots.remove(agent_id);
    }

    /// Record a confirmed fraud incident. Strictly lowers the score until
    /// the decay period elapses, and leaves a residual penalty after.
    pub fn record_fraud_incident(&self, agent_id: &AgentId, at: DateTime<Utc>) {
        info!(agent_id = %agent_id, "confirmed fraud incident recorded");
        self.records
            .entry(agent_id.clone())
            .or_default()
            .fraud_incidents
            .push(at);
        self.snapshots.remove(agent_id);
    }

    /// Update the compliance component (0-1)
    pub fn set_compliance_score(&self, agent_id: &AgentId, value: f64) -> Result<()> {
        Self::check_component(value)?;
        self.records
            .entry(agent_id.clone())
            .or_default()
            .compliance_score = value;
        self.snapshots.remove(agent_id);
        Ok(())
    }

    /// Update the community rating component (0-1)
    pub fn set_community_rating(&self, agent_id: &AgentId, value: f64) -> Result<()> {
        Self::check_component(value)?;
        self.records
            .entry(agent_id.clone())
            .or_default()
            .community_rating = value;
        self.snapshots.remove(agent_id);
        Ok(())
    }

    /// Update the uptime component (0-1)
    pub fn set_uptime(&self, agent_id: &AgentId, value: f64) -> Result<()> {
        Self::check_component(value)?;
        self.records.entry(agent_id.clone()).or_default().uptime = value;
        self.snapshots.remove(agent_id);
        Ok(())
    }

    /// Current snapshot, recomputed if the cache was invalidated. Unknown
    /// agents get a neutral snapshot rather than an error.
    pub fn snapshot(&self, agent_id: &AgentId) -> ReputationSnapshot {
        if let Some(cached) = self.snapshots.get(agent_id) {
            return cached.clone();
        }
        let snapshot = self.compute(agent_id);
        self.snapshots.insert(agent_id.clone(), snapshot.clone());
        snapshot
    }

    /// Recent settled outcomes for an agent, newest last
    pub fn recent_history(&self, agent_id: &AgentId, limit: usize) -> Vec<SettledOutcome> {
        self.records
            .get(agent_id)
            .map(|r| {
                r.history
                    .iter()
                    .rev()
                    .take(limit)
                    .rev()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tier the score qualifies for
    pub fn tier_for(&self, score: f64) -> Tier {
        for (tier, minimum) in self.config.tier_thresholds {
            if score >= minimum {
                return tier;
            }
        }
        Tier::Bronze
    }

    fn compute(&self, agent_id: &AgentId) -> ReputationSnapshot {
        let now = Utc::now();
        let record = self
            .records
            .get(agent_id)
            .map(|r| r.clone())
            .unwrap_or_default();

        let success_rate = record.success_rate();
        let fraud = record.fraud_component(self.config.fraud_decay, now);
        let w = self.config.weights;
        let score = 100.0
            * (w.success_rate * success_rate
                + w.fraud * fraud
                + w.compliance * record.compliance_score
                + w.community * record.community_rating
                + w.uptime * record.uptime);

        let snapshot = ReputationSnapshot {
            agent_id: agent_id.clone(),
            score,
            tier: self.tier_for(score),
            success_rate,
            fraud_incidents: record.fraud_incidents.len() as u64,
            compliance_score: record.compliance_score,
            community_rating: record.community_rating,
            uptime: record.uptime,
            computed_at: now,
        };
        debug!(agent_id = %agent_id, score, tier = snapshot.tier.as_str(), "recomputed reputation");
        snapshot
    }

    fn check_component(value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ReputationError::InvalidComponent(value));
        }
        Ok(())
    }
}
