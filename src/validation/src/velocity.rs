//! Per-tier rolling-window velocity tracking

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use crate::error::{Result, ValidationError};
use veriflow_core::types::{AgentId, Tier};

/// Rolling windows a tier limit applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKind {
    PerMinute,
    PerHour,
    PerDay,
}

impl WindowKind {
    pub fn duration(&self) -> Duration {
        match self {
            WindowKind::PerMinute => Duration::minutes(1),
            WindowKind::PerHour => Duration::hours(1),
            WindowKind::PerDay => Duration::days(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::PerMinute => "per-minute",
            WindowKind::PerHour => "per-hour",
            WindowKind::PerDay => "per-day",
        }
    }
}

/// Admitted-transaction caps for one tier
#[derive(Debug, Clone, Copy)]
pub struct VelocityLimits {
    pub per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl VelocityLimits {
    fn limit(&self, window: WindowKind) -> u32 {
        match window {
            WindowKind::PerMinute => self.per_minute,
            WindowKind::PerHour => self.per_hour,
            WindowKind::PerDay => self.per_day,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.per_minute > self.per_hour || self.per_hour > self.per_day {
            return Err(ValidationError::InvalidLimits(
                "windows must widen monotonically".to_string(),
            ));
        }
        Ok(())
    }
}

/// Velocity caps per tier. Defaults follow the standard schedule; tunable
/// per deployment.
#[derive(Debug, Clone)]
pub struct TierVelocityTable {
    pub bronze: VelocityLimits,
    pub silver: VelocityLimits,
    pub gold: VelocityLimits,
    pub platinum: VelocityLimits,
}

impl Default for TierVelocityTable {
    fn default() -> Self {
        Self {
            bronze: VelocityLimits { per_minute: 5, per_hour: 50, per_day: 500 },
            silver: VelocityLimits { per_minute: 20, per_hour: 200, per_day: 2000 },
            gold: VelocityLimits { per_minute: 100, per_hour: 1000, per_day: 10000 },
            platinum: VelocityLimits { per_minute: 500, per_hour: 5000, per_day: 50000 },
        }
    }
}

impl TierVelocityTable {
    pub fn limits_for(&self, tier: Tier) -> VelocityLimits {
        match tier {
            Tier::Bronze => self.bronze,
            Tier::Silver => self.silver,
            Tier::Gold => self.gold,
            Tier::Platinum => self.platinum,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for tier in Tier::ALL {
            self.limits_for(tier).validate()?;
        }
        Ok(())
    }
}

/// Tracks admission timestamps per agent and answers whether admitting one
/// more transaction would exceed any rolling window.
///
/// Admissions are recorded only after final approval; callers must hold the
/// per-agent admission lock across check-then-record so two concurrent
/// transactions cannot both claim the last budget slot.
pub struct VelocityTracker {
    table: TierVelocityTable,

    /// Admission timestamps per agent, oldest first, pruned past one day
    admissions: DashMap<AgentId, VecDeque<DateTime<Utc>>>,
}

impl VelocityTracker {
    pub fn new(table: TierVelocityTable) -> Result<Self> {
        table.validate()?;
        Ok(Self {
            table,
            admissions: DashMap::new(),
        })
    }

    /// The first window that admitting one more transaction at `now` would
    /// exceed, or `None` if all windows have room.
    pub fn would_exceed(&self, agent_id: &AgentId, tier: Tier, now: DateTime<Utc>) -> Option<WindowKind> {
        let limits = self.table.limits_for(tier);
        let admissions = match self.admissions.get(agent_id) {
            Some(entry) => entry,
            None => return None,
        };

        for window in [WindowKind::PerMinute, WindowKind::PerHour, WindowKind::PerDay] {
            let cutoff = now - window.duration();
            let count = admissions.iter().filter(|t| **t > cutoff).count() as u32;
            if count >= limits.limit(window) {
                debug!(
                    agent_id = %agent_id,
                    window = window.as_str(),
                    count,
                    limit = limits.limit(window),
                    "velocity window full"
                );
                return Some(window);
            }
        }
        None
    }

    /// Consume one budget slot. Call only after the transaction is fully
    /// approved.
    pub fn record_admission(&self, agent_id: &AgentId, now: DateTime<Utc>) {
        let mut admissions = self.admissions.entry(agent_id.clone()).or_default();
        let cutoff = now - WindowKind::PerDay.duration();
        while admissions.front().is_some_and(|t| *t <= cutoff) {
            admissions.pop_front();
        }
        admissions.push_back(now);
    }

    /// Admissions currently inside a window, for reporting
    pub fn count_in_window(&self, agent_id: &AgentId, window: WindowKind, now: DateTime<Utc>) -> u32 {
        self.admissions
            .get(agent_id)
            .map(|a| {
                let cutoff = now - window.duration();
                a.iter().filter(|t| **t > cutoff).count() as u32
            })
            .unwrap_or(0)
    }
}
