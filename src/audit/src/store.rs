//! Durable trail storage seam

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use veriflow_core::error::Result;
use veriflow_core::types::AuditTrail;

/// Durable storage for sealed audit trails.
///
/// Implementations must be append-only: a stored trail is never rewritten.
/// Multiple records may exist per transaction when corrections are
/// appended; `latest` returns the most recent.
#[async_trait]
pub trait TrailStore: Send + Sync {
    /// Append one sealed trail. Must be durable on return.
    async fn persist(&self, trail: &AuditTrail) -> Result<()>;

    /// Most recent record for a transaction
    async fn latest(&self, transaction_id: Uuid) -> Option<AuditTrail>;

    /// All records sealed inside `[from, to)`, unordered
    async fn in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<AuditTrail>;
}

/// Reference in-memory store. Suitable for tests and single-process use;
/// production deployments substitute a durable backend behind the same
/// trait.
#[derive(Default)]
pub struct InMemoryTrailStore {
    /// Records per transaction, append order preserved
    trails: DashMap<Uuid, Vec<AuditTrail>>,
}

impl InMemoryTrailStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrailStore for InMemoryTrailStore {
    async fn persist(&self, trail: &AuditTrail) -> Result<()> {
        self.trails
            .entry(trail.transaction_id)
            .or_default()
            .push(trail.clone());
        Ok(())
    }

    async fn latest(&self, transaction_id: Uuid) -> Option<AuditTrail> {
        self.trails
            .get(&transaction_id)
            .and_then(|records| records.last().cloned())
    }

    async fn in_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<AuditTrail> {
        self.trails
            .iter()
            .flat_map(|entry| entry.value().clone())
            .filter(|t| t.completed_at >= from && t.completed_at < to)
            .collect()
    }
}
