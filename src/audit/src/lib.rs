//! Audit & Compliance Recorder for the Veriflow pipeline
//!
//! Assembles each transaction's ordered layer results into a sealed,
//! append-only trail and persists it durably:
//! - Persistence retries within a bounded budget; exhaustion is the one
//!   fatal condition in the system and raises an operator alert
//! - Sealed trails are never edited; corrections append new linked records
//! - Reporting queries aggregate sealed trails by outcome, fraud count,
//!   fallback usage, and latency over a date range
//!
//! The durable store is a trait seam; the reference implementation is
//! in-memory, and any durable backend satisfies the contract.

pub mod recorder;
pub mod store;

pub use recorder::{
    AlertSink, ComplianceEvent, ComplianceEventKind, ComplianceRecorder, ComplianceReport,
    DailyBucket, NullAlertSink, OperatorAlert, RecorderConfig,
};
pub use store::{InMemoryTrailStore, TrailStore};
