//! Settlement Feasibility Checker for the Veriflow pipeline
//!
//! Confirms a transaction is structurally executable by the external
//! settlement layer without executing it:
//! - Counterparty address is well-formed
//! - An execution cost estimate is obtainable and under the configured
//!   ceiling
//! - A declared deadline is still reachable given estimated latency
//!
//! This component only predicts; it never submits transactions.

pub mod checker;
pub mod error;

pub use checker::{FeasibilityChecker, SettlementConfig, SettlementOutcome};
pub use error::{Result, SettlementError};
