//! Fraud Oracle Adapter for the Veriflow pipeline
//!
//! Obtains a fraud-risk assessment for every transaction:
//! - Calls the external scoring service with a bounded timeout and bounded
//!   retry, so the pipeline never stalls on an external dependency
//! - On timeout or error, falls back to a deterministic rule-based
//!   estimator (round-amount, null-counterparty, urgency-language, and
//!   history-deviation penalties)
//! - Tags every result with its method (`oracle` vs `fallback`) so audits
//!   can tell the paths apart
//!
//! Risk above the block threshold fails the layer with `FraudSuspected`;
//! risk in the review band passes with a recorded soft flag.

pub mod adapter;
pub mod error;
pub mod fallback;

pub use adapter::{AssessmentMethod, FraudOracleAdapter, OracleConfig, OracleOutcome};
pub use error::{OracleError, Result};
pub use fallback::FallbackEstimator;
