//! Pipeline Coordinator for Veriflow
//!
//! Orchestrates every funds movement through the fixed layer order:
//!
//! `Initiated -> CredentialChecked -> RateChecked -> ConsensusReached ->
//! FraudAssessed -> SettlementFeasible -> Audited -> {Approved | Rejected}`
//!
//! The first failing layer short-circuits straight to a rejected trail;
//! approvals require every layer to pass and the trail to be sealed before
//! any settlement attempt is permitted. Same-agent validations serialize on
//! a per-agent admission lock for the final velocity read-modify-write;
//! the oracle round-trip never holds that lock. Terminal decisions are
//! cached by transaction id so identical re-submissions are idempotent and
//! never double-count velocity.

pub mod config;
pub mod coordinator;
pub mod metrics;
pub mod state;

pub use config::PipelineConfig;
pub use coordinator::{Collaborators, PipelineCoordinator, PipelineDecision};
pub use state::PipelineState;
