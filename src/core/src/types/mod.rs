//! Domain types for the validation pipeline

mod agent;
mod audit;
mod transaction;

pub use agent::{Agent, AgentId, Amount, Certificate, Permission, ReputationSnapshot, Tier};
pub use audit::{
    AuditTrail, PipelineLayer, PipelineOutcome, RejectionKind, SettledOutcome, ValidationResult,
    ValidationStatus,
};
pub use transaction::{Transaction, TransactionType, VoteDecision, VoteRecord};
