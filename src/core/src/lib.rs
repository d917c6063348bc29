//! Core domain model for the Veriflow validation pipeline
//!
//! Shared types and trait seams used by every pipeline layer:
//! - **Agents** and their tiers, balances, and reputation scores
//! - **Transactions** (immutable once created) and their audit trails
//! - **ValidationResult**: the outcome of exactly one pipeline layer
//! - **External collaborator traits** (custody, settlement, risk scoring,
//!   voting parties) so the pipeline can be tested against stubs
//!
//! Every status-like value is a closed enum so exhaustive handling is
//! checked at compile time; business rejections are values, never panics.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{PipelineError, Result};
pub use traits::{
    CustodyService, FeasibilityEstimate, RecommendedAction, RiskAssessment, RiskContext,
    RiskScoringService, SettlementNetwork, VotingParty,
};
pub use types::{
    Agent, AgentId, Amount, AuditTrail, Certificate, Permission, PipelineLayer, PipelineOutcome,
    RejectionKind, ReputationSnapshot, SettledOutcome, Tier, Transaction, TransactionType,
    ValidationResult, ValidationStatus, VoteDecision, VoteRecord,
};
