//! Pipeline state machine
//!
//! Transitions are strictly forward; terminal states are final.

use serde::{Deserialize, Serialize};

/// Where a transaction is in its trip through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Initiated,
    CredentialChecked,
    RateChecked,
    ConsensusReached,
    FraudAssessed,
    SettlementFeasible,
    Audited,
    Approved,
    Rejected,
    Cancelled,
    Blocked,
}

impl PipelineState {
    /// The state after the current layer passes. Terminal states do not
    /// advance.
    pub fn advance(self) -> PipelineState {
        match self {
            PipelineState::Initiated => PipelineState::CredentialChecked,
            PipelineState::CredentialChecked => PipelineState::RateChecked,
            PipelineState::RateChecked => PipelineState::ConsensusReached,
            PipelineState::ConsensusReached => PipelineState::FraudAssessed,
            PipelineState::FraudAssessed => PipelineState::SettlementFeasible,
            PipelineState::SettlementFeasible => PipelineState::Audited,
            PipelineState::Audited => PipelineState::Approved,
            terminal => terminal,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Approved
                | PipelineState::Rejected
                | PipelineState::Cancelled
                | PipelineState::Blocked
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Initiated => "initiated",
            PipelineState::CredentialChecked => "credential_checked",
            PipelineState::RateChecked => "rate_checked",
            PipelineState::ConsensusReached => "consensus_reached",
            PipelineState::FraudAssessed => "fraud_assessed",
            PipelineState::SettlementFeasible => "settlement_feasible",
            PipelineState::Audited => "audited",
            PipelineState::Approved => "approved",
            PipelineState::Rejected => "rejected",
            PipelineState::Cancelled => "cancelled",
            PipelineState::Blocked => "blocked",
        }
    }
}
