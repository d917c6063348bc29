//! Error types for the consensus coordinator

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Fewer voters configured than the policy minimum
    #[error("Insufficient voters: have {have}, need at least {need}")]
    InsufficientVoters { have: usize, need: usize },

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
