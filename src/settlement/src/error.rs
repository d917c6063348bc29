//! Error types for the settlement feasibility checker

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, SettlementError>;
