//! Error types for the reputation engine

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Invalid component value: {0} (must be 0-1)")]
    InvalidComponent(f64),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ReputationError>;
