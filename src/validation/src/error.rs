//! Error types for the rate and pattern validator

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid velocity limits: {0}")]
    InvalidLimits(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;
