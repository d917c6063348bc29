//! Error types for the fraud oracle adapter

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, OracleError>;
