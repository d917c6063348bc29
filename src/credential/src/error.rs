//! Error types for the credential registry

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// No active certificate exists for the agent
    #[error("No active certificate for agent: {0}")]
    NoActiveCertificate(String),
}

pub type Result<T> = std::result::Result<T, CredentialError>;
