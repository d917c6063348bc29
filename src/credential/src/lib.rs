//! Credential Registry for the Veriflow pipeline
//!
//! Issues and verifies per-agent certificates:
//! - Time-boxed credentials binding an agent to a tier and permission set
//! - Keyed-hash integrity signatures over {agent_id, tier, expiry}
//! - Reissue-on-tier-change with revocation, never in-place mutation
//! - Revocation events fanned out to the compliance recorder
//!
//! A transaction must not proceed past the first pipeline layer if the
//! certificate is absent, expired, or fails its integrity check.

pub mod error;
pub mod registry;

pub use error::{CredentialError, Result};
pub use registry::{
    CredentialConfig, CredentialFailure, CredentialRegistry, NullRevocationSink, RevocationSink,
    Verification,
};
