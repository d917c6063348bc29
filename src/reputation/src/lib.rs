//! Reputation Engine for the Veriflow pipeline
//!
//! Derives a 0-100 reputation score per agent as a weighted sum of:
//! - **Success rate** (30%): approved share of settled transactions
//! - **Inverse fraud rate** (25%): penalized by confirmed incidents
//! - **Compliance score** (20%)
//! - **Community rating** (15%)
//! - **Uptime** (10%)
//!
//! The score maps to a tier (Platinum >= 90, Gold >= 75, Silver >= 60,
//! Bronze below). Snapshots are recomputed from history on demand and
//! cached; every new settled outcome or confirmed fraud incident
//! invalidates the cache. A confirmed incident lowers the fraud component
//! immediately and keeps a residual penalty after the decay period.

pub mod engine;
pub mod error;

pub use engine::{ReputationConfig, ReputationEngine, ReputationWeights};
pub use error::{ReputationError, Result};
