//! Rate & Pattern Validator for the Veriflow pipeline
//!
//! Rejects transactions that violate static or behavioral limits before any
//! voting happens. Checks run in a fixed order and fail fast, each with a
//! distinct reason:
//! 1. Agent active
//! 2. Certificate valid (delegated to the credential registry)
//! 3. Balance sufficient and amount within the per-transaction cap
//! 4. Counterparty not blacklisted
//! 5. Tier velocity windows (per-minute / per-hour / per-day) not exceeded
//!
//! Pattern heuristics (round amounts, rapid repetition, scam-language
//! markers) raise flags that lower confidence in later layers but never
//! reject on their own. Velocity budget is consumed only after a
//! transaction is fully approved; rejected attempts do not count.

pub mod error;
pub mod patterns;
pub mod validator;
pub mod velocity;

pub use error::{ValidationError, Result};
pub use patterns::{PatternDetector, PatternFlag};
pub use validator::{RateDecision, RateValidator, ValidatorConfig};
pub use velocity::{TierVelocityTable, VelocityLimits, VelocityTracker, WindowKind};
