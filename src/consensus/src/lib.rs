//! Consensus Coordinator for the Veriflow pipeline
//!
//! Collects independent votes from a fixed set of voting parties
//! ("divisions") in parallel and computes a single decision:
//! - **Unanimous** mode (default): pass only if every voter approves
//! - **Threshold** mode: pass if the approval ratio meets a configured bar
//!
//! The two modes exist because project policy defines them separately; they
//! are never reconciled into one. A voter that times out or errors is
//! treated as an implicit reject with zero confidence (fail-safe default),
//! recorded as a synthetic vote so the trail shows who stalled. The
//! aggregate score is the arithmetic mean of voter confidences.

pub mod coordinator;
pub mod error;

pub use coordinator::{
    ConsensusConfig, ConsensusCoordinator, ConsensusDecision, ConsensusPolicy, MIN_VOTERS,
};
pub use error::{ConsensusError, Result};
