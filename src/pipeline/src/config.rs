//! Aggregate pipeline configuration
//!
//! One immutable value passed into the coordinator at construction, so
//! multiple differently-configured pipelines can coexist in one process.

use veriflow_audit::RecorderConfig;
use veriflow_consensus::ConsensusConfig;
use veriflow_core::error::{PipelineError, Result};
use veriflow_credential::CredentialConfig;
use veriflow_oracle::OracleConfig;
use veriflow_reputation::ReputationConfig;
use veriflow_settlement::SettlementConfig;
use veriflow_validation::ValidatorConfig;

/// Settled outcomes handed to the risk scorer as history
const DEFAULT_HISTORY_WINDOW: usize = 50;

/// Configuration for every pipeline layer
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub credential: CredentialConfig,
    pub reputation: ReputationConfig,
    pub validator: ValidatorConfig,
    pub consensus: ConsensusConfig,
    pub oracle: OracleConfig,
    pub settlement: SettlementConfig,
    pub recorder: RecorderConfig,

    /// How many recent settled outcomes feed the risk context
    pub history_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            credential: CredentialConfig::default(),
            reputation: ReputationConfig::default(),
            validator: ValidatorConfig::default(),
            consensus: ConsensusConfig::default(),
            oracle: OracleConfig::default(),
            settlement: SettlementConfig::default(),
            recorder: RecorderConfig::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

impl PipelineConfig {
    /// Validate every sub-config up front so a bad deployment fails at
    /// construction, not mid-transaction.
    pub fn validate(&self) -> Result<()> {
        self.consensus
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        self.oracle
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        self.settlement
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        self.validator
            .velocity_table
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        self.reputation
            .weights
            .validate()
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        if self.history_window == 0 {
            return Err(PipelineError::Configuration(
                "history_window must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
