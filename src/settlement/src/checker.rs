//! Structural feasibility checks against the settlement probe

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, SettlementError};
use veriflow_core::traits::{FeasibilityEstimate, SettlementNetwork};
use veriflow_core::types::{
    Amount, PipelineLayer, RejectionKind, Transaction, ValidationResult,
};

/// Shortest acceptable counterparty identifier
const MIN_ADDRESS_LEN: usize = 4;

/// Longest acceptable counterparty identifier
const MAX_ADDRESS_LEN: usize = 128;

/// Checker configuration
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Estimated execution cost must stay below this (smallest unit)
    pub cost_ceiling: Amount,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            cost_ceiling: 10_000, // $100.00
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cost_ceiling == 0 {
            return Err(SettlementError::Configuration(
                "cost ceiling must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// The layer result plus the probe's estimate when one was obtained
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    pub result: ValidationResult,
    pub estimate: Option<FeasibilityEstimate>,
}

/// Predicts whether the settlement layer could execute a transfer
pub struct FeasibilityChecker {
    config: SettlementConfig,
    network: Arc<dyn SettlementNetwork>,
}

impl FeasibilityChecker {
    pub fn new(config: SettlementConfig, network: Arc<dyn SettlementNetwork>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, network })
    }

    /// Run the structural checks. An unreachable probe counts as
    /// infeasible, not as a system error: settlement cannot be confirmed.
    pub async fn check(&self, transaction: &Transaction) -> SettlementOutcome {
        let started = Instant::now();
        let layer = PipelineLayer::SettlementFeasibility;

        if !Self::is_well_formed_address(&transaction.counterparty) {
            return SettlementOutcome {
                result: ValidationResult::fail(
                    layer,
                    RejectionKind::SettlementInfeasible,
                    format!("malformed counterparty address: {:?}", transaction.counterparty),
                )
                .with_elapsed_ms(started.elapsed().as_millis() as u64),
                estimate: None,
            };
        }

        let estimate = match self.network.estimate_feasibility(transaction).await {
            Ok(estimate) => estimate,
            Err(e) => {
                warn!(transaction_id = %transaction.id, error = %e, "settlement probe unreachable");
                return SettlementOutcome {
                    result: ValidationResult::fail(
                        layer,
                        RejectionKind::SettlementInfeasible,
                        "execution cost estimate unavailable",
                    )
                    .with_elapsed_ms(started.elapsed().as_millis() as u64),
                    estimate: None,
                };
            }
        };

        let result = self.judge(transaction, &estimate, started);
        SettlementOutcome {
            result,
            estimate: Some(estimate),
        }
    }

    fn judge(
        &self,
        transaction: &Transaction,
        estimate: &FeasibilityEstimate,
        started: Instant,
    ) -> ValidationResult {
        let layer = PipelineLayer::SettlementFeasibility;
        let metadata = serde_json::json!({
            "estimated_cost": estimate.estimated_cost,
            "estimated_latency_ms": estimate.estimated_latency.as_millis() as u64,
            "cost_ceiling": self.config.cost_ceiling,
        });

        if !estimate.feasible {
            return ValidationResult::fail(
                layer,
                RejectionKind::SettlementInfeasible,
                "settlement layer reports transfer not executable",
            )
            .with_metadata(metadata)
            .with_elapsed_ms(started.elapsed().as_millis() as u64);
        }

        if estimate.estimated_cost >= self.config.cost_ceiling {
            return ValidationResult::fail(
                layer,
                RejectionKind::SettlementInfeasible,
                format!(
                    "estimated cost {} at or above ceiling {}",
                    estimate.estimated_cost, self.config.cost_ceiling
                ),
            )
            .with_metadata(metadata)
            .with_elapsed_ms(started.elapsed().as_millis() as u64);
        }

        if let Some(deadline) = transaction.deadline {
            let latency = ChronoDuration::from_std(estimate.estimated_latency)
                .unwrap_or_else(|_| ChronoDuration::seconds(i64::MAX / 1_000));
            let earliest_settlement = Utc::now() + latency;
            if earliest_settlement > deadline {
                return ValidationResult::fail(
                    layer,
                    RejectionKind::SettlementInfeasible,
                    format!(
                        "deadline {} unreachable, earliest settlement {}",
                        deadline, earliest_settlement
                    ),
                )
                .with_metadata(metadata)
                .with_elapsed_ms(started.elapsed().as_millis() as u64);
            }
        }

        debug!(
            transaction_id = %transaction.id,
            estimated_cost = estimate.estimated_cost,
            "settlement feasible"
        );
        ValidationResult::pass(layer, "transfer structurally executable")
            .with_metadata(metadata)
            .with_elapsed_ms(started.elapsed().as_millis() as u64)
    }

    /// Addresses are length-bounded and limited to a conservative charset
    fn is_well_formed_address(address: &str) -> bool {
        let len = address.len();
        (MIN_ADDRESS_LEN..=MAX_ADDRESS_LEN).contains(&len)
            && address
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
    }
}
