//! Bounded-timeout oracle calls with deterministic fallback

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{OracleError, Result};
use crate::fallback::FallbackEstimator;
use veriflow_core::traits::{RecommendedAction, RiskAssessment, RiskContext, RiskScoringService};
use veriflow_core::types::{PipelineLayer, RejectionKind, Transaction, ValidationResult};

/// Default budget for one oracle call
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Which path produced the assessment. Audits rely on this to tell oracle
/// decisions from fallback decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentMethod {
    /// External scoring service responded in time
    Oracle,

    /// Deterministic local estimator after timeout or error
    Fallback,
}

impl AssessmentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentMethod::Oracle => "oracle",
            AssessmentMethod::Fallback => "fallback",
        }
    }
}

/// Adapter configuration
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Per-attempt call budget
    pub call_timeout: Duration,

    /// Additional attempts after the first before falling back
    pub max_retries: usize,

    /// Risk at or above this fails the layer with `FraudSuspected`
    pub block_threshold: f64,

    /// Risk at or above this (but below block) records a soft review flag
    pub review_threshold: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: 1,
            block_threshold: 0.7,
            review_threshold: 0.4,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.block_threshold)
            || !(0.0..=1.0).contains(&self.review_threshold)
        {
            return Err(OracleError::Configuration(
                "thresholds must be in [0, 1]".to_string(),
            ));
        }
        if self.review_threshold > self.block_threshold {
            return Err(OracleError::Configuration(
                "review threshold must not exceed block threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// The layer result plus the raw assessment and the path that produced it
#[derive(Debug, Clone)]
pub struct OracleOutcome {
    pub result: ValidationResult,
    pub assessment: RiskAssessment,
    pub method: AssessmentMethod,
}

/// Wraps the external risk scorer with timeout, bounded retry, and the
/// deterministic fallback so this layer can never stall the pipeline.
pub struct FraudOracleAdapter {
    config: OracleConfig,
    service: Arc<dyn RiskScoringService>,
    fallback: FallbackEstimator,
}

impl FraudOracleAdapter {
    pub fn new(config: OracleConfig, service: Arc<dyn RiskScoringService>) -> Result<Self> {
        config.validate()?;
        let fallback = FallbackEstimator::new(config.block_threshold, config.review_threshold);
        Ok(Self {
            config,
            service,
            fallback,
        })
    }

    /// Assess a transaction, always producing an outcome.
    ///
    /// Retries the external call within its bounded budget; the fallback
    /// estimator is the terminal recovery path, never an error.
    pub async fn assess(&self, transaction: &Transaction, context: &RiskContext) -> OracleOutcome {
        let started = Instant::now();

        let (assessment, method) = match self.call_with_retry(transaction, context).await {
            Some(assessment) => (assessment, AssessmentMethod::Oracle),
            None => {
                info!(
                    transaction_id = %transaction.id,
                    "oracle unavailable, using deterministic fallback"
                );
                (
                    self.fallback.estimate(transaction, context),
                    AssessmentMethod::Fallback,
                )
            }
        };

        let review = assessment.risk_score >= self.config.review_threshold
            && assessment.risk_score < self.config.block_threshold;
        let metadata = serde_json::json!({
            "method": method.as_str(),
            "indicators": assessment.indicators,
            "recommended_action": format!("{:?}", assessment.recommended_action),
            "review_flag": review,
        });

        let result = if assessment.risk_score >= self.config.block_threshold
            || assessment.recommended_action == RecommendedAction::Block
        {
            ValidationResult::fail(
                PipelineLayer::FraudAssessment,
                RejectionKind::FraudSuspected,
                format!(
                    "risk score {:.2} at or above block threshold {:.2}",
                    assessment.risk_score, self.config.block_threshold
                ),
            )
        } else {
            let reason = if review {
                format!(
                    "risk score {:.2} within review band, flagged for review",
                    assessment.risk_score
                )
            } else {
                format!("risk score {:.2} below review threshold", assessment.risk_score)
            };
            ValidationResult::pass(PipelineLayer::FraudAssessment, reason)
        }
        .with_score(assessment.risk_score)
        .with_metadata(metadata)
        .with_elapsed_ms(started.elapsed().as_millis() as u64);

        OracleOutcome {
            result,
            assessment,
            method,
        }
    }

    /// One initial attempt plus up to `max_retries` more, each bounded by
    /// the call timeout. `None` means every attempt failed.
    async fn call_with_retry(
        &self,
        transaction: &Transaction,
        context: &RiskContext,
    ) -> Option<RiskAssessment> {
        for attempt in 0..=self.config.max_retries {
            match timeout(
                self.config.call_timeout,
                self.service.score(transaction, context),
            )
            .await
            {
                Ok(Ok(assessment)) => {
                    debug!(
                        transaction_id = %transaction.id,
                        attempt,
                        risk_score = assessment.risk_score,
                        "oracle responded"
                    );
                    return Some(assessment);
                }
                Ok(Err(e)) => {
                    warn!(transaction_id = %transaction.id, attempt, error = %e, "oracle call failed");
                }
                Err(_) => {
                    warn!(transaction_id = %transaction.id, attempt, "oracle call timed out");
                }
            }
        }
        None
    }
}
