//! Deterministic rule-based risk estimator
//!
//! Engaged when the external scoring service times out or errors. The same
//! input always yields the same score, so fallback decisions are
//! reproducible from the audit trail.

use tracing::debug;

use veriflow_core::traits::{RecommendedAction, RiskAssessment, RiskContext};
use veriflow_core::types::{PipelineOutcome, Transaction};

/// Penalty for a suspiciously round amount
const ROUND_AMOUNT_PENALTY: f64 = 0.30;

/// Penalty for a null or all-zero counterparty address
const NULL_COUNTERPARTY_PENALTY: f64 = 0.30;

/// Penalty for urgency language in the description
const URGENCY_PENALTY: f64 = 0.25;

/// Penalty for an amount far outside the agent's recent history
const DEVIATION_PENALTY: f64 = 0.20;

/// Per-flag penalty for pattern flags raised earlier in the pipeline
const PATTERN_FLAG_PENALTY: f64 = 0.05;

/// Amounts at or above this (smallest unit) are checked for roundness
const ROUND_AMOUNT_FLOOR: u64 = 100_000;

/// Amount must exceed this multiple of the recent mean to count as deviant
const DEVIATION_MULTIPLE: f64 = 3.0;

/// Urgency markers checked against the description
const URGENCY_MARKERS: &[&str] = &["urgent", "act now", "immediately", "asap", "right away"];

/// Computes a deterministic risk score from transaction shape and history
#[derive(Debug, Default)]
pub struct FallbackEstimator {
    /// Risk at or above which the estimator recommends a hard block
    block_threshold: f64,

    /// Risk at or above which the estimator recommends review
    review_threshold: f64,
}

impl FallbackEstimator {
    pub fn new(block_threshold: f64, review_threshold: f64) -> Self {
        Self {
            block_threshold,
            review_threshold,
        }
    }

    /// Score a transaction without any external dependency
    pub fn estimate(&self, transaction: &Transaction, context: &RiskContext) -> RiskAssessment {
        let mut score = 0.0;
        let mut indicators = Vec::new();

        if Self::is_round_amount(transaction.amount) {
            score += ROUND_AMOUNT_PENALTY;
            indicators.push("round_amount".to_string());
        }
        if Self::is_null_counterparty(&transaction.counterparty) {
            score += NULL_COUNTERPARTY_PENALTY;
            indicators.push("null_counterparty".to_string());
        }
        if Self::has_urgency_language(&transaction.description) {
            score += URGENCY_PENALTY;
            indicators.push("urgency_language".to_string());
        }
        if self.deviates_from_history(transaction, context) {
            score += DEVIATION_PENALTY;
            indicators.push("history_deviation".to_string());
        }
        for flag in &context.pattern_flags {
            score += PATTERN_FLAG_PENALTY;
            indicators.push(format!("pattern:{}", flag));
        }

        let risk_score = score.min(1.0);
        let recommended_action = if risk_score >= self.block_threshold {
            RecommendedAction::Block
        } else if risk_score >= self.review_threshold {
            RecommendedAction::Review
        } else {
            RecommendedAction::Approve
        };
        debug!(
            transaction_id = %transaction.id,
            risk_score,
            ?indicators,
            "fallback risk estimate"
        );

        RiskAssessment {
            risk_score,
            indicators,
            recommended_action,
        }
    }

    fn is_round_amount(amount: u64) -> bool {
        amount >= ROUND_AMOUNT_FLOOR && amount % 100 == 0
    }

    /// Empty addresses and all-zero addresses (with or without an 0x
    /// prefix) are treated as null.
    fn is_null_counterparty(counterparty: &str) -> bool {
        let stripped = counterparty.strip_prefix("0x").unwrap_or(counterparty);
        stripped.is_empty() || stripped.chars().all(|c| c == '0')
    }

    fn has_urgency_language(description: &str) -> bool {
        let lowered = description.to_lowercase();
        URGENCY_MARKERS.iter().any(|m| lowered.contains(m))
    }

    /// True when the amount is far above the mean of recent approved
    /// settlements. Needs at least three data points to say anything.
    fn deviates_from_history(&self, transaction: &Transaction, context: &RiskContext) -> bool {
        let approved: Vec<u64> = context
            .history
            .iter()
            .filter(|o| o.outcome == PipelineOutcome::Approved)
            .map(|o| o.amount)
            .collect();
        if approved.len() < 3 {
            return false;
        }
        let mean = approved.iter().sum::<u64>() as f64 / approved.len() as f64;
        transaction.amount as f64 > mean * DEVIATION_MULTIPLE
    }
}
