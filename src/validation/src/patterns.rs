//! Statistical and linguistic pattern heuristics
//!
//! Flags are advisory: they lower the confidence fed into consensus and
//! fraud scoring but never reject a transaction by themselves.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use veriflow_core::types::{AgentId, Transaction};

/// Description markers commonly seen in payment-scam language
const SCAM_MARKERS: &[&str] = &[
    "urgent",
    "act now",
    "guaranteed",
    "double your",
    "limited time",
    "verify your account",
    "prize",
];

/// Amounts at or above this (in smallest unit) are checked for roundness
const ROUND_AMOUNT_FLOOR: u64 = 100_000; // $1,000.00

/// Repeated identical transfers inside this window are flagged
const REPETITION_WINDOW_SECS: i64 = 120;

/// Recent submissions retained per agent for repetition detection
const MAX_RECENT_SUBMISSIONS: usize = 50;

/// One raised heuristic flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternFlag {
    /// Whole-currency amount at or above the roundness floor
    RoundAmount,

    /// Same counterparty and amount submitted again within the window
    RapidRepetition,

    /// Description contains a known scam-language marker
    ScamLanguage,
}

impl PatternFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternFlag::RoundAmount => "round_amount",
            PatternFlag::RapidRepetition => "rapid_repetition",
            PatternFlag::ScamLanguage => "scam_language",
        }
    }

    /// How much this flag lowers downstream confidence (0-1)
    pub fn confidence_penalty(&self) -> f64 {
        match self {
            PatternFlag::RoundAmount => 0.05,
            PatternFlag::RapidRepetition => 0.10,
            PatternFlag::ScamLanguage => 0.15,
        }
    }
}

/// Recent submission fingerprint used for repetition detection
#[derive(Debug, Clone)]
struct RecentSubmission {
    counterparty: String,
    amount: u64,
    seen_at: DateTime<Utc>,
}

/// Detects advisory pattern flags over per-agent submission history
pub struct PatternDetector {
    recent: DashMap<AgentId, VecDeque<RecentSubmission>>,
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternDetector {
    pub fn new() -> Self {
        Self {
            recent: DashMap::new(),
        }
    }

    /// Inspect a transaction, record it for future repetition checks, and
    /// return any raised flags.
    pub fn inspect(&self, transaction: &Transaction) -> Vec<PatternFlag> {
        let mut flags = Vec::new();

        if Self::is_round_amount(transaction.amount) {
            flags.push(PatternFlag::RoundAmount);
        }
        if Self::has_scam_language(&transaction.description) {
            flags.push(PatternFlag::ScamLanguage);
        }
        if self.is_rapid_repetition(transaction) {
            flags.push(PatternFlag::RapidRepetition);
        }

        if !flags.is_empty() {
            debug!(
                transaction_id = %transaction.id,
                flags = ?flags,
                "pattern flags raised"
            );
        }
        self.remember(transaction);
        flags
    }

    /// Combined confidence penalty for a set of flags, capped at 0.5
    pub fn combined_penalty(flags: &[PatternFlag]) -> f64 {
        flags
            .iter()
            .map(PatternFlag::confidence_penalty)
            .sum::<f64>()
            .min(0.5)
    }

    fn is_round_amount(amount: u64) -> bool {
        amount >= ROUND_AMOUNT_FLOOR && amount % 100 == 0
    }

    fn has_scam_language(description: &str) -> bool {
        let lowered = description.to_lowercase();
        SCAM_MARKERS.iter().any(|marker| lowered.contains(marker))
    }

    fn is_rapid_repetition(&self, transaction: &Transaction) -> bool {
        let cutoff = transaction.created_at - Duration::seconds(REPETITION_WINDOW_SECS);
        self.recent
            .get(&transaction.agent_id)
            .map(|entries| {
                entries.iter().any(|s| {
                    s.seen_at > cutoff
                        && s.counterparty == transaction.counterparty
                        && s.amount == transaction.amount
                })
            })
            .unwrap_or(false)
    }

    fn remember(&self, transaction: &Transaction) {
        let mut entries = self.recent.entry(transaction.agent_id.clone()).or_default();
        if entries.len() >= MAX_RECENT_SUBMISSIONS {
            entries.pop_front();
        }
        entries.push_back(RecentSubmission {
            counterparty: transaction.counterparty.clone(),
            amount: transaction.amount,
            seen_at: transaction.created_at,
        });
    }
}
