//! Robustness statistics derived from an outcome sequence.
//!
//! Everything here is a pure function of the outcomes; nothing is cached.

use serde::{Deserialize, Serialize};

use crate::types::AttackOutcome;

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessSummary {
    /// Attacks that produced an outcome.
    pub total: usize,
    /// Attacks after which the watermark was still detected.
    pub survived_count: usize,
    /// Survival percentage in `0.0..=100.0`, one decimal place.
    pub robustness: f64,
    /// Mean confidence in `0.0..=1.0`.
    pub mean_confidence: f64,
}

impl RobustnessSummary {
    pub fn from_outcomes(outcomes: &[AttackOutcome]) -> Self {
        Self {
            total: outcomes.len(),
            survived_count: survived_count(outcomes),
            robustness: robustness(outcomes),
            mean_confidence: mean_confidence(outcomes),
        }
    }
}

/// Survival statistics for one attack type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeBreakdown {
    #[serde(rename = "type")]
    pub attack_type: String,
    pub total: usize,
    pub survived_count: usize,
    pub robustness: f64,
}

pub fn survived_count(outcomes: &[AttackOutcome]) -> usize {
    outcomes.iter().filter(|o| o.detected).count()
}

/// Percentage of detected outcomes, rounded to one decimal; 0 when empty.
pub fn robustness(outcomes: &[AttackOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let ratio = survived_count(outcomes) as f64 / outcomes.len() as f64;
    round_one_decimal(ratio * 100.0)
}

/// Mean confidence; 0 when empty.
pub fn mean_confidence(outcomes: &[AttackOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    outcomes.iter().map(|o| o.confidence).sum::<f64>() / outcomes.len() as f64
}

/// Robustness restricted to one attack type; 0 when it has no outcomes.
pub fn robustness_by_type(outcomes: &[AttackOutcome], attack_type: &str) -> f64 {
    let matching: Vec<AttackOutcome> = outcomes
        .iter()
        .filter(|o| o.attack_type == attack_type)
        .cloned()
        .collect();
    robustness(&matching)
}

/// Per-type statistics for every type present, in first-seen order.
pub fn breakdown_by_type(outcomes: &[AttackOutcome]) -> Vec<TypeBreakdown> {
    let mut breakdown: Vec<TypeBreakdown> = Vec::new();

    for outcome in outcomes {
        let existing = breakdown
            .iter()
            .position(|b| b.attack_type == outcome.attack_type);
        let idx = existing.unwrap_or_else(|| {
            breakdown.push(TypeBreakdown {
                attack_type: outcome.attack_type.clone(),
                total: 0,
                survived_count: 0,
                robustness: 0.0,
            });
            breakdown.len() - 1
        });
        let entry = &mut breakdown[idx];
        entry.total += 1;
        if outcome.detected {
            entry.survived_count += 1;
        }
    }

    for entry in &mut breakdown {
        entry.robustness =
            round_one_decimal(entry.survived_count as f64 / entry.total as f64 * 100.0);
    }
    breakdown
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
