//! Shared value types exchanged between the service, the orchestrator and
//! the aggregator.

use serde::{Deserialize, Serialize};

use crate::error::WatermarkError;

/// Lowest watermark strength the client will send.
pub const MIN_STRENGTH: f64 = 0.1;

/// Highest watermark strength the client will send.
pub const MAX_STRENGTH: f64 = 1.0;

/// Strength used when the caller does not choose one.
pub const DEFAULT_STRENGTH: f64 = 0.7;

/// One entry of the attack catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDefinition {
    /// Display label, unique within a catalog (e.g. "JPEG 50").
    pub name: String,
    /// Attack category understood by the service (e.g. "jpeg", "crop").
    #[serde(rename = "type")]
    pub attack_type: String,
    /// Intensity in `0.0..=1.0`.
    pub severity: f64,
}

impl AttackDefinition {
    pub fn new(name: impl Into<String>, attack_type: impl Into<String>, severity: f64) -> Self {
        Self {
            name: name.into(),
            attack_type: attack_type.into(),
            severity,
        }
    }
}

/// What the service reported after attacking and re-detecting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AttackVerdict {
    pub detected: bool,
    pub confidence: f64,
}

/// Result of running one catalog entry against the stamped image.
///
/// Created once per attack and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub name: String,
    #[serde(rename = "type")]
    pub attack_type: String,
    pub severity: f64,
    pub detected: bool,
    pub confidence: f64,
}

impl AttackOutcome {
    /// Outcome carrying the service's own verdict.
    pub fn survived(definition: &AttackDefinition, verdict: AttackVerdict) -> Self {
        Self {
            name: definition.name.clone(),
            attack_type: definition.attack_type.clone(),
            severity: definition.severity,
            detected: verdict.detected,
            confidence: clamp_confidence(verdict.confidence),
        }
    }

    /// Negative outcome recorded when the attack call itself failed.
    pub fn failed(definition: &AttackDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            attack_type: definition.attack_type.clone(),
            severity: definition.severity,
            detected: false,
            confidence: 0.0,
        }
    }

    /// Coerce an attack call result into an outcome; errors never escape.
    pub fn from_result(
        definition: &AttackDefinition,
        result: &std::result::Result<AttackVerdict, WatermarkError>,
    ) -> Self {
        match result {
            Ok(verdict) => Self::survived(definition, *verdict),
            Err(_) => Self::failed(definition),
        }
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Watermark embedding parameters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    strength: f64,
    adaptive_masking: bool,
}

impl Settings {
    /// Build settings, clamping strength into `[MIN_STRENGTH, MAX_STRENGTH]`.
    pub fn new(strength: f64, adaptive_masking: bool) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(MIN_STRENGTH, MAX_STRENGTH)
        } else {
            DEFAULT_STRENGTH
        };
        Self {
            strength,
            adaptive_masking,
        }
    }

    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn adaptive_masking(&self) -> bool {
        self.adaptive_masking
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_STRENGTH, false)
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Strength {:.0}% | Adaptive Masking {}",
            self.strength * 100.0,
            if self.adaptive_masking { "ON" } else { "OFF" }
        )
    }
}

/// Full response of the detect endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    pub detected: bool,
    pub confidence: f64,
    pub payload: Option<String>,
    /// Decoded PNG bytes of the frequency-domain heatmap, when returned.
    pub heatmap: Option<Vec<u8>>,
    pub ai_generated: bool,
    pub message: String,
}
