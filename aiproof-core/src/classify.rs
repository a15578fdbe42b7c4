//! Confidence and strength classification shared by every renderer.

use serde::{Deserialize, Serialize};

/// Confidence at or above which a watermark is reported as detected.
pub const DETECTED_THRESHOLD: f64 = 0.85;

/// Confidence at or above which a result is reported as uncertain.
pub const UNCERTAIN_THRESHOLD: f64 = 0.5;

/// Tri-state reading of a detection confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionVerdict {
    /// No watermark; likely human-created.
    Authentic,
    /// Weak signal; cannot tell either way.
    Uncertain,
    /// Watermark present.
    Detected,
}

impl DetectionVerdict {
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= DETECTED_THRESHOLD {
            Self::Detected
        } else if confidence >= UNCERTAIN_THRESHOLD {
            Self::Uncertain
        } else {
            Self::Authentic
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Authentic => "AUTHENTIC",
            Self::Uncertain => "UNCERTAIN",
            Self::Detected => "WATERMARK DETECTED",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Authentic => "No watermark detected - likely human-created",
            Self::Uncertain => "Weak watermark signal - result is inconclusive",
            Self::Detected => "AI-generated image detected",
        }
    }
}

impl std::fmt::Display for DetectionVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Trade-off band a watermark strength falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthTier {
    MinimalArtifacts,
    Balanced,
    MaximumRobustness,
}

impl StrengthTier {
    pub fn from_strength(strength: f64) -> Self {
        if strength <= 0.3 {
            Self::MinimalArtifacts
        } else if strength <= 0.6 {
            Self::Balanced
        } else {
            Self::MaximumRobustness
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::MinimalArtifacts => "Minimal artifacts",
            Self::Balanced => "Balanced",
            Self::MaximumRobustness => "Maximum robustness",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_breakpoints() {
        assert_eq!(DetectionVerdict::from_confidence(0.0), DetectionVerdict::Authentic);
        assert_eq!(DetectionVerdict::from_confidence(0.49), DetectionVerdict::Authentic);
        assert_eq!(DetectionVerdict::from_confidence(0.5), DetectionVerdict::Uncertain);
        assert_eq!(DetectionVerdict::from_confidence(0.84), DetectionVerdict::Uncertain);
        assert_eq!(DetectionVerdict::from_confidence(0.85), DetectionVerdict::Detected);
        assert_eq!(DetectionVerdict::from_confidence(1.0), DetectionVerdict::Detected);
    }

    #[test]
    fn test_verdict_nan_is_authentic() {
        assert_eq!(
            DetectionVerdict::from_confidence(f64::NAN),
            DetectionVerdict::Authentic
        );
    }

    #[test]
    fn test_strength_tiers() {
        assert_eq!(StrengthTier::from_strength(0.1), StrengthTier::MinimalArtifacts);
        assert_eq!(StrengthTier::from_strength(0.3), StrengthTier::MinimalArtifacts);
        assert_eq!(StrengthTier::from_strength(0.45), StrengthTier::Balanced);
        assert_eq!(StrengthTier::from_strength(0.6), StrengthTier::Balanced);
        assert_eq!(StrengthTier::from_strength(0.7), StrengthTier::MaximumRobustness);
    }
}
