//! Serialisable export of a finished run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{PipelineRun, RunId};
use crate::aggregate::{breakdown_by_type, RobustnessSummary, TypeBreakdown};
use crate::classify::StrengthTier;
use crate::types::AttackOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub source_file: Option<String>,
    pub strength: f64,
    pub strength_tier: StrengthTier,
    pub adaptive_masking: bool,
    /// One of `idle`, `stamping`, `attacking`, `complete`, `failed`, `superseded`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stamped: bool,
    pub outcomes: Vec<AttackOutcome>,
    pub summary: RobustnessSummary,
    pub by_type: Vec<TypeBreakdown>,
}

impl PipelineReport {
    pub fn from_run(run: &PipelineRun) -> Self {
        let settings = run.settings();
        Self {
            run_id: run.run_id(),
            started_at: run.started_at(),
            source_file: run.source_image().map(|img| img.file_name().to_string()),
            strength: settings.strength(),
            strength_tier: StrengthTier::from_strength(settings.strength()),
            adaptive_masking: settings.adaptive_masking(),
            status: run.status().label().to_string(),
            error: run.failure().map(ToString::to_string),
            stamped: run.stamped_image().is_some(),
            outcomes: run.outcomes().to_vec(),
            summary: run.summary(),
            by_type: breakdown_by_type(run.outcomes()),
        }
    }
}
