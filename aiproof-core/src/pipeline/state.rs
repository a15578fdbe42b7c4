//! State of a single pipeline run.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::RobustnessSummary;
use crate::payload::{ImagePayload, StampedImage};
use crate::types::{AttackOutcome, Settings};

/// Identity of a run; newer runs have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub u64);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a run could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The upload was not an image. No network call was made.
    InvalidInput(String),
    /// The stamp call failed. No attack was attempted.
    StampError(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {msg}"),
            Self::StampError(msg) => write!(f, "Failed to stamp image: {msg}"),
        }
    }
}

/// Where a run is in `Idle -> Stamping -> Attacking* -> Complete | Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Stamping,
    /// `current` names the attack whose call is outstanding.
    Attacking { current: String },
    Complete,
    Failed(FailureReason),
    /// Replaced by a newer run before finishing. Only seen by the caller of
    /// the replaced run, never in published state.
    Superseded,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed(_) | Self::Superseded)
    }

    /// Short machine-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Stamping => "stamping",
            Self::Attacking { .. } => "attacking",
            Self::Complete => "complete",
            Self::Failed(_) => "failed",
            Self::Superseded => "superseded",
        }
    }

    /// Progress line for in-flight states.
    pub fn progress(&self) -> Option<String> {
        match self {
            Self::Stamping => Some("Stamping image...".to_string()),
            Self::Attacking { current } => Some(format!("Running: {current}...")),
            _ => None,
        }
    }
}

/// Ephemeral state of one end-to-end execution.
///
/// Images are shared behind `Arc` so snapshots stay cheap.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub(crate) run_id: RunId,
    pub(crate) started_at: DateTime<Utc>,
    pub(crate) settings: Settings,
    pub(crate) catalog_len: usize,
    pub(crate) source_image: Option<Arc<ImagePayload>>,
    pub(crate) stamped_image: Option<Arc<StampedImage>>,
    pub(crate) outcomes: Vec<AttackOutcome>,
    pub(crate) status: RunStatus,
}

impl PipelineRun {
    /// State before any image has been submitted.
    pub fn idle() -> Self {
        Self::new(RunId(0), Settings::default(), 0)
    }

    pub(crate) fn new(run_id: RunId, settings: Settings, catalog_len: usize) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            settings,
            catalog_len,
            source_image: None,
            stamped_image: None,
            outcomes: Vec::new(),
            status: RunStatus::Idle,
        }
    }

    pub(crate) fn begin_stamping(&mut self, source: Arc<ImagePayload>) {
        self.source_image = Some(source);
        self.status = RunStatus::Stamping;
    }

    pub(crate) fn stamped(&mut self, stamped: Arc<StampedImage>) {
        self.stamped_image = Some(stamped);
    }

    pub(crate) fn begin_attack(&mut self, name: &str) {
        self.status = RunStatus::Attacking {
            current: name.to_string(),
        };
    }

    /// Append an outcome. Ignored before stamping or past the catalog length.
    pub(crate) fn record(&mut self, outcome: AttackOutcome) {
        if self.stamped_image.is_some() && self.outcomes.len() < self.catalog_len {
            self.outcomes.push(outcome);
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = RunStatus::Complete;
    }

    pub(crate) fn fail(&mut self, reason: FailureReason) {
        self.status = RunStatus::Failed(reason);
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of attacks this run will execute.
    pub fn catalog_len(&self) -> usize {
        self.catalog_len
    }

    pub fn source_image(&self) -> Option<&ImagePayload> {
        self.source_image.as_deref()
    }

    pub fn stamped_image(&self) -> Option<&StampedImage> {
        self.stamped_image.as_deref()
    }

    /// Outcomes in catalog order.
    pub fn outcomes(&self) -> &[AttackOutcome] {
        &self.outcomes
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.status {
            RunStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn summary(&self) -> RobustnessSummary {
        RobustnessSummary::from_outcomes(&self.outcomes)
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::idle()
    }
}
