//! Attack-resilience pipeline: stamp an image, attack it, re-detect.

mod orchestrator;
mod report;
mod state;

pub use orchestrator::{OrchestratorConfig, PipelineOrchestrator};
pub use report::PipelineReport;
pub use state::{FailureReason, PipelineRun, RunId, RunStatus};
