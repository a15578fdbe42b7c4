//! AI-PROOF Core - watermark robustness testing client
//!
//! This crate drives a remote watermarking service through a complete
//! robustness test: stamp an image, run every attack in the service's
//! catalog against the stamped result, and score how often the watermark
//! survived.
//!
//! # Components
//!
//! - [`WatermarkService`] - the remote stamp/detect/attack API, with an HTTP
//!   client and a scripted mock
//! - [`AttackCatalog`] - attack definitions, loaded once per session
//! - [`PipelineOrchestrator`] - sequential, failure-isolating run driver with
//!   run supersession
//! - [`aggregate`] - robustness score, survival count, mean confidence
//! - [`DetectionVerdict`] - the shared authentic/uncertain/detected classifier
//!
//! # Example
//!
//! ```no_run
//! use aiproof_core::{MockWatermarkService, PipelineOrchestrator, AttackDefinition, Settings};
//!
//! # async fn example() {
//! let service = MockWatermarkService::new().with_catalog(vec![
//!     AttackDefinition::new("JPEG 50", "jpeg", 0.5),
//!     AttackDefinition::new("Crop 85%", "crop", 0.3),
//! ]);
//! let orchestrator = PipelineOrchestrator::connect(service).await;
//!
//! let image = std::fs::read("photo.png").unwrap();
//! let run = orchestrator.run(image, "photo.png", Settings::default()).await;
//! let summary = run.summary();
//! println!("{}/{} attacks survived", summary.survived_count, summary.total);
//! # }
//! ```

pub mod aggregate;
pub mod catalog;
pub mod classify;
pub mod error;
pub mod payload;
pub mod pipeline;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use aggregate::{RobustnessSummary, TypeBreakdown};
pub use catalog::AttackCatalog;
pub use classify::{DetectionVerdict, StrengthTier};
pub use error::{Result, WatermarkError};
pub use payload::{ImagePayload, StampedImage};
pub use pipeline::{
    FailureReason, OrchestratorConfig, PipelineOrchestrator, PipelineReport, PipelineRun, RunId,
    RunStatus,
};
pub use service::{MockWatermarkService, ServiceHealth, WatermarkService};
pub use types::{AttackDefinition, AttackOutcome, AttackVerdict, DetectionReport, Settings};

// Network-dependent exports
#[cfg(feature = "network")]
pub use service::{RemoteWatermarkService, ServiceConfig};
