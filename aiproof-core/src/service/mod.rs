//! Client side of the remote watermark service.
//!
//! The service stamps, detects and attacks images; this crate treats it as a
//! black box behind [`WatermarkService`]:
//!
//! - [`RemoteWatermarkService`] - HTTP client for the AI-PROOF API
//! - [`MockWatermarkService`] - scripted in-memory service for tests
//!
//! ```no_run
//! use aiproof_core::service::{RemoteWatermarkService, WatermarkService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = RemoteWatermarkService::new()?;
//! let attacks = service.list_attacks().await?;
//! println!("{} attacks available", attacks.len());
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "network")]
pub mod http_client;
mod mock;
#[cfg(feature = "network")]
mod remote;

pub use mock::{MockCall, MockWatermarkService};
#[cfg(feature = "network")]
pub use remote::{RemoteWatermarkService, ServiceConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::payload::{ImagePayload, StampedImage};
use crate::types::{AttackDefinition, AttackVerdict, DetectionReport, Settings};

/// Operations exposed by the watermark service.
///
/// Implementations must be thread-safe (`Send + Sync`); the orchestrator
/// shares one instance across runs.
#[async_trait]
pub trait WatermarkService: Send + Sync {
    /// Fetch the attack catalog.
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>>;

    /// Embed a watermark into `image`.
    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage>;

    /// Apply `attack` to `image`, then re-run detection on the result.
    async fn attack(&self, image: &ImagePayload, attack: &AttackDefinition)
        -> Result<AttackVerdict>;

    /// Run watermark detection on `image`.
    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport>;

    /// Liveness probe.
    async fn health(&self) -> Result<ServiceHealth>;
}

#[async_trait]
impl<S: WatermarkService + ?Sized> WatermarkService for Arc<S> {
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        (**self).list_attacks().await
    }

    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        (**self).stamp(image, settings).await
    }

    async fn attack(
        &self,
        image: &ImagePayload,
        attack: &AttackDefinition,
    ) -> Result<AttackVerdict> {
        (**self).attack(image, attack).await
    }

    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport> {
        (**self).detect(image).await
    }

    async fn health(&self) -> Result<ServiceHealth> {
        (**self).health().await
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub service: String,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status.as_str(), "healthy" | "ok")
    }
}
