//! HTTP client for the AI-PROOF watermark API.
//!
//! ## Endpoints
//!
//! - `GET  /api/attacks` - predefined attack catalog
//! - `POST /api/stamp?strength=&adaptive=` - embed a watermark
//! - `POST /api/attack?attack_type=&severity=` - attack, then re-detect
//! - `POST /api/detect` - detect a watermark and render its heatmap
//! - `GET  /api/health` - liveness
//!
//! Catalog and health reads retry transient failures with exponential
//! backoff. Uploads are sent once.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use super::http_client::{ServiceHttpClient, ServiceHttpConfig};
use super::{ServiceHealth, WatermarkService};
use crate::error::{Result, WatermarkError};
use crate::payload::{decode_optional_png, ImagePayload, StampedImage};
use crate::types::{AttackDefinition, AttackVerdict, DetectionReport, Settings};

/// Default service endpoint.
const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Default timeout for API requests. Stamping large images is slow.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts.
const MAX_RETRIES: u32 = 3;

/// Initial retry interval.
const INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum retry interval.
const MAX_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct AttacksResponse {
    attacks: Vec<AttackDefinition>,
}

#[derive(Debug, Deserialize)]
struct StampResponse {
    stamped_image: String,
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    detected: bool,
    confidence: f64,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    heatmap: Option<String>,
    #[serde(default)]
    ai_generated: bool,
    #[serde(default)]
    message: String,
}

/// Configuration for the remote service client.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// API base URL.
    pub api_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors.
    pub max_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("AIPROOF_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: std::env::var("AIPROOF_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            max_retries: std::env::var("AIPROOF_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_RETRIES),
        }
    }
}

/// Watermark service reached over HTTP.
pub struct RemoteWatermarkService {
    http: ServiceHttpClient,
}

impl RemoteWatermarkService {
    /// Client with configuration taken from the environment.
    pub fn new() -> Result<Self> {
        Self::with_config(ServiceConfig::default())
    }

    #[instrument(level = "debug", skip_all, fields(
        api_url = %config.api_url,
        timeout_ms = config.timeout.as_millis() as u64,
        max_retries = config.max_retries
    ))]
    pub fn with_config(config: ServiceConfig) -> Result<Self> {
        if !config.api_url.starts_with("http://") && !config.api_url.starts_with("https://") {
            return Err(WatermarkError::InvalidInput(format!(
                "API URL must start with http:// or https://, got {}",
                config.api_url
            )));
        }

        let http = ServiceHttpClient::new(ServiceHttpConfig {
            base_url: config.api_url,
            timeout: config.timeout,
            max_retries: config.max_retries,
            initial_interval: INITIAL_INTERVAL,
            max_interval: MAX_INTERVAL,
        })?;

        debug!("Watermark service client created");
        Ok(Self { http })
    }

    pub fn api_url(&self) -> &str {
        &self.http.config().base_url
    }
}

#[async_trait]
impl WatermarkService for RemoteWatermarkService {
    #[instrument(level = "info", skip(self), fields(api_url = %self.api_url()))]
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        let response: AttacksResponse = self.http.get_json("/api/attacks").await?;
        info!(count = response.attacks.len(), "Fetched attack catalog");
        Ok(response.attacks)
    }

    #[instrument(level = "info", skip_all, fields(
        strength = settings.strength(),
        adaptive = settings.adaptive_masking(),
        bytes = image.len()
    ))]
    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        let start = Instant::now();
        let query = [
            ("strength", settings.strength().to_string()),
            ("adaptive", settings.adaptive_masking().to_string()),
        ];

        let response: StampResponse = self.http.post_image("/api/stamp", &query, image).await?;
        let stamped = StampedImage::from_base64(&response.stamped_image)?;

        info!(
            latency_ms = start.elapsed().as_millis() as u64,
            stamped_bytes = stamped.as_png().len(),
            "Image stamped"
        );
        Ok(stamped)
    }

    #[instrument(level = "debug", skip_all, fields(
        attack = %attack.name,
        attack_type = %attack.attack_type,
        severity = attack.severity
    ))]
    async fn attack(
        &self,
        image: &ImagePayload,
        attack: &AttackDefinition,
    ) -> Result<AttackVerdict> {
        let query = [
            ("attack_type", attack.attack_type.clone()),
            ("severity", attack.severity.to_string()),
        ];

        let verdict: AttackVerdict = self.http.post_image("/api/attack", &query, image).await?;
        debug!(
            detected = verdict.detected,
            confidence = verdict.confidence,
            "Attack completed"
        );
        Ok(verdict)
    }

    #[instrument(level = "info", skip_all, fields(bytes = image.len()))]
    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport> {
        let response: DetectResponse = self.http.post_image("/api/detect", &[], image).await?;

        let heatmap = decode_optional_png(response.heatmap.as_deref()).unwrap_or_else(|e| {
            warn!(error = %e, "Discarding undecodable heatmap");
            None
        });

        info!(
            detected = response.detected,
            confidence = response.confidence,
            "Detection completed"
        );

        Ok(DetectionReport {
            detected: response.detected,
            confidence: response.confidence,
            payload: response.payload,
            heatmap,
            ai_generated: response.ai_generated,
            message: response.message,
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn health(&self) -> Result<ServiceHealth> {
        self.http.get_json("/api/health").await
    }
}
