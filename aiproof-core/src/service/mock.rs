//! Scripted in-memory watermark service for testing.
//! WARNING: Never reports real detections - verdicts are whatever the test scripted.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::{ServiceHealth, WatermarkService};
use crate::error::{Result, WatermarkError};
use crate::payload::{ImagePayload, StampedImage};
use crate::types::{AttackDefinition, AttackVerdict, DetectionReport, Settings};

/// A call recorded by [`MockWatermarkService`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    ListAttacks,
    Stamp { strength: f64, adaptive: bool },
    Attack { name: String, attack_type: String, severity: f64 },
    Detect,
    Health,
}

/// Watermark service whose answers are scripted up front.
///
/// By default the catalog is empty, stamping re-encodes the upload as PNG and
/// every attack is survived with confidence 0.95.
pub struct MockWatermarkService {
    catalog: Option<Vec<AttackDefinition>>,
    stamp_fails: bool,
    default_verdict: AttackVerdict,
    verdicts: HashMap<String, AttackVerdict>,
    failing_attacks: HashSet<String>,
    detection: DetectionReport,
    delay: Option<Duration>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockWatermarkService {
    pub fn new() -> Self {
        Self {
            catalog: Some(Vec::new()),
            stamp_fails: false,
            default_verdict: AttackVerdict {
                detected: true,
                confidence: 0.95,
            },
            verdicts: HashMap::new(),
            failing_attacks: HashSet::new(),
            detection: DetectionReport {
                detected: true,
                confidence: 0.95,
                payload: Some("AI-PROOF-v1".to_string()),
                heatmap: None,
                ai_generated: true,
                message: "AI-generated image detected".to_string(),
            },
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_catalog(mut self, catalog: Vec<AttackDefinition>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Make `list_attacks` fail with a transport error.
    pub fn with_unreachable_catalog(mut self) -> Self {
        self.catalog = None;
        self
    }

    pub fn with_failing_stamp(mut self) -> Self {
        self.stamp_fails = true;
        self
    }

    /// Verdict for attacks without a per-name override.
    pub fn with_default_verdict(mut self, detected: bool, confidence: f64) -> Self {
        self.default_verdict = AttackVerdict {
            detected,
            confidence,
        };
        self
    }

    pub fn with_verdict(mut self, name: &str, detected: bool, confidence: f64) -> Self {
        self.verdicts.insert(
            name.to_string(),
            AttackVerdict {
                detected,
                confidence,
            },
        );
        self
    }

    /// Make the attack named `name` fail with a transport error.
    pub fn with_failing_attack(mut self, name: &str) -> Self {
        self.failing_attacks.insert(name.to_string());
        self
    }

    pub fn with_detection(mut self, detection: DetectionReport) -> Self {
        self.detection = detection;
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn attack_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Attack { .. }))
            .count()
    }

    async fn record(&self, call: MockCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockWatermarkService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WatermarkService for MockWatermarkService {
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        self.record(MockCall::ListAttacks).await;
        self.catalog
            .clone()
            .ok_or_else(|| WatermarkError::TransportError("mock catalog unreachable".into()))
    }

    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        self.record(MockCall::Stamp {
            strength: settings.strength(),
            adaptive: settings.adaptive_masking(),
        })
        .await;
        if self.stamp_fails {
            return Err(WatermarkError::ServiceError {
                status: 500,
                message: "Error stamping image: mock failure".into(),
            });
        }
        StampedImage::from_image_bytes(image.bytes().to_vec())
    }

    async fn attack(
        &self,
        _image: &ImagePayload,
        attack: &AttackDefinition,
    ) -> Result<AttackVerdict> {
        self.record(MockCall::Attack {
            name: attack.name.clone(),
            attack_type: attack.attack_type.clone(),
            severity: attack.severity,
        })
        .await;
        if self.failing_attacks.contains(&attack.name) {
            return Err(WatermarkError::TransportError(format!(
                "mock transport failure for {}",
                attack.name
            )));
        }
        Ok(self
            .verdicts
            .get(&attack.name)
            .copied()
            .unwrap_or(self.default_verdict))
    }

    async fn detect(&self, _image: &ImagePayload) -> Result<DetectionReport> {
        self.record(MockCall::Detect).await;
        Ok(self.detection.clone())
    }

    async fn health(&self) -> Result<ServiceHealth> {
        self.record(MockCall::Health).await;
        Ok(ServiceHealth {
            status: "healthy".to_string(),
            service: "AI-PROOF API (mock)".to_string(),
        })
    }
}
