//! Pipeline behaviour tests against scripted services.
//!
//! These cover failure isolation, ordering, supersession of in-flight runs,
//! and per-call timeouts.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use aiproof_core::service::MockCall;
use aiproof_core::{
    AttackCatalog, AttackDefinition, AttackVerdict, DetectionReport, FailureReason, ImagePayload,
    MockWatermarkService, OrchestratorConfig, PipelineOrchestrator, PipelineRun, Result,
    RunStatus, ServiceHealth, Settings, StampedImage, WatermarkService,
};
use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgb};
use tokio::sync::{watch, Notify};

/// A 32x32 gradient PNG.
fn test_png() -> Vec<u8> {
    let img = ImageBuffer::from_fn(32, 32, |x, y| Rgb([(x * 8) as u8, (y * 8) as u8, 128u8]));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

/// jpeg/0.5, crop/0.3, blur/0.7
fn three_attacks() -> Vec<AttackDefinition> {
    vec![
        AttackDefinition::new("jpeg", "jpeg", 0.5),
        AttackDefinition::new("crop", "crop", 0.3),
        AttackDefinition::new("blur", "blur", 0.7),
    ]
}

async fn orchestrator(service: MockWatermarkService) -> PipelineOrchestrator<MockWatermarkService> {
    PipelineOrchestrator::connect(service).await
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_a_all_attacks_survived() {
    let orchestrator = orchestrator(MockWatermarkService::new().with_catalog(three_attacks())).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert_eq!(run.status(), &RunStatus::Complete);
    let summary = run.summary();
    assert_eq!(summary.robustness, 100.0);
    assert_eq!(summary.survived_count, 3);
    assert_eq!(summary.total, 3);
}

#[tokio::test]
async fn test_scenario_b_one_attack_transport_error() {
    let service = MockWatermarkService::new()
        .with_catalog(three_attacks())
        .with_failing_attack("crop");
    let orchestrator = orchestrator(service).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert_eq!(run.status(), &RunStatus::Complete);
    let crop = &run.outcomes()[1];
    assert_eq!(crop.name, "crop");
    assert!(!crop.detected);
    assert_eq!(crop.confidence, 0.0);
    assert_eq!(run.summary().robustness, 66.7);

    // The failure did not stop the remaining attack
    assert_eq!(orchestrator.service().attack_calls(), 3);
    assert!(run.outcomes()[2].detected);
}

#[tokio::test]
async fn test_scenario_c_stamp_failure() {
    let service = MockWatermarkService::new()
        .with_catalog(three_attacks())
        .with_failing_stamp();
    let orchestrator = orchestrator(service).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert!(matches!(
        run.status(),
        RunStatus::Failed(FailureReason::StampError(_))
    ));
    assert!(run.outcomes().is_empty());
    assert!(run.stamped_image().is_none());
    assert_eq!(orchestrator.service().attack_calls(), 0);
}

#[tokio::test]
async fn test_scenario_d_empty_catalog() {
    let orchestrator = orchestrator(MockWatermarkService::new().with_catalog(Vec::new())).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert_eq!(run.status(), &RunStatus::Complete);
    assert!(run.stamped_image().is_some());
    assert!(run.outcomes().is_empty());
    assert_eq!(run.summary().robustness, 0.0);
}

#[tokio::test]
async fn test_unreachable_catalog_still_stamps() {
    let orchestrator = orchestrator(MockWatermarkService::new().with_unreachable_catalog()).await;
    assert!(orchestrator.catalog().is_empty());

    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;
    assert_eq!(run.status(), &RunStatus::Complete);
    assert!(run.stamped_image().is_some());
}

// ============================================================================
// Ordering and failure isolation
// ============================================================================

#[tokio::test]
async fn test_every_attack_failing_still_completes() {
    let mut service = MockWatermarkService::new().with_catalog(three_attacks());
    for attack in three_attacks() {
        service = service.with_failing_attack(&attack.name);
    }
    let orchestrator = orchestrator(service).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert_eq!(run.status(), &RunStatus::Complete);
    assert_eq!(run.outcomes().len(), 3);
    assert!(run.outcomes().iter().all(|o| !o.detected && o.confidence == 0.0));
    assert_eq!(run.summary().robustness, 0.0);
}

#[tokio::test]
async fn test_outcomes_follow_catalog_order_for_any_failure_pattern() {
    let catalog: Vec<AttackDefinition> = (0..6)
        .map(|i| AttackDefinition::new(format!("attack-{i}"), "noise", i as f64 / 6.0))
        .collect();

    for mask in 0u32..(1 << catalog.len()) {
        let mut service = MockWatermarkService::new().with_catalog(catalog.clone());
        for (i, attack) in catalog.iter().enumerate() {
            if mask & (1 << i) != 0 {
                service = service.with_failing_attack(&attack.name);
            }
        }
        let orchestrator = orchestrator(service).await;
        let run = orchestrator
            .run(test_png(), "photo.png", Settings::default())
            .await;

        assert_eq!(run.status(), &RunStatus::Complete);
        let names: Vec<&str> = run.outcomes().iter().map(|o| o.name.as_str()).collect();
        let expected: Vec<&str> = catalog.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, expected, "mask {mask:#b}");
        assert_eq!(
            run.summary().survived_count,
            catalog.len() - mask.count_ones() as usize
        );
    }
}

#[tokio::test]
async fn test_attack_calls_carry_definition_parameters() {
    let orchestrator = orchestrator(MockWatermarkService::new().with_catalog(three_attacks())).await;
    orchestrator
        .run(test_png(), "photo.png", Settings::new(0.9, false))
        .await;

    let attacks: Vec<MockCall> = orchestrator
        .service()
        .calls()
        .into_iter()
        .filter(|c| matches!(c, MockCall::Attack { .. }))
        .collect();
    assert_eq!(
        attacks[1],
        MockCall::Attack {
            name: "crop".into(),
            attack_type: "crop".into(),
            severity: 0.3
        }
    );
}

#[tokio::test]
async fn test_service_confidence_is_kept_not_recomputed() {
    // The service says "not detected" at 0.9: the client must not second-guess it
    let service = MockWatermarkService::new()
        .with_catalog(three_attacks())
        .with_verdict("blur", false, 0.9);
    let orchestrator = orchestrator(service).await;
    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    let blur = &run.outcomes()[2];
    assert!(!blur.detected);
    assert_eq!(blur.confidence, 0.9);
}

// ============================================================================
// Progress reporting
// ============================================================================

/// Records the published status at the moment each call arrives.
struct ProbeService {
    inner: MockWatermarkService,
    state: OnceLock<watch::Receiver<PipelineRun>>,
    observed: Mutex<Vec<Option<String>>>,
}

impl ProbeService {
    fn observe(&self) {
        let progress = self
            .state
            .get()
            .and_then(|rx| rx.borrow().status().progress());
        self.observed.lock().unwrap().push(progress);
    }
}

#[async_trait]
impl WatermarkService for ProbeService {
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        self.inner.list_attacks().await
    }

    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        self.observe();
        self.inner.stamp(image, settings).await
    }

    async fn attack(&self, image: &ImagePayload, attack: &AttackDefinition) -> Result<AttackVerdict> {
        self.observe();
        self.inner.attack(image, attack).await
    }

    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport> {
        self.inner.detect(image).await
    }

    async fn health(&self) -> Result<ServiceHealth> {
        self.inner.health().await
    }
}

#[tokio::test]
async fn test_progress_names_the_outstanding_call() {
    let probe = Arc::new(ProbeService {
        inner: MockWatermarkService::new(),
        state: OnceLock::new(),
        observed: Mutex::new(Vec::new()),
    });
    let orchestrator = PipelineOrchestrator::new(probe.clone(), AttackCatalog::new(three_attacks()));
    probe.state.set(orchestrator.subscribe()).unwrap();

    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;
    assert_eq!(run.status(), &RunStatus::Complete);

    let observed = probe.observed.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![
            Some("Stamping image...".to_string()),
            Some("Running: jpeg...".to_string()),
            Some("Running: crop...".to_string()),
            Some("Running: blur...".to_string()),
        ]
    );
}

// ============================================================================
// Supersession
// ============================================================================

/// Blocks the first attack call (or the stamp call, with `gate_stamp`) until
/// released.
struct GatedService {
    inner: MockWatermarkService,
    armed: AtomicBool,
    gate_stamp: bool,
    entered: Notify,
    release: Notify,
}

impl GatedService {
    fn new(catalog: Vec<AttackDefinition>, armed: bool, gate_stamp: bool) -> Self {
        Self {
            inner: MockWatermarkService::new().with_catalog(catalog),
            armed: AtomicBool::new(armed),
            gate_stamp,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    async fn gate(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl WatermarkService for GatedService {
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        self.inner.list_attacks().await
    }

    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        if self.gate_stamp {
            self.gate().await;
        }
        self.inner.stamp(image, settings).await
    }

    async fn attack(&self, image: &ImagePayload, attack: &AttackDefinition) -> Result<AttackVerdict> {
        if !self.gate_stamp {
            self.gate().await;
        }
        self.inner.attack(image, attack).await
    }

    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport> {
        self.inner.detect(image).await
    }

    async fn health(&self) -> Result<ServiceHealth> {
        self.inner.health().await
    }
}

#[tokio::test]
async fn test_second_run_supersedes_in_flight_run() {
    let service = GatedService::new(three_attacks(), true, false);
    let orchestrator = Arc::new(PipelineOrchestrator::connect(service).await);

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .run(test_png(), "first.png", Settings::new(0.2, false))
                .await
        })
    };

    // Wait until the first run is blocked inside its first attack
    orchestrator.service().entered.notified().await;
    let in_flight = orchestrator.snapshot();
    assert_eq!(
        in_flight.status(),
        &RunStatus::Attacking {
            current: "jpeg".into()
        }
    );

    let second = orchestrator
        .run(test_png(), "second.png", Settings::new(0.9, true))
        .await;
    orchestrator.service().release.notify_one();
    let first = first.await.unwrap();

    assert_eq!(first.status(), &RunStatus::Superseded);
    assert!(first.outcomes().is_empty());
    assert_eq!(second.status(), &RunStatus::Complete);

    let published = orchestrator.snapshot();
    assert_eq!(published.run_id(), second.run_id());
    assert_eq!(published.status(), &RunStatus::Complete);
    assert_eq!(published.outcomes().len(), 3);
    assert_eq!(published.settings(), &Settings::new(0.9, true));
    assert_eq!(
        published.source_image().map(|img| img.file_name()),
        Some("second.png")
    );
}

#[tokio::test]
async fn test_run_replaced_while_stamping_never_publishes() {
    let service = GatedService::new(three_attacks(), true, true);
    let orchestrator = Arc::new(PipelineOrchestrator::connect(service).await);

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .run(test_png(), "first.png", Settings::default())
                .await
        })
    };

    // Wait until the first run is blocked inside its stamp call
    orchestrator.service().entered.notified().await;
    assert_eq!(orchestrator.snapshot().status(), &RunStatus::Stamping);

    // The replacement upload is rejected before any network call
    let second = orchestrator
        .run(b"not an image".to_vec(), "notes.txt", Settings::default())
        .await;
    orchestrator.service().release.notify_one();
    let first = first.await.unwrap();

    assert_eq!(first.status(), &RunStatus::Superseded);
    assert!(first.stamped_image().is_none());
    assert!(first.outcomes().is_empty());
    assert!(matches!(
        second.status(),
        RunStatus::Failed(FailureReason::InvalidInput(_))
    ));

    let published = orchestrator.snapshot();
    assert_eq!(published.run_id(), second.run_id());
    assert!(matches!(
        published.status(),
        RunStatus::Failed(FailureReason::InvalidInput(_))
    ));
    assert!(published.stamped_image().is_none());
    assert!(published.outcomes().is_empty());
    assert_eq!(orchestrator.service().inner.attack_calls(), 0);
}

#[tokio::test]
async fn test_new_upload_clears_published_results_immediately() {
    let service = GatedService::new(three_attacks(), false, false);
    let orchestrator = Arc::new(PipelineOrchestrator::connect(service).await);

    orchestrator
        .run(test_png(), "first.png", Settings::default())
        .await;
    assert_eq!(orchestrator.snapshot().outcomes().len(), 3);

    // Arm the gate so the second run parks in its first attack
    orchestrator.service().armed.store(true, Ordering::SeqCst);
    let second = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .run(test_png(), "second.png", Settings::default())
                .await
        })
    };
    orchestrator.service().entered.notified().await;

    let mid_run = orchestrator.snapshot();
    assert!(mid_run.outcomes().is_empty());
    assert_eq!(
        mid_run.source_image().map(|img| img.file_name()),
        Some("second.png")
    );

    orchestrator.service().release.notify_one();
    let second = second.await.unwrap();
    assert_eq!(second.outcomes().len(), 3);
}

// ============================================================================
// Timeouts
// ============================================================================

/// Hangs on the attack named `slow` and, optionally, on stamping.
struct SlowService {
    inner: MockWatermarkService,
    slow_stamp: bool,
}

#[async_trait]
impl WatermarkService for SlowService {
    async fn list_attacks(&self) -> Result<Vec<AttackDefinition>> {
        self.inner.list_attacks().await
    }

    async fn stamp(&self, image: &ImagePayload, settings: &Settings) -> Result<StampedImage> {
        if self.slow_stamp {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        self.inner.stamp(image, settings).await
    }

    async fn attack(&self, image: &ImagePayload, attack: &AttackDefinition) -> Result<AttackVerdict> {
        if attack.name == "slow" {
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        self.inner.attack(image, attack).await
    }

    async fn detect(&self, image: &ImagePayload) -> Result<DetectionReport> {
        self.inner.detect(image).await
    }

    async fn health(&self) -> Result<ServiceHealth> {
        self.inner.health().await
    }
}

fn short_timeout() -> OrchestratorConfig {
    OrchestratorConfig {
        call_timeout: Duration::from_secs(5),
    }
}

#[tokio::test(start_paused = true)]
async fn test_attack_timeout_is_isolated() {
    let service = SlowService {
        inner: MockWatermarkService::new(),
        slow_stamp: false,
    };
    let catalog = AttackCatalog::new(vec![
        AttackDefinition::new("fast", "jpeg", 0.5),
        AttackDefinition::new("slow", "rotate", 0.67),
        AttackDefinition::new("after", "blur", 0.33),
    ]);
    let orchestrator = PipelineOrchestrator::new(service, catalog).with_config(short_timeout());

    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    assert_eq!(run.status(), &RunStatus::Complete);
    assert_eq!(run.outcomes().len(), 3);
    assert!(run.outcomes()[0].detected);
    assert!(!run.outcomes()[1].detected);
    assert_eq!(run.outcomes()[1].confidence, 0.0);
    assert!(run.outcomes()[2].detected);
}

#[tokio::test(start_paused = true)]
async fn test_stamp_timeout_fails_run() {
    let service = SlowService {
        inner: MockWatermarkService::new(),
        slow_stamp: true,
    };
    let orchestrator = PipelineOrchestrator::new(service, AttackCatalog::new(three_attacks()))
        .with_config(short_timeout());

    let run = orchestrator
        .run(test_png(), "photo.png", Settings::default())
        .await;

    match run.status() {
        RunStatus::Failed(FailureReason::StampError(msg)) => {
            assert!(msg.contains("timed out"), "unexpected message: {msg}");
        }
        other => panic!("expected stamp failure, got {other:?}"),
    }
    assert!(run.outcomes().is_empty());
}
