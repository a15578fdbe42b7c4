//! Stamp-then-attack pipeline orchestrator.
//!
//! One run issues one network call at a time: stamp, then every catalog
//! attack in order. Per-attack failures become negative outcomes; only a
//! failed stamp (or invalid input) fails the run.
//!
//! State is published through a `tokio::sync::watch` channel. Every commit
//! is checked against the published run id under the channel lock, so a run
//! that has been replaced by a newer one can never write into it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::state::{FailureReason, PipelineRun, RunId, RunStatus};
use crate::catalog::AttackCatalog;
use crate::error::{Result, WatermarkError};
use crate::payload::ImagePayload;
use crate::service::WatermarkService;
use crate::types::{AttackOutcome, Settings};

/// Default bound on a single service call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Orchestrator tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound on each stamp or attack call. Expiry counts as a
    /// transport failure.
    pub call_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}

/// Drives pipeline runs against a [`WatermarkService`].
///
/// ## Example
///
/// ```no_run
/// use aiproof_core::{PipelineOrchestrator, RemoteWatermarkService, Settings};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let service = RemoteWatermarkService::new()?;
/// let orchestrator = PipelineOrchestrator::connect(service).await;
///
/// let image = std::fs::read("photo.png")?;
/// let run = orchestrator.run(image, "photo.png", Settings::default()).await;
/// println!("robustness: {}%", run.summary().robustness);
/// # Ok(())
/// # }
/// ```
pub struct PipelineOrchestrator<S> {
    service: S,
    catalog: AttackCatalog,
    config: OrchestratorConfig,
    state: watch::Sender<PipelineRun>,
    next_id: AtomicU64,
}

impl<S: WatermarkService> PipelineOrchestrator<S> {
    pub fn new(service: S, catalog: AttackCatalog) -> Self {
        let (state, _) = watch::channel(PipelineRun::idle());
        Self {
            service,
            catalog,
            config: OrchestratorConfig::default(),
            state,
            next_id: AtomicU64::new(0),
        }
    }

    /// Load the attack catalog from `service` once, then build the orchestrator.
    pub async fn connect(service: S) -> Self {
        let catalog = AttackCatalog::load(&service).await;
        Self::new(service, catalog)
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn catalog(&self) -> &AttackCatalog {
        &self.catalog
    }

    /// Observe the current run. The receiver sees every committed change.
    pub fn subscribe(&self) -> watch::Receiver<PipelineRun> {
        self.state.subscribe()
    }

    /// Copy of the current run.
    pub fn snapshot(&self) -> PipelineRun {
        self.state.borrow().clone()
    }

    /// Run the full pipeline for one image.
    ///
    /// Replaces whatever run was current. Returns this run's final state,
    /// which is [`RunStatus::Superseded`] if another run replaced it first.
    #[instrument(level = "info", skip(self, image), fields(
        file = %file_name,
        bytes = image.len(),
        strength = settings.strength(),
        adaptive = settings.adaptive_masking(),
        attacks = self.catalog.len()
    ))]
    pub async fn run(&self, image: Vec<u8>, file_name: &str, settings: Settings) -> PipelineRun {
        let start = Instant::now();
        let mut run = self.reset(settings);
        let run_id = run.run_id;
        debug!(run = %run_id, "Started pipeline run");

        let source = match ImagePayload::from_bytes(image, file_name) {
            Ok(source) => Arc::new(source),
            Err(e) => {
                warn!(run = %run_id, error = %e, "Rejected upload");
                let reason = FailureReason::InvalidInput(invalid_input_message(e));
                self.advance(&mut run, |r| r.fail(reason.clone()));
                return run;
            }
        };

        if !self.advance(&mut run, |r| r.begin_stamping(source.clone())) {
            return mark_superseded(run);
        }

        let stamped = match self.call(run_id, self.service.stamp(&source, &settings)).await {
            None => return mark_superseded(run),
            Some(Ok(stamped)) => Arc::new(stamped),
            Some(Err(e)) => {
                let err = WatermarkError::StampError(e.to_string());
                error!(run = %run_id, error = %err, "Pipeline failed");
                let reason = FailureReason::StampError(e.to_string());
                self.advance(&mut run, |r| r.fail(reason.clone()));
                return run;
            }
        };

        if !self.advance(&mut run, |r| r.stamped(stamped.clone())) {
            return mark_superseded(run);
        }

        for attack in self.catalog.attacks() {
            if !self.advance(&mut run, |r| r.begin_attack(&attack.name)) {
                return mark_superseded(run);
            }

            let upload = stamped.to_upload();
            let result = match self.call(run_id, self.service.attack(&upload, attack)).await {
                None => return mark_superseded(run),
                Some(result) => result,
            };

            if let Err(e) = &result {
                let err = WatermarkError::AttackError {
                    name: attack.name.clone(),
                    reason: e.to_string(),
                };
                warn!(run = %run_id, error = %err, "Attack failed, recording as not detected");
            }

            let outcome = AttackOutcome::from_result(attack, &result);
            debug!(
                run = %run_id,
                attack = %outcome.name,
                detected = outcome.detected,
                confidence = outcome.confidence,
                "Recorded outcome"
            );
            if !self.advance(&mut run, |r| r.record(outcome.clone())) {
                return mark_superseded(run);
            }
        }

        if !self.advance(&mut run, |r| r.complete()) {
            return mark_superseded(run);
        }

        let summary = run.summary();
        info!(
            run = %run_id,
            robustness = summary.robustness,
            survived = summary.survived_count,
            total = summary.total,
            total_latency_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );
        run
    }

    /// Atomically replace the published run with a fresh one.
    fn reset(&self, settings: Settings) -> PipelineRun {
        let catalog_len = self.catalog.len();
        let mut fresh = PipelineRun::idle();
        self.state.send_modify(|current| {
            let run_id = RunId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            fresh = PipelineRun::new(run_id, settings, catalog_len);
            *current = fresh.clone();
        });
        fresh
    }

    /// Apply `change` to the local run and, if it is still current, to the
    /// published one. Returns `false` once the run has been superseded.
    fn advance<F>(&self, run: &mut PipelineRun, change: F) -> bool
    where
        F: Fn(&mut PipelineRun),
    {
        change(run);
        let run_id = run.run_id;
        self.state.send_if_modified(|current| {
            if current.run_id != run_id {
                return false;
            }
            change(current);
            true
        })
    }

    /// Await a service call bounded by the call timeout.
    ///
    /// Returns `None` as soon as the run is superseded; the in-flight call is
    /// dropped.
    async fn call<T, F>(&self, run_id: RunId, fut: F) -> Option<Result<T>>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.call_timeout;
        tokio::select! {
            biased;
            _ = self.superseded(run_id) => None,
            result = tokio::time::timeout(timeout, fut) => Some(match result {
                Ok(inner) => inner,
                Err(_) => Err(WatermarkError::Timeout(timeout)),
            }),
        }
    }

    /// Resolves once the published run is no longer `run_id`.
    async fn superseded(&self, run_id: RunId) {
        let mut rx = self.state.subscribe();
        if rx.wait_for(|current| current.run_id != run_id).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn mark_superseded(mut run: PipelineRun) -> PipelineRun {
    info!(run = %run.run_id, "Run superseded by a newer run");
    run.status = RunStatus::Superseded;
    run
}

fn invalid_input_message(err: WatermarkError) -> String {
    match err {
        WatermarkError::InvalidInput(msg) => msg,
        other => other.to_string(),
    }
}
