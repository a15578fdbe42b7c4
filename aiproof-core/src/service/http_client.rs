//! HTTP plumbing for the watermark service: JSON GETs with retry and
//! backoff, single-shot multipart image uploads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use backoff::{future::retry_notify, ExponentialBackoff};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, WatermarkError};
use crate::payload::ImagePayload;

/// Multipart field name the service reads uploads from.
pub const UPLOAD_FIELD: &str = "file";

/// Longest error body kept in a [`WatermarkError::ServiceError`].
const MAX_ERROR_BODY: usize = 200;

/// Configuration for a [`ServiceHttpClient`].
#[derive(Debug, Clone)]
pub struct ServiceHttpConfig {
    /// Base URL, e.g. `http://localhost:8000`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt for transient GET failures.
    pub max_retries: u32,
    /// Initial retry interval.
    pub initial_interval: Duration,
    /// Maximum retry interval.
    pub max_interval: Duration,
}

/// Shape of FastAPI-style error bodies (`{"detail": "..."}`).
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Watermark service HTTP client.
pub struct ServiceHttpClient {
    client: Client,
    config: ServiceHttpConfig,
}

impl ServiceHttpClient {
    pub fn new(config: ServiceHttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                WatermarkError::TransportError(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ServiceHttpConfig {
        &self.config
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// GET a JSON document, retrying transient failures with backoff.
    pub async fn get_json<R>(&self, path: &str) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let attempts = AtomicU32::new(0);

        retry_notify(
            self.build_backoff(),
            || {
                let url = &url;
                let attempts = &attempts;
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                    self.get_once::<R>(url).await.map_err(|err| match err {
                        backoff::Error::Transient { err, .. }
                            if attempt >= self.config.max_retries =>
                        {
                            backoff::Error::permanent(err)
                        }
                        other => other,
                    })
                }
            },
            |err: WatermarkError, duration: Duration| {
                warn!(
                    error = %err,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await
    }

    async fn get_once<R>(&self, url: &str) -> std::result::Result<R, backoff::Error<WatermarkError>>
    where
        R: DeserializeOwned,
    {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            if is_transient_error(&e) {
                warn!(error = %e, latency_ms, "Transient error, will retry");
                backoff::Error::transient(self.transport_error(e))
            } else {
                warn!(error = %e, latency_ms, "Permanent error, aborting");
                backoff::Error::permanent(self.transport_error(e))
            }
        })?;

        let status = response.status();
        debug!(status = %status, "Received HTTP response");

        if !status.is_success() {
            let latency_ms = start.elapsed().as_millis() as u64;
            let err = service_error(response).await;
            return if is_transient_status(status) {
                warn!(status = %status, latency_ms, "Transient HTTP status, will retry");
                Err(backoff::Error::transient(err))
            } else {
                warn!(status = %status, latency_ms, "Permanent HTTP error");
                Err(backoff::Error::permanent(err))
            };
        }

        let parsed = decode_json(response).await.map_err(backoff::Error::permanent)?;

        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed successfully"
        );
        Ok(parsed)
    }

    /// POST an image as multipart form data and decode the JSON reply.
    ///
    /// Uploads are never retried; the caller decides what a failure means.
    pub async fn post_image<R>(
        &self,
        path: &str,
        query: &[(&str, String)],
        image: &ImagePayload,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let url = self.url(path);
        let start = Instant::now();

        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name().to_string())
            .mime_str(image.mime_type())?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&url)
            .query(query)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(
                    error = %e,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Upload failed"
                );
                self.transport_error(e)
            })?;

        let status = response.status();
        debug!(status = %status, bytes = image.len(), "Received HTTP response");

        if !status.is_success() {
            return Err(service_error(response).await);
        }

        let parsed = decode_json(response).await?;
        debug!(
            latency_ms = start.elapsed().as_millis() as u64,
            "Upload completed successfully"
        );
        Ok(parsed)
    }

    fn transport_error(&self, error: reqwest::Error) -> WatermarkError {
        if error.is_timeout() {
            WatermarkError::Timeout(self.config.timeout)
        } else {
            WatermarkError::HttpError(error)
        }
    }

    fn build_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.timeout * (self.config.max_retries + 1)),
            ..Default::default()
        }
    }
}

async fn decode_json<R: DeserializeOwned>(response: Response) -> Result<R> {
    response.json().await.map_err(|e| {
        warn!(error = %e, "Failed to parse JSON response");
        WatermarkError::DecodeError(format!("Failed to parse service response: {e}"))
    })
}

/// Turn a non-success response into a [`WatermarkError::ServiceError`].
async fn service_error(response: Response) -> WatermarkError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    WatermarkError::ServiceError {
        status,
        message: error_message(&body),
    }
}

/// Pull a readable message out of an error body.
pub fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.detail;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no response body".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}

/// Check if a reqwest error is transient and should be retried.
pub fn is_transient_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Check if an HTTP status code indicates a transient error.
pub fn is_transient_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::BAD_GATEWAY
    )
}
