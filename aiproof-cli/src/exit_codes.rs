//! Exit codes following sysexits.h conventions.
//!
//! Scripts and CI jobs can tell a weak watermark apart from a missing file
//! or an unreachable service.

use aiproof_core::WatermarkError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Robustness score below `--min-robustness`.
/// Maps to EX_DATAERR from sysexits.h.
pub const ROBUSTNESS_BELOW_THRESHOLD: i32 = 65;

/// Cannot open input file, or it is not a supported image.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Watermark service unavailable or failing.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// I/O error (cannot write output file).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Message fragment used when a run scores below the threshold.
pub const BELOW_THRESHOLD_MARKER: &str = "below the required";

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Typed service errors first, then the context messages we attach ourselves
        let code = if let Some(err) = err.chain().find_map(|e| e.downcast_ref::<WatermarkError>()) {
            classify(err)
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else if message.contains("unhealthy") {
            NETWORK_ERROR
        } else if message.contains(BELOW_THRESHOLD_MARKER) {
            ROBUSTNESS_BELOW_THRESHOLD
        } else if message.contains("Invalid argument") {
            USAGE_ERROR
        } else if message.contains("Failed to write") || message.contains("serialize") {
            IO_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn classify(err: &WatermarkError) -> i32 {
    match err {
        WatermarkError::InvalidInput(_) | WatermarkError::ImageError(_) => INPUT_ERROR,
        WatermarkError::StampError(_)
        | WatermarkError::AttackError { .. }
        | WatermarkError::TransportError(_)
        | WatermarkError::ServiceError { .. }
        | WatermarkError::Timeout(_)
        | WatermarkError::DecodeError(_)
        | WatermarkError::HttpError(_) => NETWORK_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{anyhow, Context};

    use super::*;

    #[test]
    fn test_missing_file_is_input_error() {
        let err = std::fs::read("/definitely/not/here.png")
            .context("Failed to read image: /definitely/not/here.png")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_typed_errors_classified() {
        let err = anyhow::Error::new(WatermarkError::InvalidInput("not an image".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);

        let err = anyhow::Error::new(WatermarkError::Timeout(Duration::from_secs(30)))
            .context("Failed to fetch attack catalog");
        assert_eq!(ExitCode::from_anyhow(&err).code, NETWORK_ERROR);

        let err = anyhow::Error::new(WatermarkError::StampError("status 500".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, NETWORK_ERROR);
    }

    #[test]
    fn test_threshold_and_write_errors() {
        let err = anyhow!("Robustness 40.0% is {BELOW_THRESHOLD_MARKER} 80.0%");
        assert_eq!(ExitCode::from_anyhow(&err).code, ROBUSTNESS_BELOW_THRESHOLD);

        let err = anyhow!("Failed to write stamped image: out.png");
        assert_eq!(ExitCode::from_anyhow(&err).code, IO_ERROR);

        assert_eq!(ExitCode::from_anyhow(&anyhow!("boom")).code, GENERAL_ERROR);
    }

    #[test]
    fn test_message_keeps_context_chain() {
        let err = anyhow::Error::new(WatermarkError::TransportError("connection refused".into()))
            .context("Failed to reach watermark service");
        let exit = ExitCode::from_anyhow(&err);
        let message = exit.message.unwrap();
        assert!(message.contains("Failed to reach watermark service"));
        assert!(message.contains("connection refused"));
    }
}
