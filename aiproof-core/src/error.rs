use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatermarkError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Stamp failed: {0}")]
    StampError(String),

    #[error("Attack '{name}' failed: {reason}")]
    AttackError { name: String, reason: String },

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Service returned status {status}: {message}")]
    ServiceError { status: u16, message: String },

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl WatermarkError {
    /// True for failures of the transport rather than of the request itself.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::TransportError(_) | Self::Timeout(_) => true,
            #[cfg(feature = "network")]
            Self::HttpError(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, WatermarkError>;
