// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the enhancement pipeline
//!
//! Only conditions a caller has to act on are errors. Recoverable conditions
//! (one bracket frame failing to decode, the optional super-resolution service
//! failing) are absorbed by the pipeline and reported through result metadata.

use std::fmt;

/// Result type alias using EnhanceError
pub type PipelineResult<T> = Result<T, EnhanceError>;

/// Main error type for the enhancement pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum EnhanceError {
    /// A frame buffer could not be parsed as an image
    DecodeFailure(String),
    /// A parameter was rejected before any hardware interaction
    InvalidParameter(String),
    /// The external enhancement service failed or timed out
    ExternalService(String),
    /// The user cancelled the capture
    CaptureAborted,
    /// Camera hardware errors
    Camera(CameraError),
    /// A processing stage failed (worker panic, buffer mismatch)
    Processing(String),
    /// Configuration errors
    Config(String),
}

/// Camera hardware errors reported by a provider
#[derive(Debug, Clone, PartialEq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Requested lens is not present on this device
    LensUnavailable(String),
    /// Frame capture failed
    CaptureFailed(String),
    /// Exposure or zoom control failed
    ControlFailed(String),
    /// Camera is busy or in use
    Busy,
    /// Camera disconnected during operation
    Disconnected,
}

impl EnhanceError {
    /// Shorthand for an invalid parameter error
    pub fn invalid(msg: impl Into<String>) -> Self {
        EnhanceError::InvalidParameter(msg.into())
    }

    /// Whether this error is a user cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EnhanceError::CaptureAborted)
    }

    /// Whether the fallback path may be attempted after this error
    ///
    /// Parameter errors and cancellations are final for the call.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            EnhanceError::InvalidParameter(_) | EnhanceError::CaptureAborted
        )
    }
}

impl fmt::Display for EnhanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnhanceError::DecodeFailure(msg) => write!(f, "Frame decode failed: {}", msg),
            EnhanceError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            EnhanceError::ExternalService(msg) => {
                write!(f, "External enhancement failed: {}", msg)
            }
            EnhanceError::CaptureAborted => write!(f, "Capture aborted"),
            EnhanceError::Camera(e) => write!(f, "Camera error: {}", e),
            EnhanceError::Processing(msg) => write!(f, "Processing error: {}", msg),
            EnhanceError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No camera devices found"),
            CameraError::LensUnavailable(lens) => write!(f, "Lens not available: {}", lens),
            CameraError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            CameraError::ControlFailed(msg) => write!(f, "Control failed: {}", msg),
            CameraError::Busy => write!(f, "Camera is busy"),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
        }
    }
}

impl std::error::Error for EnhanceError {}
impl std::error::Error for CameraError {}

impl From<CameraError> for EnhanceError {
    fn from(err: CameraError) -> Self {
        EnhanceError::Camera(err)
    }
}

impl From<image::ImageError> for EnhanceError {
    fn from(err: image::ImageError) -> Self {
        EnhanceError::DecodeFailure(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EnhanceError {
    fn from(err: tokio::task::JoinError) -> Self {
        EnhanceError::Processing(format!("Processing task error: {}", err))
    }
}

impl From<serde_json::Error> for EnhanceError {
    fn from(err: serde_json::Error) -> Self {
        EnhanceError::Config(err.to_string())
    }
}

impl From<std::io::Error> for EnhanceError {
    fn from(err: std::io::Error) -> Self {
        EnhanceError::Config(err.to_string())
    }
}
