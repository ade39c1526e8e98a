// SPDX-License-Identifier: MPL-2.0

//! Camera hardware abstraction
//!
//! The enhancement pipeline never talks to hardware directly. Capture goes
//! through a [`CameraProvider`], which a platform binding (or the
//! [`virtual_camera`](crate::backends::virtual_camera) simulator) implements.
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Serialized capture, bracket timing
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraProvider Trait│  ← Lens selection, zoom, exposure, capture
//! └──────────┬──────────┘
//!            │
//!            ▼
//!    ┌────────────────┐
//!    │ Platform / Sim │
//!    └────────────────┘
//! ```

use crate::errors::CameraError;
use crate::media::FramePayload;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Result type for provider calls
pub type CameraResult<T> = Result<T, CameraError>;

/// Physical lens of a multi-camera module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraLens {
    Wide,
    Telephoto,
    Periscope,
}

impl std::fmt::Display for CameraLens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraLens::Wide => write!(f, "wide"),
            CameraLens::Telephoto => write!(f, "telephoto"),
            CameraLens::Periscope => write!(f, "periscope"),
        }
    }
}

/// One camera reported by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Human-readable name
    pub name: String,
    pub lens: CameraLens,
    /// Optical magnification relative to the wide lens
    pub optical_zoom: f32,
    pub sensor_megapixels: f32,
}

/// Hardware access needed by the capture pipeline
///
/// Calls may block; the capture session runs frame captures on the blocking
/// pool.
pub trait CameraProvider: Send + Sync {
    /// Enumerate the cameras of the device
    fn list_cameras(&self) -> CameraResult<Vec<CameraDescriptor>>;

    /// Switch capture to a lens
    fn select_lens(&self, lens: CameraLens) -> CameraResult<()>;

    /// Set the optical zoom of the selected lens
    fn set_zoom(&self, optical: f32) -> CameraResult<()>;

    /// Capture one frame at an exposure offset (EV) from the locked exposure
    fn capture(&self, ev_offset: f32) -> CameraResult<FramePayload>;

    /// Freeze auto exposure so bracket offsets share a base
    fn lock_exposure(&self) -> CameraResult<()>;

    /// Return to continuous auto exposure
    fn reset_auto_exposure(&self) -> CameraResult<()>;
}

/// Zoom hardware of a device, detected once per camera set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomCapabilities {
    pub has_telephoto: bool,
    pub has_periscope: bool,
    pub max_optical_zoom: f32,
    /// Resolution of the main (wide) sensor
    pub sensor_resolution_megapixels: f32,
}

impl Default for ZoomCapabilities {
    /// A single wide camera with a 12 MP sensor
    fn default() -> Self {
        Self {
            has_telephoto: false,
            has_periscope: false,
            max_optical_zoom: 1.0,
            sensor_resolution_megapixels: 12.0,
        }
    }
}

impl ZoomCapabilities {
    /// Derive capabilities from a camera list
    pub fn from_cameras(cameras: &[CameraDescriptor]) -> CameraResult<Self> {
        if cameras.is_empty() {
            return Err(CameraError::NoCameraFound);
        }

        let has_lens = |lens| cameras.iter().any(|c| c.lens == lens);
        let max_optical_zoom = cameras
            .iter()
            .map(|c| c.optical_zoom)
            .filter(|z| z.is_finite() && *z > 0.0)
            .fold(1.0f32, f32::max);

        let sensor_resolution_megapixels = cameras
            .iter()
            .find(|c| c.lens == CameraLens::Wide)
            .or_else(|| cameras.first())
            .map(|c| c.sensor_megapixels)
            .unwrap_or(12.0);

        Ok(Self {
            has_telephoto: has_lens(CameraLens::Telephoto),
            has_periscope: has_lens(CameraLens::Periscope),
            max_optical_zoom,
            sensor_resolution_megapixels,
        })
    }

    /// Query a provider for its cameras
    pub fn detect(provider: &dyn CameraProvider) -> CameraResult<Self> {
        let cameras = provider.list_cameras()?;
        let caps = Self::from_cameras(&cameras)?;
        debug!(
            cameras = cameras.len(),
            telephoto = caps.has_telephoto,
            periscope = caps.has_periscope,
            max_optical = caps.max_optical_zoom,
            sensor_mp = caps.sensor_resolution_megapixels,
            "Detected zoom capabilities"
        );
        Ok(caps)
    }
}
