// SPDX-License-Identifier: GPL-3.0-only

//! Simulated camera for demos and tests
//!
//! Renders bracket frames from a single source image:
//!
//! ```text
//! Source frame
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ Optical zoom     │  ← center crop + cubic resample by the lens zoom
//! └──────────────────┘
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ Exposure         │  ← value · 2^EV, clipped to [0, 1]
//! └──────────────────┘
//!        │
//!        ▼
//!   FramePayload (decoded, or PNG bytes)
//! ```
//!
//! Failures can be injected per EV offset to exercise the fallback paths.

use crate::backends::camera::{
    CameraDescriptor, CameraLens, CameraProvider, CameraResult,
};
use crate::errors::CameraError;
use crate::media::{Frame, FramePayload};
use crate::pipelines::photo::zoom::crop::crop_and_resize;
use image::ImageFormat;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How an injected fault shows up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// The capture call returns an error
    CaptureError,
    /// The capture returns bytes that do not decode
    CorruptPayload,
}

#[derive(Debug, Default)]
struct VirtualState {
    lens: Option<CameraLens>,
    zoom: f32,
    exposure_locked: bool,
    auto_exposure_resets: usize,
    captured_evs: Vec<f32>,
    captured_at: Vec<Instant>,
}

/// Camera provider backed by a still image
#[derive(Debug)]
pub struct VirtualCamera {
    source: Arc<Frame>,
    cameras: Vec<CameraDescriptor>,
    faults: Vec<(f32, InjectedFault)>,
    encode_png: bool,
    capture_latency: Duration,
    state: Mutex<VirtualState>,
}

impl VirtualCamera {
    /// Single wide camera with a 12 MP sensor
    pub fn new(source: Frame) -> Self {
        Self {
            source: Arc::new(source),
            cameras: vec![CameraDescriptor {
                name: "Virtual wide".to_string(),
                lens: CameraLens::Wide,
                optical_zoom: 1.0,
                sensor_megapixels: 12.0,
            }],
            faults: Vec::new(),
            encode_png: false,
            capture_latency: Duration::ZERO,
            state: Mutex::new(VirtualState {
                zoom: 1.0,
                ..Default::default()
            }),
        }
    }

    /// Wide (48 MP), 3x telephoto and 10x periscope
    pub fn triple_camera(source: Frame) -> Self {
        Self::new(source).with_cameras(vec![
            CameraDescriptor {
                name: "Virtual wide".to_string(),
                lens: CameraLens::Wide,
                optical_zoom: 1.0,
                sensor_megapixels: 48.0,
            },
            CameraDescriptor {
                name: "Virtual telephoto".to_string(),
                lens: CameraLens::Telephoto,
                optical_zoom: 3.0,
                sensor_megapixels: 12.0,
            },
            CameraDescriptor {
                name: "Virtual periscope".to_string(),
                lens: CameraLens::Periscope,
                optical_zoom: 10.0,
                sensor_megapixels: 12.0,
            },
        ])
    }

    pub fn with_cameras(mut self, cameras: Vec<CameraDescriptor>) -> Self {
        self.cameras = cameras;
        self
    }

    /// Inject a fault for captures at this EV offset
    pub fn with_fault(mut self, ev_offset: f32, fault: InjectedFault) -> Self {
        self.faults.push((ev_offset, fault));
        self
    }

    /// Deliver PNG-encoded payloads instead of decoded frames
    pub fn with_png_output(mut self, enabled: bool) -> Self {
        self.encode_png = enabled;
        self
    }

    /// Block each capture for this long
    pub fn with_capture_latency(mut self, latency: Duration) -> Self {
        self.capture_latency = latency;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, VirtualState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// EV offsets captured so far, in call order
    pub fn captured_evs(&self) -> Vec<f32> {
        self.state().captured_evs.clone()
    }

    /// Time between consecutive capture calls
    pub fn capture_intervals(&self) -> Vec<Duration> {
        self.state()
            .captured_at
            .windows(2)
            .map(|w| w[1].duration_since(w[0]))
            .collect()
    }

    pub fn exposure_locked(&self) -> bool {
        self.state().exposure_locked
    }

    pub fn auto_exposure_resets(&self) -> usize {
        self.state().auto_exposure_resets
    }

    pub fn selected_lens(&self) -> Option<CameraLens> {
        self.state().lens
    }

    pub fn zoom(&self) -> f32 {
        self.state().zoom
    }

    fn fault_at(&self, ev_offset: f32) -> Option<InjectedFault> {
        self.faults
            .iter()
            .find(|(ev, _)| (ev - ev_offset).abs() < 1e-3)
            .map(|(_, fault)| *fault)
    }

    fn render(&self, zoom: f32, ev_offset: f32) -> CameraResult<Frame> {
        let framed = crop_and_resize(&self.source, zoom)
            .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
        let gain = 2f32.powf(ev_offset);
        Ok(framed.map_pixels(|px| px.map(|v| (v * gain).clamp(0.0, 1.0))))
    }

    fn encode(frame: &Frame) -> CameraResult<Vec<u8>> {
        let mut bytes = Cursor::new(Vec::new());
        frame
            .to_rgb8()
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| CameraError::CaptureFailed(format!("PNG encode failed: {}", e)))?;
        Ok(bytes.into_inner())
    }
}

impl CameraProvider for VirtualCamera {
    fn list_cameras(&self) -> CameraResult<Vec<CameraDescriptor>> {
        Ok(self.cameras.clone())
    }

    fn select_lens(&self, lens: CameraLens) -> CameraResult<()> {
        if !self.cameras.iter().any(|c| c.lens == lens) {
            return Err(CameraError::LensUnavailable(lens.to_string()));
        }
        debug!(%lens, "Virtual camera lens selected");
        self.state().lens = Some(lens);
        Ok(())
    }

    fn set_zoom(&self, optical: f32) -> CameraResult<()> {
        if !optical.is_finite() || optical < 1.0 {
            return Err(CameraError::ControlFailed(format!(
                "unsupported zoom {}",
                optical
            )));
        }
        self.state().zoom = optical;
        Ok(())
    }

    fn capture(&self, ev_offset: f32) -> CameraResult<FramePayload> {
        if !self.capture_latency.is_zero() {
            std::thread::sleep(self.capture_latency);
        }

        let zoom = {
            let mut state = self.state();
            state.captured_evs.push(ev_offset);
            state.captured_at.push(Instant::now());
            state.zoom
        };

        match self.fault_at(ev_offset) {
            Some(InjectedFault::CaptureError) => {
                warn!(ev = ev_offset, "Injected capture failure");
                return Err(CameraError::CaptureFailed(format!(
                    "injected failure at {} EV",
                    ev_offset
                )));
            }
            Some(InjectedFault::CorruptPayload) => {
                warn!(ev = ev_offset, "Injected corrupt payload");
                return Ok(FramePayload::from(vec![0xde, 0xad, 0xbe, 0xef]));
            }
            None => {}
        }

        let frame = self.render(zoom, ev_offset)?;
        if self.encode_png {
            Ok(FramePayload::from(Self::encode(&frame)?))
        } else {
            Ok(FramePayload::Decoded(frame))
        }
    }

    fn lock_exposure(&self) -> CameraResult<()> {
        self.state().exposure_locked = true;
        Ok(())
    }

    fn reset_auto_exposure(&self) -> CameraResult<()> {
        let mut state = self.state();
        state.exposure_locked = false;
        state.auto_exposure_resets += 1;
        Ok(())
    }
}
