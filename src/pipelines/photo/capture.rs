// SPDX-License-Identifier: MPL-2.0

//! Bracket capture from camera hardware
//!
//! A [`CaptureSession`] owns the device side of a capture:
//!
//! 1. Plan the zoom and move the optics
//! 2. Lock exposure (and meter the scene when adaptive HDR is on)
//! 3. Capture the bracket with a stabilization delay between frames
//! 4. Restore auto exposure, whatever happened
//! 5. Hand the frames to the [`EnhancementPipeline`]
//!
//! Only one capture runs at a time per session.

use super::hdr::{BracketCapture, SceneDynamicRange, bracket_evs};
use super::result::{EnhancementResult, FallbackReason, PipelineStage};
use super::zoom::{ZoomPlan, ZoomPlanner};
use super::EnhancementPipeline;
use crate::backends::camera::{CameraProvider, CameraResult, ZoomCapabilities};
use crate::config::ColorProcessingSettings;
use crate::errors::{CameraError, EnhanceError, PipelineResult};
use crate::media::FramePayload;
use crate::pipelines::cancel::CancelToken;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Frames captured for one shot
struct CapturedBracket {
    captures: Vec<BracketCapture>,
    failed_evs: Vec<f32>,
    last_error: Option<CameraError>,
}

/// Serialized capture against one camera provider
pub struct CaptureSession {
    provider: Arc<dyn CameraProvider>,
    pipeline: EnhancementPipeline,
    capabilities: RwLock<Option<ZoomCapabilities>>,
    capture_lock: Mutex<()>,
}

impl CaptureSession {
    pub fn new(provider: Arc<dyn CameraProvider>, pipeline: EnhancementPipeline) -> Self {
        Self {
            provider,
            pipeline,
            capabilities: RwLock::new(None),
            capture_lock: Mutex::new(()),
        }
    }

    pub fn pipeline(&self) -> &EnhancementPipeline {
        &self.pipeline
    }

    /// Run a provider call on the blocking pool
    async fn hardware<T, F>(&self, call: F) -> PipelineResult<T>
    where
        F: FnOnce(&dyn CameraProvider) -> CameraResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let provider = Arc::clone(&self.provider);
        let result = tokio::task::spawn_blocking(move || call(provider.as_ref())).await?;
        result.map_err(EnhanceError::from)
    }

    /// Zoom capabilities, detected on first use
    pub async fn capabilities(&self) -> PipelineResult<ZoomCapabilities> {
        let cached = *self.capabilities.read().unwrap_or_else(|e| e.into_inner());
        match cached {
            Some(caps) => Ok(caps),
            None => self.refresh_capabilities().await,
        }
    }

    /// Re-detect capabilities, e.g. after switching cameras
    pub async fn refresh_capabilities(&self) -> PipelineResult<ZoomCapabilities> {
        let caps = self.hardware(|p| ZoomCapabilities::detect(p)).await?;
        *self.capabilities.write().unwrap_or_else(|e| e.into_inner()) = Some(caps);
        Ok(caps)
    }

    /// Plan a zoom with the session's configured policy
    pub async fn plan(&self, target_zoom: f32) -> PipelineResult<ZoomPlan> {
        let config = self.pipeline.config();
        let caps = self.capabilities().await?;
        ZoomPlanner::new(config.max_digital_zoom, config.high_res_crop_enabled).plan(
            target_zoom,
            &caps,
            config.optical_zoom_enabled,
        )
    }

    /// Capture and enhance one shot
    pub async fn capture(
        &self,
        target_zoom: f32,
        settings: &ColorProcessingSettings,
        cancel: &CancelToken,
    ) -> PipelineResult<EnhancementResult> {
        // Parameters are checked before touching the hardware
        let settings = settings.sanitized()?;
        self.pipeline.config().validate()?;
        let plan = self.plan(target_zoom).await?;

        let _guard = self.capture_lock.lock().await;
        if let Some(cb) = self.pipeline.stage_callback() {
            cb(PipelineStage::Capturing);
        }

        let lens = plan.lens;
        let optical = plan.optical_factor;
        self.hardware(move |p| p.select_lens(lens)).await?;
        self.hardware(move |p| p.set_zoom(optical)).await?;

        let captured = self.capture_bracket(&settings, cancel).await;
        if let Err(e) = self.hardware(|p| p.reset_auto_exposure()).await {
            warn!(error = %e, "Failed to restore auto exposure");
        }
        let captured = captured?;

        if captured.captures.is_empty() {
            let error = captured.last_error.unwrap_or_else(|| {
                CameraError::CaptureFailed("no bracket frame was captured".to_string())
            });
            return Err(EnhanceError::Camera(error));
        }

        if captured.failed_evs.is_empty() {
            return self
                .pipeline
                .process(captured.captures, &plan, &settings, cancel)
                .await;
        }

        // Missing frames: single-shot on the frame closest to nominal
        warn!(failed = ?captured.failed_evs, "Bracket incomplete, using single shot");
        let nominal = captured
            .captures
            .into_iter()
            .min_by(|a, b| a.ev_offset.abs().total_cmp(&b.ev_offset.abs()));
        let mut result = self
            .pipeline
            .process(nominal.into_iter().collect(), &plan, &settings, cancel)
            .await?;
        result.fallback = Some(FallbackReason::CaptureFailure {
            failed_evs: captured.failed_evs,
        });
        Ok(result)
    }

    async fn capture_bracket(
        &self,
        settings: &ColorProcessingSettings,
        cancel: &CancelToken,
    ) -> PipelineResult<CapturedBracket> {
        let config = self.pipeline.config();
        self.hardware(|p| p.lock_exposure()).await?;

        let count = if settings.hdr_enabled {
            config.bracket_count
        } else {
            1
        };

        // Meter the scene at the locked exposure to size the bracket
        let mut metered: Option<FramePayload> = None;
        let mut range = config.ev_range;
        let mut captured_any = false;
        if settings.adaptive_hdr_enabled && count > 1 {
            captured_any = true;
            match self.hardware(|p| p.capture(0.0)).await {
                Ok(payload) => {
                    if let Ok(frame) = payload.decode() {
                        let scene = SceneDynamicRange::measure(&frame);
                        range = scene.adaptive_ev_range();
                        debug!(
                            clipped = scene.clipped_fraction(),
                            ev_range = range,
                            "Metered scene"
                        );
                    }
                    metered = Some(payload);
                }
                Err(EnhanceError::Camera(e)) => {
                    warn!(error = %e, "Metering frame failed, using configured EV range");
                }
                Err(e) => return Err(e),
            }
        }

        let evs = bracket_evs(count, range)?;
        info!(frames = evs.len(), ev_range = range, "Capturing exposure bracket");

        let mut bracket = CapturedBracket {
            captures: Vec::with_capacity(evs.len()),
            failed_evs: Vec::new(),
            last_error: None,
        };

        for (i, &ev) in evs.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(captured = bracket.captures.len(), "Capture cancelled, dropping frames");
                return Err(EnhanceError::CaptureAborted);
            }

            if ev == 0.0
                && let Some(payload) = metered.take()
            {
                bracket.captures.push(BracketCapture::new(ev, payload));
                continue;
            }

            // Let auto-exposure settle after every earlier capture, metering included
            if captured_any {
                sleep(config.stabilization_delay()).await;
            }
            captured_any = true;

            debug!(frame = i + 1, total = evs.len(), ev, "Capturing bracket frame");
            match self.hardware(move |p| p.capture(ev)).await {
                Ok(payload) => bracket.captures.push(BracketCapture::new(ev, payload)),
                Err(EnhanceError::Camera(e)) => {
                    warn!(ev, error = %e, "Bracket frame capture failed");
                    bracket.failed_evs.push(ev);
                    bracket.last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        if cancel.is_cancelled() {
            return Err(EnhanceError::CaptureAborted);
        }

        info!(
            captured = bracket.captures.len(),
            failed = bracket.failed_evs.len(),
            "Bracket capture complete"
        );
        Ok(bracket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_camera::{InjectedFault, VirtualCamera};
    use crate::config::PipelineConfig;
    use crate::media::Frame;
    use crate::pipelines::cancel::cancel_pair;
    use crate::pipelines::photo::EnhancementMethod;
    use crate::pipelines::photo::zoom::CameraLens;

    fn scene() -> Frame {
        Frame::from_fn(32, 24, |x, y| {
            [x as f32 / 31.0, y as f32 / 23.0, 0.35]
        })
        .unwrap()
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            stabilization_delay_ms: 1,
            ..Default::default()
        }
    }

    fn fixed_bracket() -> ColorProcessingSettings {
        ColorProcessingSettings {
            adaptive_hdr_enabled: false,
            ..Default::default()
        }
    }

    fn session(camera: Arc<VirtualCamera>) -> CaptureSession {
        CaptureSession::new(camera, EnhancementPipeline::new(fast_config()))
    }

    #[tokio::test]
    async fn test_capture_restores_auto_exposure() {
        let camera = Arc::new(VirtualCamera::new(scene()));
        let session = session(Arc::clone(&camera));
        let result = session
            .capture(1.0, &fixed_bracket(), &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(camera.captured_evs(), vec![-2.0, 0.0, 2.0]);
        assert!(!camera.exposure_locked());
        assert_eq!(camera.auto_exposure_resets(), 1);
        assert!(result.is_hdr);
    }

    #[tokio::test]
    async fn test_optics_follow_the_plan() {
        let camera = Arc::new(VirtualCamera::triple_camera(scene()));
        let session = session(Arc::clone(&camera));
        let result = session
            .capture(3.0, &fixed_bracket(), &CancelToken::never())
            .await
            .unwrap();

        assert_eq!(camera.selected_lens(), Some(CameraLens::Telephoto));
        assert_eq!(camera.zoom(), 3.0);
        assert_eq!(result.methods[0], EnhancementMethod::OpticalZoom);
    }

    #[tokio::test]
    async fn test_invalid_zoom_never_touches_hardware() {
        let camera = Arc::new(VirtualCamera::new(scene()));
        let session = session(Arc::clone(&camera));
        let err = session
            .capture(-1.0, &fixed_bracket(), &CancelToken::never())
            .await
            .unwrap_err();

        assert!(matches!(err, EnhanceError::InvalidParameter(_)));
        assert!(camera.captured_evs().is_empty());
        assert_eq!(camera.selected_lens(), None);
    }

    #[tokio::test]
    async fn test_cancel_drops_frames_and_restores_exposure() {
        let camera = Arc::new(VirtualCamera::new(scene()));
        let session = session(Arc::clone(&camera));
        let (handle, token) = cancel_pair();
        handle.cancel();

        let err = session.capture(1.0, &fixed_bracket(), &token).await.unwrap_err();
        assert_eq!(err, EnhanceError::CaptureAborted);
        assert_eq!(camera.auto_exposure_resets(), 1);
    }

    #[tokio::test]
    async fn test_failed_frame_falls_back_to_single_shot() {
        let camera = Arc::new(
            VirtualCamera::new(scene()).with_fault(2.0, InjectedFault::CaptureError),
        );
        let session = session(Arc::clone(&camera));
        let result = session
            .capture(1.0, &fixed_bracket(), &CancelToken::never())
            .await
            .unwrap();

        assert!(!result.is_hdr);
        assert_eq!(
            result.fallback,
            Some(FallbackReason::CaptureFailure { failed_evs: vec![2.0] })
        );
        assert_eq!(result.metadata.bracket_evs, vec![0.0]);
    }

    #[tokio::test]
    async fn test_every_frame_failing_is_a_camera_error() {
        let camera = Arc::new(
            VirtualCamera::new(scene())
                .with_fault(-2.0, InjectedFault::CaptureError)
                .with_fault(0.0, InjectedFault::CaptureError)
                .with_fault(2.0, InjectedFault::CaptureError),
        );
        let session = session(Arc::clone(&camera));
        let err = session
            .capture(1.0, &fixed_bracket(), &CancelToken::never())
            .await
            .unwrap_err();

        assert!(matches!(err, EnhanceError::Camera(CameraError::CaptureFailed(_))));
        assert_eq!(camera.auto_exposure_resets(), 1);
    }

    #[tokio::test]
    async fn test_adaptive_metering_reuses_nominal_frame() {
        let camera = Arc::new(VirtualCamera::new(scene()));
        let session = session(Arc::clone(&camera));
        session
            .capture(1.0, &ColorProcessingSettings::default(), &CancelToken::never())
            .await
            .unwrap();

        let evs = camera.captured_evs();
        assert_eq!(evs.len(), 3);
        assert_eq!(evs[0], 0.0);
    }

    #[tokio::test]
    async fn test_exposure_settles_after_metering() {
        let camera = Arc::new(VirtualCamera::new(scene()));
        let config = PipelineConfig {
            stabilization_delay_ms: 30,
            ..Default::default()
        };
        let session = CaptureSession::new(
            Arc::clone(&camera) as Arc<dyn CameraProvider>,
            EnhancementPipeline::new(config),
        );
        session
            .capture(1.0, &ColorProcessingSettings::default(), &CancelToken::never())
            .await
            .unwrap();

        // Metering at 0 EV, then the two outer frames
        assert_eq!(camera.captured_evs().len(), 3);
        let intervals = camera.capture_intervals();
        assert_eq!(intervals.len(), 2);
        for gap in intervals {
            assert!(gap >= std::time::Duration::from_millis(30), "gap {:?}", gap);
        }
    }

    #[tokio::test]
    async fn test_concurrent_captures_are_serialized() {
        let camera = Arc::new(
            VirtualCamera::new(scene()).with_capture_latency(std::time::Duration::from_millis(5)),
        );
        let session = Arc::new(session(Arc::clone(&camera)));
        let settings = fixed_bracket();

        let a = {
            let session = Arc::clone(&session);
            tokio::spawn(
                async move { session.capture(1.0, &settings, &CancelToken::never()).await },
            )
        };
        let b = {
            let session = Arc::clone(&session);
            tokio::spawn(
                async move { session.capture(1.0, &settings, &CancelToken::never()).await },
            )
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(camera.captured_evs(), vec![-2.0, 0.0, 2.0, -2.0, 0.0, 2.0]);
    }
}
