// SPDX-License-Identifier: MPL-2.0

//! Photo enhancement pipeline
//!
//! Turns a captured exposure bracket into one enhanced frame:
//!
//! ```text
//! Bracket payloads → Decode → Fuse → Tone map → Calibrate → Crop → [Super-resolution]
//!                                                                         ↓
//!                                                               EnhancementResult
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Decode**: every payload is decoded; missing frames degrade to single-shot
//! 2. **Fuse**: exposure fusion of the bracket (skipped for flat scenes with adaptive HDR)
//! 3. **Tone map**: Reinhard for fused frames, the adaptive curve otherwise
//! 4. **Calibrate**: white balance, saturation, noise reduction, gamut
//! 5. **Crop**: sensor crop or digital zoom as planned
//! 6. **Super-resolution**: optional, bounded external call with a local fallback
//!
//! CPU stages run one after another on the blocking pool; each stage is
//! row-parallel internally. If a stage fails, the capture is retried once on
//! the simplest path (nominal frame, no fusion, plain crop, no external call).

pub mod calibration;
pub mod capture;
pub mod hdr;
pub mod result;
pub mod tone_mapping;
pub mod zoom;

pub use calibration::{ColorCalibrator, calibrate_color};
pub use capture::CaptureSession;
pub use hdr::{BracketCapture, ExposedFrame, ExposureBracket, GainMap, merge_exposure_bracket};
pub use result::{
    CaptureMetadata, EnhancementMethod, EnhancementResult, FallbackReason, PipelineStage,
    StageCallback, StageTiming,
};
pub use tone_mapping::{reinhard, tone_map};
pub use zoom::{ZoomMethod, ZoomPlan, ZoomPlanner, crop_and_resize, plan_zoom};

use crate::backends::enhance::{
    ExternalOutcome, LocalUpscaler, SuperResolutionBackend, call_bounded,
};
use crate::config::{ColorProcessingSettings, PipelineConfig};
use crate::constants::{LUMINANCE_SAMPLE_STRIDE, MAX_BRACKET_COUNT, ZOOM_EPSILON};
use crate::errors::{EnhanceError, PipelineResult};
use crate::media::Frame;
use crate::pipelines::cancel::CancelToken;
use hdr::{SceneDynamicRange, decode_bracket, retain_nominal_size};
use result::StageTracker;
use std::sync::{Arc, Mutex};
use tone_mapping::LuminanceStats;
use tracing::{debug, info, warn};

/// Run a CPU-bound stage on the blocking pool
async fn blocking<T, F>(work: F) -> PipelineResult<T>
where
    F: FnOnce() -> PipelineResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await?
}

fn check_cancelled(cancel: &CancelToken) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        Err(EnhanceError::CaptureAborted)
    } else {
        Ok(())
    }
}

/// Geometry stage of a zoom plan
fn apply_zoom(
    frame: &Frame,
    plan: &ZoomPlan,
) -> PipelineResult<Option<(Frame, EnhancementMethod)>> {
    match plan.method {
        ZoomMethod::HighResCrop { factor } => Ok(Some((
            zoom::crop_center(frame, factor)?,
            EnhancementMethod::HighResCrop,
        ))),
        _ if plan.digital_factor > 1.0 + ZOOM_EPSILON => Ok(Some((
            crop_and_resize(frame, plan.digital_factor)?,
            EnhancementMethod::DigitalZoom,
        ))),
        _ => Ok(None),
    }
}

/// Output of the full path before it is wrapped into a result
struct Processed {
    frame: Frame,
    is_hdr: bool,
    gain_map: Option<GainMap>,
    methods: Vec<EnhancementMethod>,
    used_local_fallback: bool,
    fallback: Option<FallbackReason>,
    applied_kelvin: f32,
}

/// Photo enhancement orchestrator
///
/// Holds state that outlives a single capture: the white-balance history of
/// the calibrator and the optional super-resolution backend.
pub struct EnhancementPipeline {
    config: PipelineConfig,
    calibrator: Arc<Mutex<ColorCalibrator>>,
    super_resolution: Option<Arc<dyn SuperResolutionBackend>>,
    stage_callback: Option<StageCallback>,
    #[cfg(test)]
    fail_at: Option<PipelineStage>,
}

impl Default for EnhancementPipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl std::fmt::Debug for EnhancementPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancementPipeline")
            .field("config", &self.config)
            .field(
                "super_resolution",
                &self.super_resolution.as_ref().map(|b| b.name().to_string()),
            )
            .finish()
    }
}

impl EnhancementPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            calibrator: Arc::new(Mutex::new(ColorCalibrator::new())),
            super_resolution: None,
            stage_callback: None,
            #[cfg(test)]
            fail_at: None,
        }
    }

    pub fn with_super_resolution(mut self, backend: Arc<dyn SuperResolutionBackend>) -> Self {
        self.super_resolution = Some(backend);
        self
    }

    pub fn with_stage_callback(mut self, callback: StageCallback) -> Self {
        self.stage_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub(crate) fn stage_callback(&self) -> Option<StageCallback> {
        self.stage_callback.clone()
    }

    /// White-balance temperature applied to the previous capture
    pub fn current_temperature(&self) -> Option<f32> {
        self.calibrator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current_temperature()
    }

    /// Enhance one captured bracket
    pub async fn process(
        &self,
        captures: Vec<BracketCapture>,
        plan: &ZoomPlan,
        settings: &ColorProcessingSettings,
        cancel: &CancelToken,
    ) -> PipelineResult<EnhancementResult> {
        // Snapshot so callers can keep editing their settings mid-capture
        let settings = settings.sanitized()?;
        let plan = *plan;
        self.config.validate()?;

        if captures.is_empty() || captures.len() > MAX_BRACKET_COUNT {
            return Err(EnhanceError::invalid(format!(
                "bracket must hold 1-{} frames, got {}",
                MAX_BRACKET_COUNT,
                captures.len()
            )));
        }
        if !(plan.digital_factor.is_finite() && plan.digital_factor > 0.0) {
            return Err(EnhanceError::invalid(format!(
                "invalid digital zoom factor {}",
                plan.digital_factor
            )));
        }

        let mut tracker = StageTracker::new(self.stage_callback.clone());
        let mut metadata = CaptureMetadata::new(plan);
        info!(
            capture_id = %metadata.capture_id,
            frames = captures.len(),
            zoom = %plan.method,
            "Processing capture"
        );

        tracker.enter(PipelineStage::Decoding);
        let decoded = blocking(move || Ok(decode_bracket(&captures))).await?;
        check_cancelled(cancel)?;

        if decoded.frames.is_empty() {
            tracker.enter(PipelineStage::Fallback);
            return Err(EnhanceError::DecodeFailure(format!(
                "none of the {} bracket frames could be decoded",
                decoded.failures.len()
            )));
        }

        let mut single_shot = (!decoded.is_complete()).then(|| FallbackReason::DecodeFailure {
            failed_evs: decoded.failures.iter().map(|(ev, _)| *ev).collect(),
        });

        let (frames, dropped_evs) = retain_nominal_size(decoded.frames);
        if !dropped_evs.is_empty() {
            warn!(dropped = ?dropped_evs, "Bracket frames differ in size, using single shot");
            single_shot.get_or_insert(FallbackReason::SizeMismatch { dropped_evs });
        }

        let bracket = Arc::new(ExposureBracket::new(frames)?);
        let nominal = Arc::new(bracket.nominal().frame.clone());

        metadata.bracket_evs = bracket.evs();
        metadata.ev_range = match (metadata.bracket_evs.first(), metadata.bracket_evs.last()) {
            (Some(lo), Some(hi)) => (hi - lo) / 2.0,
            _ => 0.0,
        };
        metadata.luminance = LuminanceStats::measure(&nominal, LUMINANCE_SAMPLE_STRIDE);

        let processed = match self
            .full_path(
                Arc::clone(&bracket),
                &plan,
                &settings,
                single_shot,
                cancel,
                &mut tracker,
                &mut metadata,
            )
            .await
        {
            Ok(processed) => processed,
            Err(e) if e.is_recoverable() && !e.is_cancellation() => {
                let failed_stage = tracker.current_stage();
                warn!(
                    error = %e,
                    stage = %failed_stage,
                    "Stage failed, retrying on the simple path"
                );
                tracker.enter(PipelineStage::Fallback);
                let mut simple = self
                    .simple_path(Arc::clone(&nominal), &plan, &settings)
                    .await?;
                simple.fallback = Some(FallbackReason::StageFailure {
                    stage: failed_stage,
                    message: e.to_string(),
                });
                metadata.frames_fused = 1;
                metadata.gain_map = None;
                metadata.dynamic_range = None;
                metadata.super_resolution_service = None;
                simple
            }
            Err(e) => return Err(e),
        };

        tracker.enter(PipelineStage::Done);
        let (timings, total_ms) = tracker.finish();
        metadata.timings = timings;
        metadata.total_ms = total_ms;
        metadata.applied_kelvin = Some(processed.applied_kelvin);

        let mut methods = processed.methods;
        methods.sort();
        methods.dedup();

        info!(
            capture_id = %metadata.capture_id,
            is_hdr = processed.is_hdr,
            width = processed.frame.width(),
            height = processed.frame.height(),
            methods = ?methods,
            total_ms,
            "Capture processed"
        );

        Ok(EnhancementResult {
            frame: processed.frame,
            is_hdr: processed.is_hdr,
            gain_map: processed.gain_map,
            methods,
            used_local_fallback: processed.used_local_fallback,
            fallback: processed.fallback,
            metadata,
        })
    }

    /// Open a full-path stage
    fn enter_stage(&self, tracker: &mut StageTracker, stage: PipelineStage) -> PipelineResult<()> {
        tracker.enter(stage);
        #[cfg(test)]
        if self.fail_at == Some(stage) {
            return Err(EnhanceError::Processing(format!("{} failed", stage)));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn full_path(
        &self,
        bracket: Arc<ExposureBracket>,
        plan: &ZoomPlan,
        settings: &ColorProcessingSettings,
        single_shot: Option<FallbackReason>,
        cancel: &CancelToken,
        tracker: &mut StageTracker,
        metadata: &mut CaptureMetadata,
    ) -> PipelineResult<Processed> {
        let mut methods = Vec::new();
        if plan.optical_factor > 1.0 + ZOOM_EPSILON {
            methods.push(EnhancementMethod::OpticalZoom);
        }
        let mut fallback = single_shot;

        // Fusion
        self.enter_stage(tracker, PipelineStage::Fusing)?;
        let mut fuse = settings.hdr_enabled && bracket.len() > 1 && fallback.is_none();
        if fuse && settings.adaptive_hdr_enabled {
            let range = SceneDynamicRange::measure(&bracket.nominal().frame);
            metadata.dynamic_range = Some(range);
            if !range.benefits_from_hdr() {
                debug!(
                    clipped = range.clipped_fraction(),
                    "Scene fits in one exposure, skipping fusion"
                );
                fallback = Some(FallbackReason::LowDynamicRange);
                fuse = false;
            }
        }

        let (frame, gain_map) = if fuse {
            let snapshot = *settings;
            let fused = Arc::clone(&bracket);
            blocking(move || merge_exposure_bracket(&fused, &snapshot)).await?
        } else {
            (bracket.nominal().frame.clone(), None)
        };
        let is_hdr = gain_map.is_some();
        metadata.frames_fused = if is_hdr { bracket.len() } else { 1 };
        metadata.gain_map = gain_map.as_ref().map(GainMap::stats);
        if is_hdr {
            methods.push(EnhancementMethod::MultiFrameHdr);
        }
        check_cancelled(cancel)?;

        // Tone mapping
        self.enter_stage(tracker, PipelineStage::ToneMapping)?;
        let (shadow, highlight) = (settings.shadow_detail, settings.highlight_recovery);
        let frame = blocking(move || {
            Ok(if is_hdr {
                reinhard(&frame)
            } else {
                tone_map(&frame, shadow, highlight)
            })
        })
        .await?;
        check_cancelled(cancel)?;

        // Calibration
        self.enter_stage(tracker, PipelineStage::Calibrating)?;
        let (frame, applied_kelvin) = self.calibrate(frame, settings).await?;
        check_cancelled(cancel)?;

        // Zoom
        let needs_crop = matches!(plan.method, ZoomMethod::HighResCrop { .. })
            || plan.digital_factor > 1.0 + ZOOM_EPSILON;
        let frame = if needs_crop {
            self.enter_stage(tracker, PipelineStage::Cropping)?;
            let plan = *plan;
            let (zoomed, method) = blocking(move || {
                Ok(match apply_zoom(&frame, &plan)? {
                    Some((zoomed, method)) => (zoomed, Some(method)),
                    None => (frame, None),
                })
            })
            .await?;
            methods.extend(method);
            zoomed
        } else {
            frame
        };
        check_cancelled(cancel)?;

        // Super-resolution
        let mut used_local_fallback = false;
        let frame = match (&self.super_resolution, self.config.ai_super_resolution_enabled) {
            (Some(backend), true) => {
                self.enter_stage(tracker, PipelineStage::ExternalEnhance)?;
                metadata.super_resolution_service = Some(backend.name().to_string());
                let scale = self.config.super_resolution_scale;
                let outcome = call_bounded(
                    backend.name(),
                    backend.enhance(&frame, scale),
                    self.config.external_timeout(),
                    cancel,
                )
                .await;

                match outcome {
                    ExternalOutcome::Cancelled => return Err(EnhanceError::CaptureAborted),
                    ExternalOutcome::Produced(enhanced) if enhanced.width() >= frame.width() => {
                        methods.push(EnhancementMethod::AiSuperResolution);
                        enhanced
                    }
                    _ => {
                        used_local_fallback = true;
                        methods.push(EnhancementMethod::LocalUpscale);
                        blocking(move || LocalUpscaler::upscale(&frame, scale)).await?
                    }
                }
            }
            _ => frame,
        };

        Ok(Processed {
            frame,
            is_hdr,
            gain_map,
            methods,
            used_local_fallback,
            fallback,
            applied_kelvin,
        })
    }

    /// Nominal frame, no fusion, plain crop, no external call
    async fn simple_path(
        &self,
        nominal: Arc<Frame>,
        plan: &ZoomPlan,
        settings: &ColorProcessingSettings,
    ) -> PipelineResult<Processed> {
        let (shadow, highlight) = (settings.shadow_detail, settings.highlight_recovery);
        let frame = blocking(move || Ok(tone_map(&nominal, shadow, highlight))).await?;
        let (frame, applied_kelvin) = self.calibrate(frame, settings).await?;

        let mut methods = Vec::new();
        if plan.optical_factor > 1.0 + ZOOM_EPSILON {
            methods.push(EnhancementMethod::OpticalZoom);
        }
        let digital = plan.digital_factor;
        let frame = if digital > 1.0 + ZOOM_EPSILON {
            methods.push(EnhancementMethod::DigitalZoom);
            blocking(move || crop_and_resize(&frame, digital)).await?
        } else {
            frame
        };

        Ok(Processed {
            frame,
            is_hdr: false,
            gain_map: None,
            methods,
            used_local_fallback: false,
            fallback: None,
            applied_kelvin,
        })
    }

    async fn calibrate(
        &self,
        frame: Frame,
        settings: &ColorProcessingSettings,
    ) -> PipelineResult<(Frame, f32)> {
        let calibrator = Arc::clone(&self.calibrator);
        let snapshot = *settings;
        blocking(move || {
            let mut calibrator = calibrator.lock().unwrap_or_else(|e| e.into_inner());
            let calibrated = calibrator.calibrate(&frame, &snapshot);
            Ok((calibrated.frame, calibrated.applied_kelvin))
        })
        .await
    }
}

/// Enhance a captured bracket with a default pipeline
pub async fn run_capture_pipeline(
    captures: Vec<BracketCapture>,
    plan: &ZoomPlan,
    settings: &ColorProcessingSettings,
) -> PipelineResult<EnhancementResult> {
    EnhancementPipeline::default()
        .process(captures, plan, settings, &CancelToken::never())
        .await
}
