// SPDX-License-Identifier: GPL-3.0-only

//! Enhancement results and capture metadata

use super::hdr::{GainMap, GainMapStats, SceneDynamicRange};
use super::tone_mapping::LuminanceStats;
use super::zoom::ZoomPlan;
use crate::media::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Orchestrator stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Capturing,
    Decoding,
    Fusing,
    ToneMapping,
    Calibrating,
    Cropping,
    ExternalEnhance,
    Done,
    Fallback,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Capturing => "capturing",
            PipelineStage::Decoding => "decoding",
            PipelineStage::Fusing => "fusing",
            PipelineStage::ToneMapping => "tone mapping",
            PipelineStage::Calibrating => "calibrating",
            PipelineStage::Cropping => "cropping",
            PipelineStage::ExternalEnhance => "external enhance",
            PipelineStage::Done => "done",
            PipelineStage::Fallback => "fallback",
        };
        write!(f, "{}", name)
    }
}

/// Stage transition listener
pub type StageCallback = Arc<dyn Fn(PipelineStage) + Send + Sync>;

/// Technique that contributed to the final frame
///
/// Declaration order is reporting priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnhancementMethod {
    OpticalZoom,
    HighResCrop,
    DigitalZoom,
    MultiFrameHdr,
    AiSuperResolution,
    LocalUpscale,
}

impl std::fmt::Display for EnhancementMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EnhancementMethod::OpticalZoom => "Optical Zoom",
            EnhancementMethod::HighResCrop => "High-Res Crop",
            EnhancementMethod::DigitalZoom => "Digital Zoom",
            EnhancementMethod::MultiFrameHdr => "Multi-Frame HDR",
            EnhancementMethod::AiSuperResolution => "AI Super Resolution",
            EnhancementMethod::LocalUpscale => "Local Upscale",
        };
        write!(f, "{}", name)
    }
}

/// Why the pipeline took a simpler path than requested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Some bracket frames did not decode; single-shot on the nominal frame
    DecodeFailure { failed_evs: Vec<f32> },
    /// Some bracket frames differ in size from the nominal frame and were dropped
    SizeMismatch { dropped_evs: Vec<f32> },
    /// Some bracket frames were not captured
    CaptureFailure { failed_evs: Vec<f32> },
    /// The scene had too little clipping for fusion to help
    LowDynamicRange,
    /// A processing stage failed and the simple path was used
    StageFailure { stage: PipelineStage, message: String },
}

/// Wall time spent in one stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: PipelineStage,
    pub elapsed_ms: u64,
}

/// Everything recorded about one capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub capture_id: Uuid,
    pub captured_at: DateTime<Utc>,
    /// EV offsets of the decoded bracket, ascending
    pub bracket_evs: Vec<f32>,
    pub frames_fused: usize,
    /// Half the EV span of the bracket
    pub ev_range: f32,
    /// Luminance of the nominal exposure
    pub luminance: LuminanceStats,
    pub dynamic_range: Option<SceneDynamicRange>,
    /// White-balance temperature applied during calibration
    pub applied_kelvin: Option<f32>,
    pub zoom: ZoomPlan,
    pub gain_map: Option<GainMapStats>,
    /// Super-resolution service that was asked, if any
    pub super_resolution_service: Option<String>,
    pub timings: Vec<StageTiming>,
    pub total_ms: u64,
}

impl CaptureMetadata {
    pub fn new(zoom: ZoomPlan) -> Self {
        Self {
            capture_id: Uuid::new_v4(),
            captured_at: Utc::now(),
            bracket_evs: Vec::new(),
            frames_fused: 0,
            ev_range: 0.0,
            luminance: LuminanceStats::default(),
            dynamic_range: None,
            applied_kelvin: None,
            zoom,
            gain_map: None,
            super_resolution_service: None,
            timings: Vec::new(),
            total_ms: 0,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Output of the enhancement pipeline
#[derive(Debug, Clone)]
pub struct EnhancementResult {
    pub frame: Frame,
    /// Whether the frame came from multi-frame fusion
    pub is_hdr: bool,
    /// Fused-to-nominal gain map, at capture resolution
    pub gain_map: Option<GainMap>,
    /// Applied techniques in priority order
    pub methods: Vec<EnhancementMethod>,
    /// The super-resolution service failed and a local resize was used
    pub used_local_fallback: bool,
    pub fallback: Option<FallbackReason>,
    pub metadata: CaptureMetadata,
}

/// Records stage transitions and their timings
pub(crate) struct StageTracker {
    callback: Option<StageCallback>,
    started: Instant,
    current: Option<(PipelineStage, Instant)>,
    timings: Vec<StageTiming>,
}

impl StageTracker {
    pub(crate) fn new(callback: Option<StageCallback>) -> Self {
        Self {
            callback,
            started: Instant::now(),
            current: None,
            timings: Vec::new(),
        }
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage) {
        self.close();
        if let Some(cb) = &self.callback {
            cb(stage);
        }
        self.current = Some((stage, Instant::now()));
    }

    /// Stage currently open
    pub(crate) fn current_stage(&self) -> PipelineStage {
        self.current.map(|(stage, _)| stage).unwrap_or_default()
    }

    fn close(&mut self) {
        if let Some((stage, start)) = self.current.take() {
            self.timings.push(StageTiming {
                stage,
                elapsed_ms: start.elapsed().as_millis() as u64,
            });
        }
    }

    /// Close the open stage and hand back the timings
    pub(crate) fn finish(&mut self) -> (Vec<StageTiming>, u64) {
        self.close();
        (
            std::mem::take(&mut self.timings),
            self.started.elapsed().as_millis() as u64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_methods_sort_by_priority() {
        let mut methods = vec![
            EnhancementMethod::LocalUpscale,
            EnhancementMethod::MultiFrameHdr,
            EnhancementMethod::OpticalZoom,
        ];
        methods.sort();
        assert_eq!(
            methods,
            vec![
                EnhancementMethod::OpticalZoom,
                EnhancementMethod::MultiFrameHdr,
                EnhancementMethod::LocalUpscale,
            ]
        );
    }

    #[test]
    fn test_tracker_reports_and_times_stages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: StageCallback = Arc::new(move |stage| sink.lock().unwrap().push(stage));

        let mut tracker = StageTracker::new(Some(callback));
        tracker.enter(PipelineStage::Fusing);
        tracker.enter(PipelineStage::ToneMapping);
        tracker.enter(PipelineStage::Done);
        let (timings, _) = tracker.finish();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PipelineStage::Fusing, PipelineStage::ToneMapping, PipelineStage::Done]
        );
        let stages: Vec<_> = timings.iter().map(|t| t.stage).collect();
        assert_eq!(
            stages,
            vec![PipelineStage::Fusing, PipelineStage::ToneMapping, PipelineStage::Done]
        );
    }

    #[test]
    fn test_metadata_serializes() {
        let metadata = CaptureMetadata::new(ZoomPlan::identity());
        let json = metadata.to_json().unwrap();
        assert!(json.contains("capture_id"));
        let back: CaptureMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_fallback_reason_is_tagged() {
        let json = serde_json::to_string(&FallbackReason::LowDynamicRange).unwrap();
        assert_eq!(json, r#"{"reason":"low_dynamic_range"}"#);
    }
}
