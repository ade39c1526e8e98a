// SPDX-License-Identifier: MPL-2.0

//! Camera Enhance - capture enhancement pipeline for multi-lens cameras
//!
//! This library turns exposure brackets into finished photos: HDR exposure
//! fusion with a gain map, tone mapping, color calibration, zoom planning
//! across lenses, and optional external super-resolution.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera provider abstraction and external enhancement services
//! - [`media`]: Frame buffers, color math and row-parallel helpers
//! - [`pipelines`]: Photo and video enhancement pipelines
//! - [`config`]: User configuration and color presets
//!
//! # Example
//!
//! ```no_run
//! use camera_enhance::{BracketCapture, ColorProcessingSettings, Frame, ZoomPlan};
//!
//! # async fn run() -> camera_enhance::PipelineResult<()> {
//! let frame = Frame::filled(640, 480, [0.4, 0.5, 0.6])?;
//! let captures = vec![BracketCapture::new(0.0, frame)];
//! let result = camera_enhance::run_capture_pipeline(
//!     captures,
//!     &ZoomPlan::identity(),
//!     &ColorProcessingSettings::default(),
//! )
//! .await?;
//! println!("{:?}", result.methods);
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;

// Re-export commonly used types
pub use backends::camera::{CameraLens, CameraProvider, ZoomCapabilities};
pub use config::{ColorPreset, ColorProcessingSettings, Config, PipelineConfig};
pub use errors::{CameraError, EnhanceError, PipelineResult};
pub use media::{Frame, FramePayload};
pub use pipelines::cancel::{CancelHandle, CancelToken, cancel_pair};
pub use pipelines::photo::{
    BracketCapture, CaptureSession, EnhancementMethod, EnhancementPipeline, EnhancementResult,
    ExposedFrame, ExposureBracket, FallbackReason, GainMap, PipelineStage, ZoomMethod, ZoomPlan,
    calibrate_color, crop_and_resize, merge_exposure_bracket, plan_zoom, run_capture_pipeline,
    tone_map,
};
