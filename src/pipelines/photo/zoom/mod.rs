// SPDX-License-Identifier: GPL-3.0-only

//! Zoom planning
//!
//! A requested zoom factor is split between the optics and a digital crop:
//!
//! 1. If the optics reach the target, use the lens that covers it.
//! 2. Otherwise zoom optically as far as possible and crop the rest (hybrid).
//! 3. With optical zoom disabled, crop the wide camera. Large sensors can
//!    crop without upscaling while the crop still holds a full-size output.

pub mod crop;

use crate::backends::camera::ZoomCapabilities;
use crate::constants::{
    DEFAULT_MAX_DIGITAL_ZOOM, HIGH_RES_MIN_SENSOR_MEGAPIXELS, HIGH_RES_OUTPUT_MEGAPIXELS,
    PERISCOPE_MIN_ZOOM, TELEPHOTO_MIN_ZOOM,
};
use crate::errors::{EnhanceError, PipelineResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use crate::backends::camera::CameraLens;
pub use crop::{crop_and_resize, crop_center};

/// How a zoom factor is achieved
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ZoomMethod {
    OpticalZoom { factor: f32 },
    HybridZoom { optical: f32, digital: f32 },
    DigitalZoom { factor: f32 },
    HighResCrop { factor: f32 },
}

impl std::fmt::Display for ZoomMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ZoomMethod::OpticalZoom { factor } => write!(f, "{:.1}x optical", factor),
            ZoomMethod::HybridZoom { optical, digital } => {
                write!(f, "{:.1}x optical + {:.1}x digital", optical, digital)
            }
            ZoomMethod::DigitalZoom { factor } => write!(f, "{:.1}x digital", factor),
            ZoomMethod::HighResCrop { factor } => write!(f, "{:.1}x sensor crop", factor),
        }
    }
}

/// Lens and factors for one zoom request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomPlan {
    pub lens: CameraLens,
    pub optical_factor: f32,
    pub digital_factor: f32,
    /// Target after clamping to the supported range
    pub target_zoom: f32,
    pub method: ZoomMethod,
}

impl ZoomPlan {
    /// Plain wide-camera capture with no zoom
    pub fn identity() -> Self {
        Self {
            lens: CameraLens::Wide,
            optical_factor: 1.0,
            digital_factor: 1.0,
            target_zoom: 1.0,
            method: ZoomMethod::OpticalZoom { factor: 1.0 },
        }
    }

    pub fn total_zoom(&self) -> f32 {
        self.optical_factor * self.digital_factor
    }
}

/// Zoom policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPlanner {
    pub max_digital_zoom: f32,
    pub high_res_crop_enabled: bool,
}

impl Default for ZoomPlanner {
    fn default() -> Self {
        Self {
            max_digital_zoom: DEFAULT_MAX_DIGITAL_ZOOM,
            high_res_crop_enabled: true,
        }
    }
}

impl ZoomPlanner {
    pub fn new(max_digital_zoom: f32, high_res_crop_enabled: bool) -> Self {
        Self {
            max_digital_zoom,
            high_res_crop_enabled,
        }
    }

    /// Largest crop factor the sensor supports without upscaling
    fn high_res_limit(caps: &ZoomCapabilities) -> Option<f32> {
        let mp = caps.sensor_resolution_megapixels;
        (mp >= HIGH_RES_MIN_SENSOR_MEGAPIXELS).then(|| (mp / HIGH_RES_OUTPUT_MEGAPIXELS).sqrt())
    }

    /// Most specialized lens able to deliver `zoom` optically
    ///
    /// Without a telephoto, the periscope also serves the telephoto range.
    fn lens_for(zoom: f32, caps: &ZoomCapabilities) -> CameraLens {
        let periscope_range = if caps.has_telephoto {
            PERISCOPE_MIN_ZOOM
        } else {
            TELEPHOTO_MIN_ZOOM
        };
        if caps.has_periscope && zoom >= periscope_range {
            CameraLens::Periscope
        } else if caps.has_telephoto && zoom >= TELEPHOTO_MIN_ZOOM {
            CameraLens::Telephoto
        } else {
            CameraLens::Wide
        }
    }

    pub fn plan(
        &self,
        target: f32,
        caps: &ZoomCapabilities,
        optical_enabled: bool,
    ) -> PipelineResult<ZoomPlan> {
        if !target.is_finite() || target <= 0.0 {
            return Err(EnhanceError::invalid(format!(
                "target zoom must be a positive number, got {}",
                target
            )));
        }

        let max_optical = caps.max_optical_zoom.max(1.0);
        let ceiling = self.max_digital_zoom.max(max_optical);
        let target = target.clamp(1.0, ceiling);

        let plan = if optical_enabled && target <= max_optical {
            ZoomPlan {
                lens: Self::lens_for(target, caps),
                optical_factor: target,
                digital_factor: 1.0,
                target_zoom: target,
                method: ZoomMethod::OpticalZoom { factor: target },
            }
        } else if optical_enabled && max_optical > 1.0 {
            let digital = target / max_optical;
            ZoomPlan {
                lens: Self::lens_for(max_optical, caps),
                optical_factor: max_optical,
                digital_factor: digital,
                target_zoom: target,
                method: ZoomMethod::HybridZoom {
                    optical: max_optical,
                    digital,
                },
            }
        } else {
            let high_res = self.high_res_crop_enabled
                && Self::high_res_limit(caps).is_some_and(|limit| target <= limit);
            ZoomPlan {
                lens: CameraLens::Wide,
                optical_factor: 1.0,
                digital_factor: target,
                target_zoom: target,
                method: if high_res {
                    ZoomMethod::HighResCrop { factor: target }
                } else {
                    ZoomMethod::DigitalZoom { factor: target }
                },
            }
        };

        debug!(
            target,
            lens = %plan.lens,
            optical = plan.optical_factor,
            digital = plan.digital_factor,
            method = %plan.method,
            "Zoom planned"
        );
        Ok(plan)
    }
}

/// Plan a zoom with the default policy
pub fn plan_zoom(
    target: f32,
    capabilities: &ZoomCapabilities,
    optical_enabled: bool,
) -> PipelineResult<ZoomPlan> {
    ZoomPlanner::default().plan(target, capabilities, optical_enabled)
}
