// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline-wide constants

use std::time::Duration;

/// Application name used for the config directory
pub const APP_NAME: &str = "camera-enhance";

/// Version string baked in by build.rs
pub fn app_version() -> &'static str {
    env!("GIT_VERSION")
}

// ===== Exposure brackets =====

/// Smallest bracket that can be captured (single shot)
pub const MIN_BRACKET_COUNT: usize = 1;
/// Largest bracket the fusion engine accepts
pub const MAX_BRACKET_COUNT: usize = 5;
/// Default bracket size for an HDR capture
pub const DEFAULT_BRACKET_COUNT: usize = 3;
/// Smallest allowed EV range for a bracket
pub const MIN_EV_RANGE: f32 = 0.5;
/// Largest allowed EV range for a bracket
pub const MAX_EV_RANGE: f32 = 4.0;
/// Default EV range (brackets at -2, 0, +2)
pub const DEFAULT_EV_RANGE: f32 = 2.0;
/// Delay between bracket frames so auto-exposure can settle
pub const DEFAULT_STABILIZATION_DELAY: Duration = Duration::from_millis(100);

// ===== Fusion =====

/// Width parameter of the well-exposedness Gaussian: exp(-12.5 (L - 0.5)^2)
pub const WELL_EXPOSEDNESS_SIGMA_FACTOR: f32 = 12.5;
/// Exponent applied to the per-pixel channel spread
pub const SATURATION_WEIGHT_EXPONENT: f32 = 0.2;
/// Lower bound of a gain map value
pub const GAIN_MAP_MIN: f32 = 0.1;
/// Upper bound of a gain map value
pub const GAIN_MAP_MAX: f32 = 10.0;
/// Luminance below which a pixel counts as a clipped shadow
pub const SHADOW_CLIP_LEVEL: f32 = 0.02;
/// Luminance above which a pixel counts as a clipped highlight
pub const HIGHLIGHT_CLIP_LEVEL: f32 = 0.98;
/// Clipped fraction below which adaptive HDR skips fusion
pub const ADAPTIVE_HDR_MIN_CLIPPED: f32 = 0.01;

// ===== Tone mapping =====

/// Sample every Nth pixel when gathering luminance statistics
pub const LUMINANCE_SAMPLE_STRIDE: usize = 4;
/// Knee above which highlights are rolled off
pub const HIGHLIGHT_KNEE: f32 = 0.7;
/// Luminance floor used when computing the color-preserving ratio
pub const MIN_LUMINANCE: f32 = 0.001;
/// Display gamma used by the Reinhard operator
pub const DISPLAY_GAMMA: f32 = 2.2;

// ===== Color calibration =====

/// Sample every Nth pixel when estimating scene white balance
pub const WHITE_BALANCE_SAMPLE_STRIDE: usize = 10;
/// Neutral (daylight) color temperature in Kelvin
pub const NEUTRAL_TEMPERATURE_K: f32 = 5500.0;
/// Blend rate toward the estimated temperature per frame
pub const WHITE_BALANCE_ADAPTATION_RATE: f32 = 0.1;
/// Maximum per-channel correction applied at full temperature shift
pub const WHITE_BALANCE_STRENGTH: f32 = 0.2;
/// Green band boost relative to the configured saturation boost
pub const GREEN_SATURATION_FACTOR: f32 = 0.9;
/// Spatial sigma of the bilateral filter (pixels)
pub const BILATERAL_SPATIAL_SIGMA: f32 = 1.0;
/// Intensity sigma of the bilateral filter (normalized units)
pub const BILATERAL_RANGE_SIGMA: f32 = 0.1;
/// Bilateral neighbourhood radius (3x3)
pub const BILATERAL_RADIUS: i32 = 1;
/// Saturation multiplier for the simulated wide-gamut boost
pub const GAMUT_BOOST_FACTOR: f32 = 0.15;
/// Cap on the simulated wide-gamut boost
pub const GAMUT_BOOST_CAP: f32 = 0.1;

// ===== Zoom =====

/// Default cap for digital zoom
pub const DEFAULT_MAX_DIGITAL_ZOOM: f32 = 10.0;
/// Zoom factor at which the telephoto lens takes over
pub const TELEPHOTO_MIN_ZOOM: f32 = 2.0;
/// Zoom factor at which the periscope lens takes over
pub const PERISCOPE_MIN_ZOOM: f32 = 7.0;
/// Output resolution that high-resolution sensor crops target
pub const HIGH_RES_OUTPUT_MEGAPIXELS: f32 = 12.0;
/// Minimum sensor resolution that supports high-resolution cropping
pub const HIGH_RES_MIN_SENSOR_MEGAPIXELS: f32 = 48.0;
/// Tolerance used when comparing zoom factors
pub const ZOOM_EPSILON: f32 = 1e-4;

// ===== External enhancement =====

/// Default upscale factor requested from the super-resolution service
pub const DEFAULT_SUPER_RESOLUTION_SCALE: f32 = 2.0;
/// Upper bound on the super-resolution scale
pub const MAX_SUPER_RESOLUTION_SCALE: f32 = 4.0;
/// Default bound on an external enhancement call
pub const DEFAULT_EXTERNAL_TIMEOUT: Duration = Duration::from_secs(120);
