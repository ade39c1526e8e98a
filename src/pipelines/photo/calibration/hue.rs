// SPDX-License-Identifier: GPL-3.0-only

//! Hue-dependent color adjustments
//!
//! Saturation is boosted per hue band, hues are nudged by a small cosmetic
//! warp, and likely skin pixels are pulled back toward their input color so
//! faces do not oversaturate. All three run in one HSV pass per pixel.

use crate::constants::GREEN_SATURATION_FACTOR;
use crate::media::color_space::{Hsv, clamp01, hsv_to_rgb, lerp_rgb, rgb_to_hsv, wrap_hue};
use std::f32::consts::PI;

/// Saturation multiplier for a hue given the configured boost
pub fn saturation_factor(hue: f32, boost: f32) -> f32 {
    if hue <= 30.0 || hue >= 330.0 {
        // Reds stay put to protect skin and warm tones
        1.0
    } else if (180.0..=240.0).contains(&hue) {
        boost
    } else if (90.0..=150.0).contains(&hue) {
        boost * GREEN_SATURATION_FACTOR
    } else {
        boost
    }
}

/// Cosmetic hue warp
///
/// Each band is shifted by a sine of the position inside the band, so the
/// warp is zero at band edges and the mapping stays continuous.
pub fn shift_hue(hue: f32) -> f32 {
    let band_shift = |start: f32, end: f32, amplitude: f32| {
        let position = (hue - start) / (end - start);
        amplitude * (PI * position).sin()
    };

    let shifted = if hue < 30.0 {
        // Red-orange: warmer
        hue + band_shift(0.0, 30.0, 3.0)
    } else if (60.0..150.0).contains(&hue) {
        // Yellow-green: pulled toward yellow
        hue - band_shift(60.0, 150.0, 3.0)
    } else if (180.0..240.0).contains(&hue) {
        // Cyan-blue: deeper blue
        hue + band_shift(180.0, 240.0, 4.0)
    } else {
        hue
    };

    wrap_hue(shifted)
}

/// Whether an HSV color looks like skin
pub fn is_skin_tone(hsv: &Hsv) -> bool {
    (hsv.h <= 50.0 || hsv.h >= 330.0) && (0.2..=0.7).contains(&hsv.s) && hsv.v >= 0.3
}

/// Boost, warp and skin-protect one pixel
pub fn adjust_pixel(px: [f32; 3], saturation_boost: f32, skin_preservation: f32) -> [f32; 3] {
    let original = rgb_to_hsv(px);

    let adjusted = Hsv {
        h: shift_hue(original.h),
        s: clamp01(original.s * saturation_factor(original.h, saturation_boost)),
        v: original.v,
    };
    let calibrated = hsv_to_rgb(adjusted);

    if skin_preservation > 0.0 && is_skin_tone(&original) {
        let input = [clamp01(px[0]), clamp01(px[1]), clamp01(px[2])];
        lerp_rgb(calibrated, input, skin_preservation.clamp(0.0, 1.0))
    } else {
        calibrated
    }
}
