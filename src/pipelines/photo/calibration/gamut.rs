// SPDX-License-Identifier: GPL-3.0-only

//! Simulated wide-gamut vibrancy
//!
//! This is not a Display P3 conversion. It approximates the look of a wider
//! gamut by boosting the strictly dominant channel of saturated pixels in
//! linear light and re-encoding to sRGB. Output stays sRGB.

use crate::constants::{GAMUT_BOOST_CAP, GAMUT_BOOST_FACTOR};
use crate::media::Frame;
use crate::media::color_space::{linear_to_srgb, rgb_to_hsv, srgb_to_linear};
use tracing::debug;

/// Boost one pixel
pub fn enhance_pixel(px: [f32; 3]) -> [f32; 3] {
    let saturation = rgb_to_hsv(px).s;
    let boost = (saturation * GAMUT_BOOST_FACTOR).min(GAMUT_BOOST_CAP);
    if boost <= 0.0 {
        return px;
    }

    let mut linear = [
        srgb_to_linear(px[0]),
        srgb_to_linear(px[1]),
        srgb_to_linear(px[2]),
    ];

    let dominant = (0..3).find(|&c| (0..3).all(|o| o == c || linear[c] > linear[o]));
    if let Some(c) = dominant {
        linear[c] = (linear[c] * (1.0 + boost)).min(1.0);
    }

    [
        linear_to_srgb(linear[0]),
        linear_to_srgb(linear[1]),
        linear_to_srgb(linear[2]),
    ]
}

/// Apply the simulated wide-gamut boost to a frame
pub fn enhance_gamut(frame: &Frame) -> Frame {
    debug!("Applying simulated wide-gamut boost");
    frame.map_pixels(enhance_pixel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_is_unchanged() {
        assert_eq!(enhance_pixel([0.4, 0.4, 0.4]), [0.4, 0.4, 0.4]);
    }

    #[test]
    fn test_dominant_channel_is_boosted() {
        let out = enhance_pixel([0.2, 0.6, 0.3]);
        assert!(out[1] > 0.6);
        assert!((out[0] - 0.2).abs() < 1e-4);
        assert!((out[2] - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_tied_maximum_is_not_boosted() {
        let out = enhance_pixel([0.7, 0.7, 0.2]);
        assert!((out[0] - 0.7).abs() < 1e-4);
        assert!((out[1] - 0.7).abs() < 1e-4);
    }

    #[test]
    fn test_output_stays_in_range() {
        let out = enhance_pixel([1.0, 0.0, 0.0]);
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
