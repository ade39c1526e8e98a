// SPDX-License-Identifier: GPL-3.0-only

//! Tone mapping
//!
//! Two operators live here:
//!
//! - [`tone_map`]: the scene-adaptive curve used for single-shot captures.
//!   Shadows are lifted in proportion to how dark the frame is, highlights
//!   above the knee roll off in proportion to how bright the frame gets, and
//!   a smoothstep finishes with a gentle S-curve. Only luminance is remapped;
//!   channel ratios (hue and saturation) are preserved.
//! - [`reinhard`]: the global `L / (1 + L)` operator applied to fused HDR
//!   buffers.

use crate::constants::{DISPLAY_GAMMA, HIGHLIGHT_KNEE, LUMINANCE_SAMPLE_STRIDE, MIN_LUMINANCE};
use crate::media::color_space::{clamp_rgb, gamma_decode, gamma_encode, luminance};
use crate::media::{Frame, parallel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Global luminance statistics of a frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LuminanceStats {
    /// Mean luminance (0.0 - 1.0)
    pub average: f32,
    /// Brightest sampled luminance
    pub max: f32,
    /// Number of pixels sampled
    pub samples: usize,
}

impl LuminanceStats {
    /// Gather statistics, sampling every `stride`-th pixel
    pub fn measure(frame: &Frame, stride: usize) -> Self {
        let (sum, max, samples) = parallel::fold_pixels(
            frame.as_slice(),
            stride,
            || (0.0f64, 0.0f32, 0usize),
            |(sum, max, n), px| {
                let l = luminance(px);
                (sum + l as f64, max.max(l), n + 1)
            },
            |a, b| (a.0 + b.0, a.1.max(b.1), a.2 + b.2),
        );

        Self {
            average: if samples > 0 { (sum / samples as f64) as f32 } else { 0.0 },
            max,
            samples,
        }
    }
}

/// Scene-adaptive curve parameters derived from a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneCurve {
    /// Shadow lift amount
    pub shadow_lift: f32,
    /// Extra exponent applied to the highlight roll-off
    pub highlight_rolloff: f32,
}

impl ToneCurve {
    /// Derive the curve from scene statistics and the user strengths
    pub fn for_scene(stats: &LuminanceStats, shadow_detail: f32, highlight_recovery: f32) -> Self {
        let shadow_detail = shadow_detail.clamp(0.0, 1.0);
        let highlight_recovery = highlight_recovery.clamp(0.0, 1.0);
        Self {
            shadow_lift: shadow_detail * (1.0 - stats.average.clamp(0.0, 1.0)),
            highlight_rolloff: highlight_recovery * stats.max.clamp(0.0, 1.0),
        }
    }

    /// Map one luminance value (0.0 - 1.0)
    ///
    /// Non-decreasing over 0.0 - 1.0 for any lift in 0.0 - 1.0 and any
    /// non-negative roll-off.
    pub fn apply(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);

        let mut y = x + self.shadow_lift * (1.0 - x) * x;

        if y > HIGHLIGHT_KNEE {
            let span = 1.0 - HIGHLIGHT_KNEE;
            let t = ((y - HIGHLIGHT_KNEE) / span).min(1.0);
            y = HIGHLIGHT_KNEE + span * (1.0 - (1.0 - t).powf(1.0 + self.highlight_rolloff));
        }

        let y = y.clamp(0.0, 1.0);
        y * y * (3.0 - 2.0 * y)
    }
}

/// Apply the adaptive tone curve to a frame
pub fn tone_map(frame: &Frame, shadow_detail: f32, highlight_recovery: f32) -> Frame {
    let stats = LuminanceStats::measure(frame, LUMINANCE_SAMPLE_STRIDE);
    let curve = ToneCurve::for_scene(&stats, shadow_detail, highlight_recovery);

    debug!(
        avg_luminance = stats.average,
        max_luminance = stats.max,
        shadow_lift = curve.shadow_lift,
        highlight_rolloff = curve.highlight_rolloff,
        "Applying adaptive tone curve"
    );

    frame.map_pixels(|px| {
        let l = luminance(px);
        let adjustment = curve.apply(l) / l.max(MIN_LUMINANCE);
        clamp_rgb([px[0] * adjustment, px[1] * adjustment, px[2] * adjustment])
    })
}

/// Reinhard global operator for fused HDR buffers
pub fn reinhard(frame: &Frame) -> Frame {
    debug!("Applying Reinhard tone mapping");

    frame.map_pixels(|px| {
        let linear = [
            gamma_decode(px[0], DISPLAY_GAMMA),
            gamma_decode(px[1], DISPLAY_GAMMA),
            gamma_decode(px[2], DISPLAY_GAMMA),
        ];
        let l = luminance(linear);
        if l <= 0.0 {
            return [0.0, 0.0, 0.0];
        }

        let scale = (l / (1.0 + l)) / l;
        clamp_rgb([
            gamma_encode(linear[0] * scale, DISPLAY_GAMMA),
            gamma_encode(linear[1] * scale, DISPLAY_GAMMA),
            gamma_encode(linear[2] * scale, DISPLAY_GAMMA),
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_is_monotonic() {
        for (shadow, highlight) in [(0.0, 0.0), (0.3, 0.4), (1.0, 1.0), (0.8, 0.1)] {
            for average in [0.0, 0.2, 0.5, 1.0] {
                for max in [0.1, 0.7, 1.0] {
                    let stats = LuminanceStats {
                        average,
                        max,
                        samples: 1,
                    };
                    let curve = ToneCurve::for_scene(&stats, shadow, highlight);
                    let mut previous = curve.apply(0.0);
                    for i in 1..=1000 {
                        let value = curve.apply(i as f32 / 1000.0);
                        assert!(
                            value >= previous - 1e-6,
                            "curve decreased at {} for {:?}",
                            i,
                            curve
                        );
                        previous = value;
                    }
                }
            }
        }
    }

    #[test]
    fn test_curve_endpoints() {
        let curve = ToneCurve {
            shadow_lift: 0.5,
            highlight_rolloff: 0.5,
        };
        assert_eq!(curve.apply(0.0), 0.0);
        assert!((curve.apply(1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stats_subsampling_keeps_average() {
        let frame = Frame::filled(16, 16, [0.5, 0.5, 0.5]).unwrap();
        let stats = LuminanceStats::measure(&frame, 4);
        assert!((stats.average - 0.5).abs() < 1e-5);
        assert_eq!(stats.samples, 64);
    }

    #[test]
    fn test_tone_map_preserves_channel_ratios() {
        let frame = Frame::from_fn(8, 8, |x, _| [0.1 + x as f32 * 0.05, 0.05, 0.02]).unwrap();
        let mapped = tone_map(&frame, 0.5, 0.5);
        for (before, after) in frame.pixels().zip(mapped.pixels()) {
            if after.iter().all(|&c| c < 1.0) && after[0] > 0.0 {
                let ratio_before = before[1] / before[0];
                let ratio_after = after[1] / after[0];
                assert!((ratio_before - ratio_after).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_tone_map_output_in_range() {
        let frame = Frame::from_fn(9, 7, |x, y| [x as f32 / 8.0, y as f32 / 6.0, 1.3]).unwrap();
        let mapped = tone_map(&frame, 1.0, 1.0);
        assert!(mapped.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_reinhard_compresses_and_keeps_black() {
        let frame = Frame::from_fn(2, 1, |x, _| if x == 0 { [0.0; 3] } else { [1.0; 3] }).unwrap();
        let mapped = reinhard(&frame);
        assert_eq!(mapped.pixel(0, 0), [0.0, 0.0, 0.0]);
        let white = mapped.pixel(1, 0);
        // 0.5 in linear light, re-encoded with gamma 2.2
        let expected = 0.5f32.powf(1.0 / 2.2);
        assert!((white[0] - expected).abs() < 1e-4);
    }
}
