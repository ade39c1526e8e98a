// SPDX-License-Identifier: GPL-3.0-only

//! White balance estimation and correction
//!
//! The scene temperature is estimated from the average red/blue ratio on a
//! coarse sampling grid and mapped to a small set of temperature buckets.
//! Across consecutive captures the applied temperature moves toward the
//! estimate exponentially instead of snapping, which avoids visible flicker
//! when the estimate jumps between buckets.

use crate::constants::{
    NEUTRAL_TEMPERATURE_K, WHITE_BALANCE_ADAPTATION_RATE, WHITE_BALANCE_SAMPLE_STRIDE,
    WHITE_BALANCE_STRENGTH,
};
use crate::media::{Frame, parallel};
use tracing::debug;

/// Red/blue ratio thresholds and their temperature bucket, warmest first
const TEMPERATURE_BUCKETS: [(f32, f32); 4] = [
    (1.2, 3000.0),
    (1.1, 4000.0),
    (0.9, 5500.0),
    (0.8, 6500.0),
];
/// Temperature used when the ratio falls below every threshold
const COOLEST_TEMPERATURE_K: f32 = 8000.0;

/// Map a red/blue ratio to a temperature bucket
pub fn temperature_for_ratio(ratio: f32) -> f32 {
    TEMPERATURE_BUCKETS
        .iter()
        .find(|(threshold, _)| ratio > *threshold)
        .map(|(_, kelvin)| *kelvin)
        .unwrap_or(COOLEST_TEMPERATURE_K)
}

/// Average red/blue ratio over a coarse grid
///
/// Returns 1.0 (neutral) when the frame has no blue at all.
pub fn red_blue_ratio(frame: &Frame) -> f32 {
    let (r_sum, b_sum) = parallel::fold_pixels(
        frame.as_slice(),
        WHITE_BALANCE_SAMPLE_STRIDE,
        || (0.0f64, 0.0f64),
        |(r, b), px| (r + px[0] as f64, b + px[2] as f64),
        |a, b| (a.0 + b.0, a.1 + b.1),
    );

    if b_sum <= f64::EPSILON {
        1.0
    } else {
        (r_sum / b_sum) as f32
    }
}

/// Estimate the scene color temperature in Kelvin
pub fn estimate_temperature(frame: &Frame) -> f32 {
    temperature_for_ratio(red_blue_ratio(frame))
}

/// Per-channel gains that move `kelvin` toward neutral
pub fn gains_for_temperature(kelvin: f32) -> [f32; 3] {
    let shift = ((NEUTRAL_TEMPERATURE_K - kelvin) / NEUTRAL_TEMPERATURE_K).clamp(-1.0, 1.0);
    [
        1.0 - WHITE_BALANCE_STRENGTH * shift,
        1.0,
        1.0 + WHITE_BALANCE_STRENGTH * shift,
    ]
}

/// Temporal white balance state
#[derive(Debug, Clone)]
pub struct WhiteBalance {
    current_kelvin: Option<f32>,
    adaptation_rate: f32,
}

impl Default for WhiteBalance {
    fn default() -> Self {
        Self::new(WHITE_BALANCE_ADAPTATION_RATE)
    }
}

impl WhiteBalance {
    pub fn new(adaptation_rate: f32) -> Self {
        Self {
            current_kelvin: None,
            adaptation_rate: adaptation_rate.clamp(0.0, 1.0),
        }
    }

    /// Temperature applied to the last frame, if any
    pub fn current_temperature(&self) -> Option<f32> {
        self.current_kelvin
    }

    /// Blend toward a new estimate and return the temperature to apply
    ///
    /// The first observation seeds the state directly.
    pub fn adapt(&mut self, target_kelvin: f32) -> f32 {
        let next = match self.current_kelvin {
            Some(current) => current + (target_kelvin - current) * self.adaptation_rate,
            None => target_kelvin,
        };
        self.current_kelvin = Some(next);
        next
    }

    /// Estimate, adapt and correct one frame
    ///
    /// Returns the corrected frame and the temperature that was applied.
    pub fn apply(&mut self, frame: &Frame) -> (Frame, f32) {
        let estimated = estimate_temperature(frame);
        let applied = self.adapt(estimated);
        let gains = gains_for_temperature(applied);

        debug!(
            estimated_k = estimated,
            applied_k = applied,
            r_gain = gains[0],
            b_gain = gains[2],
            "White balance"
        );

        if gains == [1.0, 1.0, 1.0] {
            return (frame.clone(), applied);
        }

        let corrected = frame.map_pixels(|px| {
            [
                (px[0] * gains[0]).clamp(0.0, 1.0),
                (px[1] * gains[1]).clamp(0.0, 1.0),
                (px[2] * gains[2]).clamp(0.0, 1.0),
            ]
        });
        (corrected, applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temperature_buckets() {
        assert_eq!(temperature_for_ratio(1.5), 3000.0);
        assert_eq!(temperature_for_ratio(1.15), 4000.0);
        assert_eq!(temperature_for_ratio(1.0), 5500.0);
        assert_eq!(temperature_for_ratio(0.85), 6500.0);
        assert_eq!(temperature_for_ratio(0.5), 8000.0);
    }

    #[test]
    fn test_neutral_frame_is_untouched() {
        let frame = Frame::filled(20, 20, [0.4, 0.4, 0.4]).unwrap();
        let mut wb = WhiteBalance::default();
        let (out, kelvin) = wb.apply(&frame);
        assert_eq!(kelvin, 5500.0);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_warm_scene_is_cooled() {
        let frame = Frame::filled(20, 20, [0.8, 0.5, 0.4]).unwrap();
        let mut wb = WhiteBalance::default();
        let (out, kelvin) = wb.apply(&frame);
        assert_eq!(kelvin, 3000.0);
        let px = out.pixel(0, 0);
        assert!(px[0] < 0.8);
        assert!(px[2] > 0.4);
    }

    #[test]
    fn test_adaptation_is_gradual() {
        let mut wb = WhiteBalance::new(0.1);
        assert_eq!(wb.adapt(5500.0), 5500.0);
        let next = wb.adapt(3000.0);
        assert!((next - 5250.0).abs() < 1e-3);
        assert_eq!(wb.current_temperature(), Some(next));
    }
}
