// SPDX-License-Identifier: GPL-3.0-only

//! Color calibration
//!
//! Sequential full-frame stages:
//!
//! ```text
//! White balance → Saturation / hue warp / skin protection → Noise reduction → Gamut boost
//! ```
//!
//! The calibrator keeps white-balance state between captures so the applied
//! temperature drifts smoothly. [`calibrate_color`] runs a fresh calibrator
//! for one-off use.

pub mod gamut;
pub mod hue;
pub mod noise;
pub mod white_balance;

use crate::config::ColorProcessingSettings;
use crate::media::Frame;
use crate::media::color_space::clamp_rgb;
use tracing::debug;
use white_balance::WhiteBalance;

pub use gamut::enhance_gamut;
pub use noise::reduce_noise;

/// Output of one calibration pass
#[derive(Debug, Clone)]
pub struct Calibrated {
    pub frame: Frame,
    /// White-balance temperature that was applied
    pub applied_kelvin: f32,
}

/// Stateful color calibrator
#[derive(Debug, Clone, Default)]
pub struct ColorCalibrator {
    white_balance: WhiteBalance,
}

impl ColorCalibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Temperature applied to the last calibrated frame
    pub fn current_temperature(&self) -> Option<f32> {
        self.white_balance.current_temperature()
    }

    /// Run every calibration stage on a frame
    pub fn calibrate(&mut self, frame: &Frame, settings: &ColorProcessingSettings) -> Calibrated {
        let (balanced, applied_kelvin) = self.white_balance.apply(frame);

        let boost = settings.saturation_boost;
        let skin = settings.skin_tone_preservation;
        let toned = balanced.map_pixels(|px| hue::adjust_pixel(px, boost, skin));

        let denoised = reduce_noise(&toned, settings.noise_reduction);

        let output = if settings.display_p3_enabled {
            enhance_gamut(&denoised)
        } else {
            denoised
        };

        debug!(
            applied_k = applied_kelvin,
            saturation_boost = boost,
            noise_reduction = settings.noise_reduction,
            p3 = settings.display_p3_enabled,
            "Color calibration complete"
        );

        Calibrated {
            frame: output.map_pixels(clamp_rgb),
            applied_kelvin,
        }
    }
}

/// Calibrate a single frame with no white-balance history
pub fn calibrate_color(frame: &Frame, settings: &ColorProcessingSettings) -> Frame {
    ColorCalibrator::new().calibrate(frame, settings).frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::color_space::rgb_to_hsv;

    fn colorful_frame() -> Frame {
        Frame::from_fn(24, 24, |x, y| {
            let fx = x as f32 / 23.0;
            let fy = y as f32 / 23.0;
            [fx, fy, 1.0 - fx * fy]
        })
        .unwrap()
    }

    #[test]
    fn test_output_channels_and_saturation_in_range() {
        let extreme = ColorProcessingSettings {
            saturation_boost: 2.0,
            noise_reduction: 1.0,
            skin_tone_preservation: 0.0,
            display_p3_enabled: true,
            ..Default::default()
        };
        let out = calibrate_color(&colorful_frame(), &extreme);
        for px in out.pixels() {
            assert!(px.iter().all(|v| (0.0..=1.0).contains(v)), "{:?}", px);
            let s = rgb_to_hsv(px).s;
            assert!((0.0..=1.0).contains(&s));
        }
        let bytes = out.to_rgb8();
        assert_eq!(bytes.dimensions(), (24, 24));
    }

    #[test]
    fn test_boost_increases_blue_saturation() {
        let frame = Frame::filled(8, 8, [0.3, 0.45, 0.7]).unwrap();
        let settings = ColorProcessingSettings {
            saturation_boost: 1.5,
            noise_reduction: 0.0,
            display_p3_enabled: false,
            ..Default::default()
        };
        let out = calibrate_color(&frame, &settings);
        // Cool scene gets warmed by white balance, but the boost dominates
        assert!(rgb_to_hsv(out.pixel(0, 0)).s > rgb_to_hsv(frame.pixel(0, 0)).s);
    }

    #[test]
    fn test_calibrator_smooths_temperature_across_frames() {
        let neutral = Frame::filled(20, 20, [0.5, 0.5, 0.5]).unwrap();
        let warm = Frame::filled(20, 20, [0.8, 0.5, 0.4]).unwrap();
        let settings = ColorProcessingSettings::default();

        let mut calibrator = ColorCalibrator::new();
        assert_eq!(calibrator.calibrate(&neutral, &settings).applied_kelvin, 5500.0);
        let second = calibrator.calibrate(&warm, &settings).applied_kelvin;
        assert!(second < 5500.0 && second > 3000.0);
    }
}
