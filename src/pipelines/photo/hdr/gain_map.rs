// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic gain maps
//!
//! A gain map stores, per pixel and channel, the factor that turns the SDR
//! reference (the nominal exposure) into the fused HDR buffer. Factors are
//! clamped to `[GAIN_MAP_MIN, GAIN_MAP_MAX]`.
//!
//! For export the map is log-encoded into 8 bits, so that a factor of 1.0
//! sits in the middle of the range and boosts and cuts get the same
//! precision.

use crate::constants::{GAIN_MAP_MAX, GAIN_MAP_MIN};
use crate::errors::{EnhanceError, PipelineResult};
use crate::media::{Frame, parallel};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Per-pixel multiplicative HDR/SDR ratio
#[derive(Debug, Clone, PartialEq)]
pub struct GainMap {
    gains: Frame,
}

/// Range of the factors in a gain map
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainMapStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

fn gain_for(hdr: f32, sdr: f32) -> f32 {
    if sdr == 0.0 {
        1.0
    } else {
        (hdr / sdr).clamp(GAIN_MAP_MIN, GAIN_MAP_MAX)
    }
}

impl GainMap {
    /// Compute the map that takes `sdr` to `hdr`
    pub fn compute(hdr: &Frame, sdr: &Frame) -> PipelineResult<Self> {
        if !hdr.same_dimensions(sdr) {
            return Err(EnhanceError::invalid(format!(
                "gain map inputs differ in size: {:?} vs {:?}",
                hdr.dimensions(),
                sdr.dimensions()
            )));
        }

        let (width, height) = hdr.dimensions();
        let row_len = width as usize * 3;
        let data = parallel::fill_rows(width, height, |y, row| {
            let start = y * row_len;
            let hdr_row = &hdr.as_slice()[start..start + row_len];
            let sdr_row = &sdr.as_slice()[start..start + row_len];
            for ((out, &h), &s) in row.iter_mut().zip(hdr_row).zip(sdr_row) {
                *out = gain_for(h, s);
            }
        });

        Ok(Self {
            gains: Frame::from_raw(width, height, data)?,
        })
    }

    /// Multiply an SDR frame by the map
    pub fn reconstruct(&self, sdr: &Frame) -> PipelineResult<Frame> {
        if !self.gains.same_dimensions(sdr) {
            return Err(EnhanceError::invalid(
                "gain map and SDR frame differ in size",
            ));
        }

        let data = sdr
            .as_slice()
            .iter()
            .zip(self.gains.as_slice())
            .map(|(s, g)| s * g)
            .collect();
        Frame::from_raw(sdr.width(), sdr.height(), data)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.gains.dimensions()
    }

    /// Gain at a pixel
    pub fn gain(&self, x: u32, y: u32) -> [f32; 3] {
        self.gains.pixel(x, y)
    }

    pub fn as_frame(&self) -> &Frame {
        &self.gains
    }

    pub fn stats(&self) -> GainMapStats {
        let values = self.gains.as_slice();
        let (min, max, sum) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(lo, hi, sum), &v| (lo.min(v), hi.max(v), sum + v as f64),
        );
        GainMapStats {
            min,
            max,
            mean: (sum / values.len().max(1) as f64) as f32,
        }
    }

    /// Log-encode the map into an 8-bit image
    pub fn to_rgb8(&self) -> RgbImage {
        let log_min = GAIN_MAP_MIN.ln();
        let log_span = GAIN_MAP_MAX.ln() - log_min;
        let encoded = self
            .gains
            .map_pixels(|px| px.map(|g| (g.ln() - log_min) / log_span));
        encoded.to_rgb8()
    }
}
