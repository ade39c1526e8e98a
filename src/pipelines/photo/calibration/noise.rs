// SPDX-License-Identifier: GPL-3.0-only

//! Edge-preserving noise reduction
//!
//! A 3x3 bilateral filter: each neighbour is weighted by a spatial Gaussian
//! and by how close its luminance is to the center pixel, so flat regions are
//! smoothed while edges keep their contrast. The filtered result is blended
//! with the input by the configured strength.

use crate::constants::{BILATERAL_RADIUS, BILATERAL_RANGE_SIGMA, BILATERAL_SPATIAL_SIGMA};
use crate::media::color_space::{clamp_rgb, lerp_rgb, luminance};
use crate::media::Frame;
use tracing::debug;

/// Precomputed spatial weights for the filter window
fn spatial_kernel() -> Vec<(i64, i64, f32)> {
    let two_sigma_sq = 2.0 * BILATERAL_SPATIAL_SIGMA * BILATERAL_SPATIAL_SIGMA;
    let mut kernel = Vec::new();
    for dy in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
        for dx in -BILATERAL_RADIUS..=BILATERAL_RADIUS {
            let dist_sq = (dx * dx + dy * dy) as f32;
            kernel.push((dx as i64, dy as i64, (-dist_sq / two_sigma_sq).exp()));
        }
    }
    kernel
}

/// Reduce noise with strength 0.0 - 1.0
///
/// A strength of zero (or below) returns the input unchanged without
/// touching any pixel.
pub fn reduce_noise(frame: &Frame, strength: f32) -> Frame {
    if strength <= 0.0 || strength.is_nan() {
        return frame.clone();
    }
    let strength = strength.min(1.0);

    debug!(strength, "Applying bilateral noise reduction");

    let kernel = spatial_kernel();
    let two_range_sq = 2.0 * BILATERAL_RANGE_SIGMA * BILATERAL_RANGE_SIGMA;
    frame.fill_rows_like(|y, row| {
        for (x, out) in row.chunks_exact_mut(3).enumerate() {
            let center = frame.pixel(x as u32, y as u32);
            let center_l = luminance(center);

            let mut sum = [0.0f32; 3];
            let mut total = 0.0f32;
            for &(dx, dy, spatial) in &kernel {
                let neighbour = frame.pixel_clamped(x as i64 + dx, y as i64 + dy);
                let diff = luminance(neighbour) - center_l;
                let weight = spatial * (-(diff * diff) / two_range_sq).exp();
                sum[0] += neighbour[0] * weight;
                sum[1] += neighbour[1] * weight;
                sum[2] += neighbour[2] * weight;
                total += weight;
            }

            // The center always contributes weight 1, so total > 0
            let filtered = [sum[0] / total, sum[1] / total, sum[2] / total];
            out.copy_from_slice(&clamp_rgb(lerp_rgb(center, filtered, strength)));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_frame() -> Frame {
        Frame::from_fn(16, 16, |x, y| {
            let n = if (x + y) % 2 == 0 { 0.03 } else { -0.03 };
            [0.5 + n, 0.5 + n, 0.5 + n]
        })
        .unwrap()
    }

    #[test]
    fn test_zero_strength_is_exact_noop() {
        let frame = noisy_frame();
        let out = reduce_noise(&frame, 0.0);
        assert_eq!(out, frame);
        assert_eq!(out.as_slice(), frame.as_slice());
    }

    #[test]
    fn test_smooths_flat_noise() {
        let frame = noisy_frame();
        let out = reduce_noise(&frame, 1.0);
        let spread = |f: &Frame| {
            f.pixels()
                .map(|p| (p[0] - 0.5).abs())
                .fold(0.0f32, f32::max)
        };
        assert!(spread(&out) < spread(&frame));
    }

    #[test]
    fn test_filtered_frame_keeps_size() {
        for (w, h) in [(1, 1), (7, 3)] {
            let frame = Frame::from_fn(w, h, |x, y| [x as f32 * 0.1, y as f32 * 0.2, 0.5]).unwrap();
            let out = reduce_noise(&frame, 0.5);
            assert_eq!(out.dimensions(), (w, h));
        }
    }

    #[test]
    fn test_preserves_strong_edges() {
        let frame = Frame::from_fn(8, 8, |x, _| if x < 4 { [0.0; 3] } else { [1.0; 3] }).unwrap();
        let out = reduce_noise(&frame, 1.0);
        // Range weight for a full-scale step is exp(-50), effectively zero
        assert!(out.pixel(3, 4)[0] < 0.01);
        assert!(out.pixel(4, 4)[0] > 0.99);
    }
}
