// SPDX-License-Identifier: GPL-3.0-only

//! Multi-frame HDR exposure fusion
//!
//! Frames of an exposure bracket are merged with a per-pixel weighted
//! average. Each frame's weight favours pixels that are well exposed (luminance
//! near mid-gray) and carry color (large channel spread):
//!
//! ```text
//! w = exp(-12.5 · (L - 0.5)²) · (max(R,G,B) - min(R,G,B))^0.2
//! ```
//!
//! Where every frame gets zero weight (neutral gray pixels) the nominal
//! exposure's value is used as-is. A gain map relating the fused result to the
//! nominal frame is produced alongside.

pub mod brackets;
pub mod gain_map;

use crate::config::ColorProcessingSettings;
use crate::constants::{SATURATION_WEIGHT_EXPONENT, WELL_EXPOSEDNESS_SIGMA_FACTOR};
use crate::errors::PipelineResult;
use crate::media::color_space::{channel_spread, luminance};
use crate::media::{Frame, parallel};
use tracing::{debug, info};

pub use brackets::{
    BracketCapture, DecodedBracket, ExposedFrame, ExposureBracket, SceneDynamicRange, bracket_evs,
    decode_bracket, retain_nominal_size,
};
pub use gain_map::{GainMap, GainMapStats};

/// Fusion weight of one pixel
pub fn fusion_weight(px: [f32; 3]) -> f32 {
    let l = luminance(px);
    let well_exposed = (-WELL_EXPOSEDNESS_SIGMA_FACTOR * (l - 0.5) * (l - 0.5)).exp();
    let saturation = channel_spread(px).max(0.0).powf(SATURATION_WEIGHT_EXPONENT);
    well_exposed * saturation
}

/// Weighted average of every frame in the bracket
///
/// No gating and no gain map; see [`merge_exposure_bracket`].
pub fn fuse(bracket: &ExposureBracket) -> PipelineResult<Frame> {
    let nominal = bracket.nominal_index();
    let frames: Vec<&Frame> = bracket.frames().iter().map(|f| &f.frame).collect();
    let (width, height) = frames[nominal].dimensions();

    let data = parallel::fill_rows(width, height, |y, row| {
        for (x, out) in row.chunks_exact_mut(3).enumerate() {
            let mut sum = [0.0f32; 3];
            let mut total = 0.0f32;
            for frame in &frames {
                let px = frame.pixel(x as u32, y as u32);
                let w = fusion_weight(px);
                sum[0] += px[0] * w;
                sum[1] += px[1] * w;
                sum[2] += px[2] * w;
                total += w;
            }

            let merged = if total > 0.0 {
                [sum[0] / total, sum[1] / total, sum[2] / total]
            } else {
                frames[nominal].pixel(x as u32, y as u32)
            };
            out.copy_from_slice(&merged);
        }
    });

    Frame::from_raw(width, height, data)
}

/// Merge an exposure bracket into one frame
///
/// A single-frame bracket, or HDR disabled in `settings`, returns the nominal
/// frame unchanged with no gain map.
pub fn merge_exposure_bracket(
    bracket: &ExposureBracket,
    settings: &ColorProcessingSettings,
) -> PipelineResult<(Frame, Option<GainMap>)> {
    let nominal = bracket.nominal();

    if bracket.len() == 1 || !settings.hdr_enabled {
        debug!(
            frames = bracket.len(),
            hdr_enabled = settings.hdr_enabled,
            "Skipping exposure fusion"
        );
        return Ok((nominal.frame.clone(), None));
    }

    let (width, height) = nominal.frame.dimensions();
    info!(
        frames = bracket.len(),
        width,
        height,
        evs = ?bracket.evs(),
        "Fusing exposure bracket"
    );

    let merged = fuse(bracket)?;
    let gain_map = GainMap::compute(&merged, &nominal.frame)?;

    let stats = gain_map.stats();
    debug!(
        gain_min = stats.min,
        gain_max = stats.max,
        gain_mean = stats.mean,
        "Gain map computed"
    );

    Ok((merged, Some(gain_map)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bracket_of(frames: Vec<(f32, Frame)>) -> ExposureBracket {
        ExposureBracket::new(
            frames
                .into_iter()
                .map(|(ev_offset, frame)| ExposedFrame { ev_offset, frame })
                .collect(),
        )
        .unwrap()
    }

    fn gradient(scale: f32) -> Frame {
        Frame::from_fn(16, 16, |x, y| {
            let fx = x as f32 / 15.0;
            let fy = y as f32 / 15.0;
            [(fx * scale).min(1.0), (fy * scale).min(1.0), (0.3 * scale).min(1.0)]
        })
        .unwrap()
    }

    #[test]
    fn test_weight_prefers_colorful_midtones() {
        assert_eq!(fusion_weight([0.5, 0.5, 0.5]), 0.0);
        assert!(fusion_weight([0.6, 0.4, 0.3]) > fusion_weight([1.0, 0.95, 0.9]));
        assert!(fusion_weight([0.6, 0.4, 0.3]) > fusion_weight([0.1, 0.02, 0.0]));
    }

    #[test]
    fn test_single_frame_is_returned_unchanged() {
        let frame = gradient(1.0);
        let bracket = ExposureBracket::single(frame.clone());
        let (merged, gain_map) =
            merge_exposure_bracket(&bracket, &ColorProcessingSettings::default()).unwrap();
        assert_eq!(merged, frame);
        assert!(gain_map.is_none());
    }

    #[test]
    fn test_hdr_disabled_returns_nominal() {
        let bracket = bracket_of(vec![
            (-2.0, gradient(0.25)),
            (0.0, gradient(1.0)),
            (2.0, gradient(4.0)),
        ]);
        let settings = ColorProcessingSettings {
            hdr_enabled: false,
            ..Default::default()
        };
        let (merged, gain_map) = merge_exposure_bracket(&bracket, &settings).unwrap();
        assert_eq!(merged, gradient(1.0));
        assert!(gain_map.is_none());
    }

    #[test]
    fn test_identical_gray_bracket_is_undistorted() {
        let gray = Frame::filled(12, 12, [0.5, 0.5, 0.5]).unwrap();
        let bracket = bracket_of(vec![
            (-2.0, gray.clone()),
            (0.0, gray.clone()),
            (2.0, gray.clone()),
        ]);
        let (merged, gain_map) =
            merge_exposure_bracket(&bracket, &ColorProcessingSettings::default()).unwrap();
        assert_eq!(merged, gray);
        let stats = gain_map.unwrap().stats();
        assert_eq!((stats.min, stats.max), (1.0, 1.0));
    }

    #[test]
    fn test_fusion_stays_within_input_envelope() {
        let bracket = bracket_of(vec![
            (2.0, gradient(3.0)),
            (-2.0, gradient(0.3)),
            (0.0, gradient(1.0)),
        ]);
        let (merged, gain_map) =
            merge_exposure_bracket(&bracket, &ColorProcessingSettings::default()).unwrap();

        for y in 0..16 {
            for x in 0..16 {
                let px = merged.pixel(x, y);
                for c in 0..3 {
                    let values = bracket.frames().iter().map(|f| f.frame.pixel(x, y)[c]);
                    let lo = values.clone().fold(f32::INFINITY, f32::min);
                    let hi = values.fold(f32::NEG_INFINITY, f32::max);
                    assert!(px[c] >= lo - 1e-5 && px[c] <= hi + 1e-5);
                }
            }
        }

        let gain_map = gain_map.unwrap();
        assert_eq!(gain_map.dimensions(), merged.dimensions());
    }

    #[test]
    fn test_arrival_order_does_not_matter() {
        let a = bracket_of(vec![
            (-1.0, gradient(0.5)),
            (0.0, gradient(1.0)),
            (1.0, gradient(2.0)),
        ]);
        let b = bracket_of(vec![
            (1.0, gradient(2.0)),
            (-1.0, gradient(0.5)),
            (0.0, gradient(1.0)),
        ]);
        assert_eq!(fuse(&a).unwrap(), fuse(&b).unwrap());
    }
}
