// SPDX-License-Identifier: GPL-3.0-only

//! Exposure brackets
//!
//! A bracket is a short burst of frames captured at different EV offsets for
//! one HDR shot. The device is assumed to be stationary during the burst:
//! frames are fused pixel-for-pixel without any realignment, so handheld
//! motion between frames is not corrected.

use crate::constants::{
    ADAPTIVE_HDR_MIN_CLIPPED, HIGHLIGHT_CLIP_LEVEL, LUMINANCE_SAMPLE_STRIDE, MAX_BRACKET_COUNT,
    MAX_EV_RANGE, MIN_BRACKET_COUNT, MIN_EV_RANGE, SHADOW_CLIP_LEVEL,
};
use crate::errors::{EnhanceError, PipelineResult};
use crate::media::color_space::luminance;
use crate::media::{Frame, FramePayload, parallel};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Validate a bracket size
pub fn validate_bracket_count(count: usize) -> PipelineResult<()> {
    if (MIN_BRACKET_COUNT..=MAX_BRACKET_COUNT).contains(&count) {
        Ok(())
    } else {
        Err(EnhanceError::invalid(format!(
            "bracket count must be {}-{}, got {}",
            MIN_BRACKET_COUNT, MAX_BRACKET_COUNT, count
        )))
    }
}

/// EV offsets for a bracket of `count` frames over `[-range, +range]`
///
/// Three frames give `{-range, 0, +range}`; other sizes are evenly spaced.
/// A single frame is captured at 0 EV.
pub fn bracket_evs(count: usize, range: f32) -> PipelineResult<Vec<f32>> {
    validate_bracket_count(count)?;
    if !(MIN_EV_RANGE..=MAX_EV_RANGE).contains(&range) {
        return Err(EnhanceError::invalid(format!(
            "EV range must be {}-{}, got {}",
            MIN_EV_RANGE, MAX_EV_RANGE, range
        )));
    }

    if count == 1 {
        return Ok(vec![0.0]);
    }

    let step = 2.0 * range / (count - 1) as f32;
    Ok((0..count).map(|i| -range + step * i as f32).collect())
}

/// A decoded frame and the EV offset it was captured at
#[derive(Debug, Clone)]
pub struct ExposedFrame {
    pub ev_offset: f32,
    pub frame: Frame,
}

/// Decoded exposure bracket, ordered by EV offset
#[derive(Debug, Clone)]
pub struct ExposureBracket {
    frames: Vec<ExposedFrame>,
}

impl ExposureBracket {
    /// Build a bracket; frames are ordered by their assigned EV, not by arrival
    pub fn new(mut frames: Vec<ExposedFrame>) -> PipelineResult<Self> {
        validate_bracket_count(frames.len())?;

        if let Some(bad) = frames.iter().find(|f| !f.ev_offset.is_finite()) {
            return Err(EnhanceError::invalid(format!(
                "EV offset is not finite: {}",
                bad.ev_offset
            )));
        }

        let first = &frames[0].frame;
        if frames.iter().any(|f| !f.frame.same_dimensions(first)) {
            return Err(EnhanceError::invalid(
                "bracket frames have different dimensions",
            ));
        }

        frames.sort_by(|a, b| a.ev_offset.total_cmp(&b.ev_offset));
        Ok(Self { frames })
    }

    /// Single-frame bracket
    pub fn single(frame: Frame) -> Self {
        Self {
            frames: vec![ExposedFrame {
                ev_offset: 0.0,
                frame,
            }],
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[ExposedFrame] {
        &self.frames
    }

    pub fn evs(&self) -> Vec<f32> {
        self.frames.iter().map(|f| f.ev_offset).collect()
    }

    /// Index of the frame closest to 0 EV (first one on a tie)
    pub fn nominal_index(&self) -> usize {
        self.frames
            .iter()
            .enumerate()
            .fold((0, f32::INFINITY), |(best, best_ev), (i, f)| {
                if f.ev_offset.abs() < best_ev {
                    (i, f.ev_offset.abs())
                } else {
                    (best, best_ev)
                }
            })
            .0
    }

    /// The nominal-exposure frame
    pub fn nominal(&self) -> &ExposedFrame {
        &self.frames[self.nominal_index()]
    }

    pub fn into_nominal(mut self) -> ExposedFrame {
        let idx = self.nominal_index();
        self.frames.swap_remove(idx)
    }
}

/// Keep the frames that match the nominal frame's size
///
/// The nominal frame is the one closest to 0 EV, first in EV order on a tie.
/// Returns the kept frames and the EV offsets of the dropped ones.
pub fn retain_nominal_size(mut frames: Vec<ExposedFrame>) -> (Vec<ExposedFrame>, Vec<f32>) {
    frames.sort_by(|a, b| a.ev_offset.total_cmp(&b.ev_offset));
    let Some(nominal) = frames
        .iter()
        .min_by(|a, b| a.ev_offset.abs().total_cmp(&b.ev_offset.abs()))
        .map(|f| f.frame.dimensions())
    else {
        return (frames, Vec::new());
    };

    let (kept, dropped): (Vec<_>, Vec<_>) = frames
        .into_iter()
        .partition(|f| f.frame.dimensions() == nominal);
    (kept, dropped.iter().map(|f| f.ev_offset).collect())
}

/// One captured bracket member, possibly still encoded
#[derive(Debug, Clone)]
pub struct BracketCapture {
    pub ev_offset: f32,
    pub payload: FramePayload,
}

impl BracketCapture {
    pub fn new(ev_offset: f32, payload: impl Into<FramePayload>) -> Self {
        Self {
            ev_offset,
            payload: payload.into(),
        }
    }
}

/// Result of decoding a captured bracket
#[derive(Debug)]
pub struct DecodedBracket {
    /// Frames that decoded successfully, in EV order
    pub frames: Vec<ExposedFrame>,
    /// EV offsets and messages of members that failed to decode
    pub failures: Vec<(f32, String)>,
}

impl DecodedBracket {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decode every member of a captured bracket
pub fn decode_bracket(captures: &[BracketCapture]) -> DecodedBracket {
    let mut frames = Vec::with_capacity(captures.len());
    let mut failures = Vec::new();

    for capture in captures {
        match capture.payload.decode() {
            Ok(frame) => frames.push(ExposedFrame {
                ev_offset: capture.ev_offset,
                frame,
            }),
            Err(e) => {
                warn!(ev = capture.ev_offset, error = %e, "Bracket frame failed to decode");
                failures.push((capture.ev_offset, e.to_string()));
            }
        }
    }

    frames.sort_by(|a, b| a.ev_offset.total_cmp(&b.ev_offset));
    DecodedBracket { frames, failures }
}

/// Clipping statistics of the nominal exposure
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneDynamicRange {
    /// Fraction of sampled pixels crushed to black
    pub clipped_shadows: f32,
    /// Fraction of sampled pixels blown to white
    pub clipped_highlights: f32,
}

impl SceneDynamicRange {
    pub fn measure(frame: &Frame) -> Self {
        let (shadows, highlights, total) = parallel::fold_pixels(
            frame.as_slice(),
            LUMINANCE_SAMPLE_STRIDE,
            || (0usize, 0usize, 0usize),
            |(s, h, n), px| {
                let l = luminance(px);
                (
                    s + usize::from(l < SHADOW_CLIP_LEVEL),
                    h + usize::from(l > HIGHLIGHT_CLIP_LEVEL),
                    n + 1,
                )
            },
            |a, b| (a.0 + b.0, a.1 + b.1, a.2 + b.2),
        );

        let total = total.max(1) as f32;
        Self {
            clipped_shadows: shadows as f32 / total,
            clipped_highlights: highlights as f32 / total,
        }
    }

    pub fn clipped_fraction(&self) -> f32 {
        self.clipped_shadows + self.clipped_highlights
    }

    /// Whether fusing a bracket would recover anything
    pub fn benefits_from_hdr(&self) -> bool {
        self.clipped_fraction() >= ADAPTIVE_HDR_MIN_CLIPPED
    }

    /// EV range to capture for this scene
    ///
    /// Grows with the clipped fraction; a quarter of the frame clipped or
    /// more uses the full range.
    pub fn adaptive_ev_range(&self) -> f32 {
        let t = (self.clipped_fraction() / 0.25).clamp(0.0, 1.0);
        MIN_EV_RANGE + (MAX_EV_RANGE - MIN_EV_RANGE) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_frame_evs() {
        assert_eq!(bracket_evs(3, 2.0).unwrap(), vec![-2.0, 0.0, 2.0]);
    }

    #[test]
    fn test_general_evs_are_evenly_spaced() {
        assert_eq!(bracket_evs(5, 2.0).unwrap(), vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(bracket_evs(2, 1.5).unwrap(), vec![-1.5, 1.5]);
        assert_eq!(bracket_evs(1, 3.0).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_invalid_bracket_parameters() {
        assert!(bracket_evs(0, 2.0).is_err());
        assert!(bracket_evs(6, 2.0).is_err());
        assert!(bracket_evs(3, 0.1).is_err());
        assert!(bracket_evs(3, 4.5).is_err());
    }

    #[test]
    fn test_bracket_orders_by_ev() {
        let frame = Frame::filled(2, 2, [0.5; 3]).unwrap();
        let bracket = ExposureBracket::new(vec![
            ExposedFrame { ev_offset: 2.0, frame: frame.clone() },
            ExposedFrame { ev_offset: -2.0, frame: frame.clone() },
            ExposedFrame { ev_offset: 0.0, frame },
        ])
        .unwrap();
        assert_eq!(bracket.evs(), vec![-2.0, 0.0, 2.0]);
        assert_eq!(bracket.nominal_index(), 1);
    }

    #[test]
    fn test_bracket_rejects_mismatched_dimensions() {
        let result = ExposureBracket::new(vec![
            ExposedFrame { ev_offset: 0.0, frame: Frame::filled(2, 2, [0.5; 3]).unwrap() },
            ExposedFrame { ev_offset: 1.0, frame: Frame::filled(3, 2, [0.5; 3]).unwrap() },
        ]);
        assert!(matches!(result, Err(EnhanceError::InvalidParameter(_))));
    }

    #[test]
    fn test_retain_nominal_size_drops_odd_frames() {
        let frames = vec![
            ExposedFrame {
                ev_offset: 2.0,
                frame: Frame::filled(8, 8, [0.9; 3]).unwrap(),
            },
            ExposedFrame {
                ev_offset: 0.0,
                frame: Frame::filled(4, 4, [0.5; 3]).unwrap(),
            },
            ExposedFrame {
                ev_offset: -2.0,
                frame: Frame::filled(4, 4, [0.1; 3]).unwrap(),
            },
        ];
        let (kept, dropped) = retain_nominal_size(frames);
        assert_eq!(dropped, vec![2.0]);
        let evs: Vec<f32> = kept.iter().map(|f| f.ev_offset).collect();
        assert_eq!(evs, vec![-2.0, 0.0]);
        assert!(ExposureBracket::new(kept).is_ok());
    }

    #[test]
    fn test_decode_bracket_reports_failures() {
        let captures = vec![
            BracketCapture::new(0.0, Frame::filled(2, 2, [0.5; 3]).unwrap()),
            BracketCapture::new(2.0, vec![1u8, 2, 3]),
        ];
        let decoded = decode_bracket(&captures);
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.failures.len(), 1);
        assert_eq!(decoded.failures[0].0, 2.0);
        assert!(!decoded.is_complete());
    }

    #[test]
    fn test_dynamic_range_of_flat_scene() {
        let flat = Frame::filled(8, 8, [0.5; 3]).unwrap();
        let range = SceneDynamicRange::measure(&flat);
        assert_eq!(range.clipped_fraction(), 0.0);
        assert!(!range.benefits_from_hdr());
        assert_eq!(range.adaptive_ev_range(), MIN_EV_RANGE);
    }

    #[test]
    fn test_dynamic_range_of_harsh_scene() {
        let harsh = Frame::from_fn(8, 8, |x, _| if x < 4 { [0.0; 3] } else { [1.0; 3] }).unwrap();
        let range = SceneDynamicRange::measure(&harsh);
        assert!(range.benefits_from_hdr());
        assert_eq!(range.adaptive_ev_range(), MAX_EV_RANGE);
    }
}
