// SPDX-License-Identifier: GPL-3.0-only

//! Frame-rate up-conversion
//!
//! `factor - 1` frames are synthesized between every pair of consecutive
//! input frames, at evenly spaced positions. Each synthesized frame comes
//! from the interpolation backend when one is configured and answers in time;
//! otherwise from a local linear blend.

use crate::backends::enhance::{
    ExternalOutcome, FrameInterpolationBackend, LinearBlendInterpolator, call_bounded,
};
use crate::errors::{EnhanceError, PipelineResult};
use crate::media::Frame;
use crate::pipelines::cancel::CancelToken;
use std::time::Duration;
use tracing::{debug, info};

/// Largest supported up-conversion factor
pub const MAX_INTERPOLATION_FACTOR: usize = 8;

/// Output of an up-conversion
#[derive(Debug, Clone)]
pub struct InterpolatedSequence {
    pub frames: Vec<Frame>,
    /// Frames produced by the backend
    pub synthesized: usize,
    /// Frames produced by the local blend
    pub blended: usize,
}

/// Options for [`interpolate_sequence`]
pub struct InterpolationOptions<'a> {
    pub factor: usize,
    pub backend: Option<&'a dyn FrameInterpolationBackend>,
    pub timeout: Duration,
    pub cancel: CancelToken,
}

/// Insert interpolated frames into a sequence
pub async fn interpolate_sequence(
    frames: &[Frame],
    options: InterpolationOptions<'_>,
) -> PipelineResult<InterpolatedSequence> {
    let factor = options.factor;
    if !(1..=MAX_INTERPOLATION_FACTOR).contains(&factor) {
        return Err(EnhanceError::invalid(format!(
            "interpolation factor must be 1-{}, got {}",
            MAX_INTERPOLATION_FACTOR, factor
        )));
    }
    if let Some(first) = frames.first()
        && frames.iter().any(|f| !f.same_dimensions(first))
    {
        return Err(EnhanceError::invalid("sequence frames differ in size"));
    }

    let mut output = Vec::with_capacity(frames.len().saturating_sub(1) * factor + 1);
    let mut synthesized = 0;
    let mut blended = 0;

    for pair in frames.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        output.push(a.clone());

        for step in 1..factor {
            if options.cancel.is_cancelled() {
                return Err(EnhanceError::CaptureAborted);
            }
            let t = step as f32 / factor as f32;

            let from_backend = match options.backend {
                Some(backend) => {
                    let outcome = call_bounded(
                        backend.name(),
                        backend.interpolate(a, b, t),
                        options.timeout,
                        &options.cancel,
                    )
                    .await;
                    if matches!(outcome, ExternalOutcome::Cancelled) {
                        return Err(EnhanceError::CaptureAborted);
                    }
                    outcome.into_frame().filter(|f| f.same_dimensions(a))
                }
                None => None,
            };

            match from_backend {
                Some(frame) => {
                    synthesized += 1;
                    output.push(frame);
                }
                None => {
                    blended += 1;
                    output.push(LinearBlendInterpolator::blend(a, b, t)?);
                }
            }
        }
    }

    if let Some(last) = frames.last() {
        output.push(last.clone());
    }

    debug!(synthesized, blended, "Interpolated frames");
    info!(
        input = frames.len(),
        output = output.len(),
        factor,
        "Frame rate up-conversion complete"
    );

    Ok(InterpolatedSequence {
        frames: output,
        synthesized,
        blended,
    })
}
