// SPDX-License-Identifier: GPL-3.0-only

//! Optional external enhancement services
//!
//! Super-resolution and frame interpolation are slow, possibly remote or
//! model-backed transforms. Both are behind object-safe async traits, both
//! are allowed to decline (`Ok(None)`), and both have a local fallback:
//!
//! - super-resolution → cubic upscale ([`LocalUpscaler`])
//! - frame interpolation → linear blend ([`LinearBlendInterpolator`])
//!
//! Calls go through [`call_bounded`], which enforces a timeout and honours
//! cancellation.

use crate::constants::MAX_SUPER_RESOLUTION_SCALE;
use crate::errors::{EnhanceError, PipelineResult};
use crate::media::Frame;
use crate::media::color_space::lerp_rgb;
use crate::pipelines::cancel::CancelToken;
use crate::pipelines::photo::zoom::crop;
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, warn};

/// Upscales a frame by a factor
pub trait SuperResolutionBackend: Send + Sync {
    /// Service name for logs and metadata
    fn name(&self) -> &str;

    /// Upscale `frame` by `scale`
    ///
    /// `Ok(None)` means the service declined; the caller falls back locally.
    fn enhance<'a>(&'a self, frame: &'a Frame, scale: f32)
    -> BoxFuture<'a, PipelineResult<Option<Frame>>>;
}

/// Synthesizes a frame between two others
pub trait FrameInterpolationBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Frame at position `t` in `[0, 1]` between `a` and `b`
    fn interpolate<'a>(
        &'a self,
        a: &'a Frame,
        b: &'a Frame,
        t: f32,
    ) -> BoxFuture<'a, PipelineResult<Option<Frame>>>;
}

/// Validate a super-resolution factor
pub fn validate_scale(scale: f32) -> PipelineResult<()> {
    if scale.is_finite() && scale >= 1.0 && scale <= MAX_SUPER_RESOLUTION_SCALE {
        Ok(())
    } else {
        Err(EnhanceError::invalid(format!(
            "super-resolution scale must be 1-{}, got {}",
            MAX_SUPER_RESOLUTION_SCALE, scale
        )))
    }
}

/// Cubic upscale on the local CPU
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalUpscaler;

impl LocalUpscaler {
    pub fn upscale(frame: &Frame, scale: f32) -> PipelineResult<Frame> {
        validate_scale(scale)?;
        crop::scale(frame, scale)
    }
}

impl SuperResolutionBackend for LocalUpscaler {
    fn name(&self) -> &str {
        "local-cubic"
    }

    fn enhance<'a>(
        &'a self,
        frame: &'a Frame,
        scale: f32,
    ) -> BoxFuture<'a, PipelineResult<Option<Frame>>> {
        Box::pin(async move {
            let frame = frame.clone();
            let upscaled =
                tokio::task::spawn_blocking(move || Self::upscale(&frame, scale)).await??;
            Ok(Some(upscaled))
        })
    }
}

/// Per-pixel linear blend of two frames
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearBlendInterpolator;

impl LinearBlendInterpolator {
    pub fn blend(a: &Frame, b: &Frame, t: f32) -> PipelineResult<Frame> {
        if !a.same_dimensions(b) {
            return Err(EnhanceError::invalid(format!(
                "cannot blend {:?} with {:?}",
                a.dimensions(),
                b.dimensions()
            )));
        }
        if !t.is_finite() {
            return Err(EnhanceError::invalid("blend position is not finite"));
        }
        let t = t.clamp(0.0, 1.0);

        let data = a
            .as_slice()
            .chunks_exact(3)
            .zip(b.as_slice().chunks_exact(3))
            .flat_map(|(pa, pb)| {
                lerp_rgb([pa[0], pa[1], pa[2]], [pb[0], pb[1], pb[2]], t)
            })
            .collect();
        Frame::from_raw(a.width(), a.height(), data)
    }
}

impl FrameInterpolationBackend for LinearBlendInterpolator {
    fn name(&self) -> &str {
        "linear-blend"
    }

    fn interpolate<'a>(
        &'a self,
        a: &'a Frame,
        b: &'a Frame,
        t: f32,
    ) -> BoxFuture<'a, PipelineResult<Option<Frame>>> {
        Box::pin(async move { Self::blend(a, b, t).map(Some) })
    }
}

/// How a bounded external call ended
#[derive(Debug)]
pub enum ExternalOutcome {
    /// The service returned a frame
    Produced(Frame),
    /// The service declined
    Declined,
    Failed(EnhanceError),
    TimedOut,
    Cancelled,
}

impl ExternalOutcome {
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            ExternalOutcome::Produced(frame) => Some(frame),
            _ => None,
        }
    }
}

/// Await an external call with a timeout and cancellation
pub async fn call_bounded(
    service: &str,
    call: BoxFuture<'_, PipelineResult<Option<Frame>>>,
    timeout: Duration,
    cancel: &CancelToken,
) -> ExternalOutcome {
    let outcome = tokio::select! {
        result = tokio::time::timeout(timeout, call) => match result {
            Ok(Ok(Some(frame))) => ExternalOutcome::Produced(frame),
            Ok(Ok(None)) => ExternalOutcome::Declined,
            Ok(Err(e)) => ExternalOutcome::Failed(e),
            Err(_) => ExternalOutcome::TimedOut,
        },
        _ = cancel.cancelled() => ExternalOutcome::Cancelled,
    };

    match &outcome {
        ExternalOutcome::Produced(frame) => {
            debug!(
                service,
                width = frame.width(),
                height = frame.height(),
                "External call succeeded"
            );
        }
        ExternalOutcome::Declined => debug!(service, "External service declined"),
        ExternalOutcome::Failed(e) => warn!(service, error = %e, "External service failed"),
        ExternalOutcome::TimedOut => {
            warn!(service, timeout_ms = timeout.as_millis() as u64, "External service timed out")
        }
        ExternalOutcome::Cancelled => debug!(service, "External call cancelled"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipelines::cancel::cancel_pair;

    struct Stalled;

    impl SuperResolutionBackend for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        fn enhance<'a>(
            &'a self,
            _frame: &'a Frame,
            _scale: f32,
        ) -> BoxFuture<'a, PipelineResult<Option<Frame>>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            })
        }
    }

    fn frame() -> Frame {
        Frame::from_fn(8, 6, |x, y| [x as f32 / 7.0, y as f32 / 5.0, 0.5]).unwrap()
    }

    #[test]
    fn test_scale_validation() {
        assert!(validate_scale(2.0).is_ok());
        assert!(validate_scale(0.5).is_err());
        assert!(validate_scale(8.0).is_err());
        assert!(validate_scale(f32::NAN).is_err());
    }

    #[test]
    fn test_blend_endpoints_and_midpoint() {
        let a = Frame::filled(4, 4, [0.0, 0.2, 1.0]).unwrap();
        let b = Frame::filled(4, 4, [1.0, 0.6, 0.0]).unwrap();
        assert_eq!(LinearBlendInterpolator::blend(&a, &b, 0.0).unwrap(), a);
        assert_eq!(LinearBlendInterpolator::blend(&a, &b, 1.0).unwrap(), b);
        let mid = LinearBlendInterpolator::blend(&a, &b, 0.5).unwrap();
        let px = mid.pixel(1, 1);
        assert!((px[0] - 0.5).abs() < 1e-6 && (px[1] - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_local_upscaler_scales_dimensions() {
        let source = frame();
        let out = LocalUpscaler.enhance(&source, 2.0).await.unwrap().unwrap();
        assert_eq!(out.dimensions(), (16, 12));
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let source = frame();
        let outcome = call_bounded(
            "stalled",
            Stalled.enhance(&source, 2.0),
            Duration::from_millis(20),
            &CancelToken::never(),
        )
        .await;
        assert!(matches!(outcome, ExternalOutcome::TimedOut));
    }

    #[tokio::test]
    async fn test_bounded_call_is_cancellable() {
        let source = frame();
        let (handle, token) = cancel_pair();
        handle.cancel();
        let outcome = call_bounded(
            "stalled",
            Stalled.enhance(&source, 2.0),
            Duration::from_secs(60),
            &token,
        )
        .await;
        assert!(matches!(outcome, ExternalOutcome::Cancelled));
    }
}
