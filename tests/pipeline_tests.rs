// SPDX-License-Identifier: MPL-2.0

//! End-to-end tests for the enhancement pipeline

use camera_enhance::backends::camera::CameraProvider;
use camera_enhance::backends::enhance::SuperResolutionBackend;
use camera_enhance::backends::virtual_camera::{InjectedFault, VirtualCamera};
use camera_enhance::pipelines::photo::calibration::reduce_noise;
use camera_enhance::{
    BracketCapture, CameraLens, CaptureSession, ColorProcessingSettings, EnhanceError,
    EnhancementMethod, EnhancementPipeline, ExposedFrame, ExposureBracket, FallbackReason, Frame,
    PipelineConfig, PipelineResult, ZoomCapabilities, ZoomMethod, ZoomPlan, cancel_pair,
    merge_exposure_bracket, plan_zoom, run_capture_pipeline,
};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Super-resolution service that always fails
struct OfflineService;

impl SuperResolutionBackend for OfflineService {
    fn name(&self) -> &str {
        "offline"
    }

    fn enhance<'a>(
        &'a self,
        _frame: &'a Frame,
        _scale: f32,
    ) -> BoxFuture<'a, PipelineResult<Option<Frame>>> {
        Box::pin(async { Err(EnhanceError::ExternalService("connection refused".into())) })
    }
}

fn gradient(width: u32, height: u32) -> Frame {
    Frame::from_fn(width, height, |x, y| {
        let fx = x as f32 / (width - 1) as f32;
        let fy = y as f32 / (height - 1) as f32;
        [0.2 + 0.6 * fx, 0.2 + 0.6 * fy, 0.5]
    })
    .unwrap()
}

fn fast_config() -> PipelineConfig {
    PipelineConfig {
        stabilization_delay_ms: 0,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_identical_bracket_merges_to_input() {
    // Three identical flat-gray frames at -2, 0, +2 EV
    let gray = Frame::filled(16, 12, [0.5, 0.5, 0.5]).unwrap();
    let bracket = ExposureBracket::new(
        [-2.0, 0.0, 2.0]
            .into_iter()
            .map(|ev_offset| ExposedFrame {
                ev_offset,
                frame: gray.clone(),
            })
            .collect(),
    )
    .unwrap();

    let (merged, gain_map) =
        merge_exposure_bracket(&bracket, &ColorProcessingSettings::default()).unwrap();

    assert!(merged.max_abs_diff(&gray).unwrap() < 1e-5);
    let stats = gain_map.expect("fused brackets carry a gain map").stats();
    assert!((stats.mean - 1.0).abs() < 1e-4);
}

#[test]
fn test_telephoto_plan_for_8x_on_5x_lens() {
    let caps = ZoomCapabilities {
        has_telephoto: true,
        has_periscope: false,
        max_optical_zoom: 5.0,
        sensor_resolution_megapixels: 12.0,
    };

    let plan = plan_zoom(8.0, &caps, true).unwrap();

    assert_eq!(plan.lens, CameraLens::Telephoto);
    assert!((plan.optical_factor - 5.0).abs() < 1e-6);
    assert!((plan.digital_factor - 1.6).abs() < 1e-5);
    assert!(matches!(plan.method, ZoomMethod::HybridZoom { .. }));
}

#[tokio::test]
async fn test_failed_super_resolution_uses_local_upscale() {
    let config = PipelineConfig {
        ai_super_resolution_enabled: true,
        super_resolution_scale: 2.0,
        ..fast_config()
    };
    let pipeline = EnhancementPipeline::new(config).with_super_resolution(Arc::new(OfflineService));
    let (_handle, cancel) = cancel_pair();

    let result = pipeline
        .process(
            vec![BracketCapture::new(0.0, gradient(40, 30))],
            &ZoomPlan::identity(),
            &ColorProcessingSettings::default(),
            &cancel,
        )
        .await
        .unwrap();

    assert!(result.used_local_fallback);
    assert_eq!(result.frame.dimensions(), (80, 60));
    assert!(result.methods.contains(&EnhancementMethod::LocalUpscale));
    assert!(!result.methods.contains(&EnhancementMethod::AiSuperResolution));
    assert_eq!(result.metadata.super_resolution_service.as_deref(), Some("offline"));
}

#[test]
fn test_zero_noise_reduction_is_bit_identical() {
    let noisy = Frame::from_fn(24, 18, |x, y| {
        let v = ((x * 7 + y * 13) % 11) as f32 / 10.0;
        [v, 1.0 - v, 0.5]
    })
    .unwrap();

    let out = reduce_noise(&noisy, 0.0);

    assert_eq!(out.as_slice(), noisy.as_slice());
}

#[tokio::test]
async fn test_single_frame_capture_is_not_hdr() {
    let result = run_capture_pipeline(
        vec![BracketCapture::new(0.0, gradient(20, 20))],
        &ZoomPlan::identity(),
        &ColorProcessingSettings::default(),
    )
    .await
    .unwrap();

    assert!(!result.is_hdr);
    assert!(result.gain_map.is_none());
    assert_eq!(result.frame.dimensions(), (20, 20));
    assert!(result.methods.is_empty());
}

#[tokio::test]
async fn test_undecodable_frame_degrades_to_single_shot() {
    let captures = vec![
        BracketCapture::new(-2.0, b"not an image".to_vec()),
        BracketCapture::new(0.0, gradient(20, 20)),
        BracketCapture::new(2.0, gradient(20, 20)),
    ];

    let result = run_capture_pipeline(
        captures,
        &ZoomPlan::identity(),
        &ColorProcessingSettings::default(),
    )
    .await
    .unwrap();

    assert!(!result.is_hdr);
    assert_eq!(
        result.fallback,
        Some(FallbackReason::DecodeFailure {
            failed_evs: vec![-2.0]
        })
    );
}

#[tokio::test]
async fn test_simulated_telephoto_capture() {
    let camera = Arc::new(VirtualCamera::triple_camera(gradient(64, 48)).with_png_output(true));
    let provider: Arc<dyn CameraProvider> = camera.clone();
    let session = CaptureSession::new(provider, EnhancementPipeline::new(fast_config()));
    let (_handle, cancel) = cancel_pair();

    let result = session
        .capture(5.0, &ColorProcessingSettings::default(), &cancel)
        .await
        .unwrap();

    assert_eq!(camera.selected_lens(), Some(CameraLens::Telephoto));
    assert!((camera.zoom() - 5.0).abs() < 1e-6);
    assert_eq!(camera.captured_evs().len(), 3);
    assert!(!camera.exposure_locked());
    assert_eq!(result.frame.dimensions(), (64, 48));
    assert_eq!(result.methods, vec![EnhancementMethod::OpticalZoom]);
    assert!(matches!(
        result.metadata.zoom.method,
        ZoomMethod::OpticalZoom { .. }
    ));
}

#[tokio::test]
async fn test_simulated_capture_survives_failed_frame() {
    let camera = VirtualCamera::new(gradient(32, 24)).with_fault(2.0, InjectedFault::CaptureError);
    let session = CaptureSession::new(Arc::new(camera), EnhancementPipeline::new(fast_config()));
    let (_handle, cancel) = cancel_pair();
    // Fixed -2/0/+2 bracket so the +2 EV frame is requested
    let settings = ColorProcessingSettings {
        adaptive_hdr_enabled: false,
        ..ColorProcessingSettings::default()
    };

    let result = session.capture(1.0, &settings, &cancel).await.unwrap();

    assert!(!result.is_hdr);
    assert!(matches!(
        result.fallback,
        Some(FallbackReason::CaptureFailure { .. })
    ));
}

#[tokio::test]
async fn test_invalid_settings_rejected_before_capture() {
    let camera = Arc::new(VirtualCamera::new(gradient(16, 16)));
    let provider: Arc<dyn CameraProvider> = camera.clone();
    let session = CaptureSession::new(provider, EnhancementPipeline::new(fast_config()));
    let settings = ColorProcessingSettings {
        saturation_boost: f32::INFINITY,
        ..ColorProcessingSettings::default()
    };

    let result = session.capture(1.0, &settings, &cancel_pair().1).await;

    assert!(matches!(result, Err(EnhanceError::InvalidParameter(_))));
    assert!(camera.captured_evs().is_empty());
    assert_eq!(camera.selected_lens(), None);
}
