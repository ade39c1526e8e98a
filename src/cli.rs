// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for the enhancement pipeline
//!
//! This module provides command-line functionality for:
//! - Enhancing exposure brackets loaded from disk
//! - Printing zoom plans
//! - Capturing from a simulated multi-lens camera

use camera_enhance::backends::camera::{CameraProvider, ZoomCapabilities};
use camera_enhance::backends::enhance::LocalUpscaler;
use camera_enhance::backends::virtual_camera::{InjectedFault, VirtualCamera};
use camera_enhance::config::{ColorPreset, Config};
use camera_enhance::pipelines::photo::hdr::bracket_evs;
use camera_enhance::pipelines::photo::{
    BracketCapture, CaptureSession, EnhancementPipeline, EnhancementResult, PipelineStage,
    StageCallback, ZoomPlanner,
};
use camera_enhance::{CancelToken, Frame, cancel_pair};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Default folder name for saving enhanced photos
const DEFAULT_SAVE_FOLDER: &str = "camera-enhance";

pub struct EnhanceArgs {
    pub inputs: Vec<PathBuf>,
    pub evs: Vec<f32>,
    pub zoom: f32,
    pub preset: Option<ColorPreset>,
    pub output: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
    pub gain_map: Option<PathBuf>,
}

pub struct SimulateArgs {
    pub input: PathBuf,
    pub zoom: f32,
    pub preset: Option<ColorPreset>,
    pub single_lens: bool,
    pub fail_evs: Vec<f32>,
    pub super_resolution: Option<f32>,
    pub output: Option<PathBuf>,
    pub metadata: Option<PathBuf>,
}

/// Load the config from an explicit path or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Enhance a bracket of images from disk
pub fn enhance(mut config: Config, args: EnhanceArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(preset) = args.preset {
        config.apply_preset(preset);
    }

    let evs = if !args.evs.is_empty() {
        if args.evs.len() != args.inputs.len() {
            return Err(format!(
                "{} EV offsets given for {} inputs",
                args.evs.len(),
                args.inputs.len()
            )
            .into());
        }
        args.evs.clone()
    } else if args.inputs.len() == 1 {
        vec![0.0]
    } else {
        bracket_evs(args.inputs.len(), config.pipeline.ev_range)?
    };

    // Undecodable files are handed to the pipeline as-is; it degrades to single-shot
    let mut captures = Vec::with_capacity(args.inputs.len());
    for (path, ev) in args.inputs.iter().zip(&evs) {
        let bytes = std::fs::read(path)?;
        println!("Loaded {} (EV {:+.1})", path.display(), ev);
        captures.push(BracketCapture::new(*ev, bytes));
    }

    // Plan as a digital zoom on a single sensor the size of the first input
    let mut capabilities = ZoomCapabilities::default();
    if let Some(path) = args.inputs.first()
        && let Ok((width, height)) = image::image_dimensions(path)
    {
        capabilities.sensor_resolution_megapixels = (width as f32 * height as f32) / 1_000_000.0;
    }
    let plan = ZoomPlanner::new(
        config.pipeline.max_digital_zoom,
        config.pipeline.high_res_crop_enabled,
    )
    .plan(args.zoom, &capabilities, false)?;
    println!("Zoom plan: {}", plan.method);

    let pipeline = EnhancementPipeline::new(config.pipeline.clone())
        .with_stage_callback(stage_printer());

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        pipeline
            .process(captures, &plan, &config.color, &CancelToken::never())
            .await
    })?;

    let output = output_path(args.output, "enhanced");
    save_result(&result, &output, args.metadata.as_deref())?;

    if let Some(path) = args.gain_map {
        match &result.gain_map {
            Some(gain_map) => {
                gain_map.to_rgb8().save(&path)?;
                println!("Gain map saved: {}", path.display());
            }
            None => println!("No gain map (single-shot result)"),
        }
    }
    Ok(())
}

/// Print the zoom plan for a target zoom
pub fn plan_zoom(
    config: &Config,
    target: f32,
    capabilities: ZoomCapabilities,
    optical_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = ZoomPlanner::new(
        config.pipeline.max_digital_zoom,
        config.pipeline.high_res_crop_enabled,
    )
    .plan(target, &capabilities, optical_enabled)?;

    println!("Target zoom:    {:.2}x", target);
    println!("Lens:           {}", plan.lens);
    println!("Optical factor: {:.2}x", plan.optical_factor);
    println!("Digital factor: {:.2}x", plan.digital_factor);
    println!("Total zoom:     {:.2}x", plan.total_zoom());
    println!("Method:         {}", plan.method);
    Ok(())
}

/// Capture from a simulated camera
pub fn simulate(mut config: Config, args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(preset) = args.preset {
        config.apply_preset(preset);
    }

    let source = Frame::from_dynamic(&image::open(&args.input)?);
    println!(
        "Scene: {} ({}x{})",
        args.input.display(),
        source.width(),
        source.height()
    );

    let mut camera = if args.single_lens {
        VirtualCamera::new(source)
    } else {
        VirtualCamera::triple_camera(source)
    };
    for ev in &args.fail_evs {
        camera = camera.with_fault(*ev, InjectedFault::CaptureError);
    }
    let provider: Arc<dyn CameraProvider> = Arc::new(camera);

    let mut pipeline_config = config.pipeline.clone();
    if let Some(scale) = args.super_resolution {
        pipeline_config.ai_super_resolution_enabled = true;
        pipeline_config.super_resolution_scale = scale;
    }
    let pipeline = EnhancementPipeline::new(pipeline_config)
        .with_super_resolution(Arc::new(LocalUpscaler))
        .with_stage_callback(stage_printer());
    let session = CaptureSession::new(provider, pipeline);

    // Ctrl+C aborts the capture
    let (handle, cancel) = cancel_pair();
    ctrlc::set_handler(move || {
        handle.cancel();
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(async {
        let plan = session.plan(args.zoom).await?;
        println!(
            "Zoom plan: {} ({} lens, {:.2}x optical)",
            plan.method, plan.lens, plan.optical_factor
        );
        session.capture(args.zoom, &config.color, &cancel).await
    })?;

    let output = output_path(args.output, "simulated");
    save_result(&result, &output, args.metadata.as_deref())
}

/// Stage listener that prints transitions
fn stage_printer() -> StageCallback {
    Arc::new(|stage: PipelineStage| {
        eprintln!("  [{}]", stage);
    })
}

/// Save the enhanced frame and optional metadata
fn save_result(
    result: &EnhancementResult,
    output: &Path,
    metadata: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    result.frame.to_rgb8().save(output)?;

    info!(
        path = %output.display(),
        width = result.frame.width(),
        height = result.frame.height(),
        "Saved enhanced frame"
    );

    println!();
    println!("Saved: {}", output.display());
    println!(
        "Size: {}x{} | HDR: {} | Frames fused: {}",
        result.frame.width(),
        result.frame.height(),
        if result.is_hdr { "yes" } else { "no" },
        result.metadata.frames_fused
    );
    let methods: Vec<String> = result.methods.iter().map(|m| m.to_string()).collect();
    if !methods.is_empty() {
        println!("Methods: {}", methods.join(", "));
    }
    if result.used_local_fallback {
        println!("Super-resolution service unavailable, used local upscale");
    }
    if let Some(reason) = &result.fallback {
        println!("Fallback: {:?}", reason);
    }
    println!("Processing time: {} ms", result.metadata.total_ms);

    if let Some(path) = metadata {
        std::fs::write(path, result.metadata.to_json()?)?;
        println!("Metadata saved: {}", path.display());
    }
    Ok(())
}

/// Output path, defaulting to a timestamped file in the pictures folder
fn output_path(output: Option<PathBuf>, prefix: &str) -> PathBuf {
    output.unwrap_or_else(|| {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        get_default_photo_dir().join(format!("{}_{}.png", prefix, timestamp))
    })
}

/// Get default photo directory
fn get_default_photo_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
