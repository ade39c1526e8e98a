// SPDX-License-Identifier: GPL-3.0-only

//! Center crop and cubic resampling
//!
//! Digital zoom crops the central `1/zoom` of the frame and scales it back up
//! to the original size with a Catmull-Rom cubic filter.

use crate::errors::{EnhanceError, PipelineResult};
use crate::media::Frame;
use image::imageops::{self, FilterType};
use tracing::debug;

/// Resampling filter for every resize in the pipeline
pub const RESAMPLE_FILTER: FilterType = FilterType::CatmullRom;

/// Region of a frame, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn validate_zoom(zoom: f32) -> PipelineResult<()> {
    if zoom.is_finite() && zoom > 0.0 {
        Ok(())
    } else {
        Err(EnhanceError::invalid(format!(
            "zoom must be a positive number, got {}",
            zoom
        )))
    }
}

/// Centered crop window for a zoom factor
///
/// Zoom below 1 cannot widen the view, so the whole frame is returned.
pub fn center_rect(width: u32, height: u32, zoom: f32) -> PipelineResult<CropRect> {
    validate_zoom(zoom)?;
    let zoom = zoom.max(1.0);

    let side = |dim: u32| ((dim as f32 / zoom).round() as u32).clamp(1, dim);
    let crop_w = side(width);
    let crop_h = side(height);

    Ok(CropRect {
        x: ((width - crop_w) as f32 / 2.0).round() as u32,
        y: ((height - crop_h) as f32 / 2.0).round() as u32,
        width: crop_w,
        height: crop_h,
    })
}

fn crop_rect(frame: &Frame, rect: CropRect) -> PipelineResult<Frame> {
    let row_len = frame.width() as usize * 3;
    let mut data = Vec::with_capacity(rect.width as usize * rect.height as usize * 3);
    for y in rect.y..rect.y + rect.height {
        let start = y as usize * row_len + rect.x as usize * 3;
        data.extend_from_slice(&frame.as_slice()[start..start + rect.width as usize * 3]);
    }
    Frame::from_raw(rect.width, rect.height, data)
}

/// Crop the center of a frame without resampling
///
/// Used for high-resolution sensor crops, where the cropped region already
/// has the output resolution.
pub fn crop_center(frame: &Frame, zoom: f32) -> PipelineResult<Frame> {
    let rect = center_rect(frame.width(), frame.height(), zoom)?;
    if rect.width == frame.width() && rect.height == frame.height() {
        return Ok(frame.clone());
    }
    debug!(zoom, ?rect, "Center crop");
    crop_rect(frame, rect)
}

/// Resample a frame to an exact size
pub fn resize(frame: &Frame, width: u32, height: u32) -> PipelineResult<Frame> {
    if width == 0 || height == 0 {
        return Err(EnhanceError::invalid(format!(
            "resize target must not be empty ({}x{})",
            width, height
        )));
    }
    if frame.dimensions() == (width, height) {
        return Ok(frame.clone());
    }

    let resized = imageops::resize(&frame.to_rgb32f(), width, height, RESAMPLE_FILTER);
    Ok(Frame::from_rgb32f(resized))
}

/// Resample a frame by a uniform factor
pub fn scale(frame: &Frame, factor: f32) -> PipelineResult<Frame> {
    validate_zoom(factor)?;
    let target = |dim: u32| ((dim as f32 * factor).round() as u32).max(1);
    resize(frame, target(frame.width()), target(frame.height()))
}

/// Digital zoom: center crop then resample back to the original size
///
/// `zoom == 1` returns the frame untouched.
pub fn crop_and_resize(frame: &Frame, zoom: f32) -> PipelineResult<Frame> {
    validate_zoom(zoom)?;
    if zoom == 1.0 {
        return Ok(frame.clone());
    }

    let (width, height) = frame.dimensions();
    let rect = center_rect(width, height, zoom)?;
    debug!(zoom, ?rect, width, height, "Digital zoom");

    let cropped = crop_rect(frame, rect)?;
    resize(&cropped, width, height)
}
