// SPDX-License-Identifier: GPL-3.0-only

//! Frame buffer shared by every pipeline stage
//!
//! Camera data arrives as 8-bit RGB. Stages work on normalized `f32` so that
//! intermediate results (merged HDR buffers, gain maps) keep their precision
//! and may exceed 1.0 until tone mapping brings them back into range.

use crate::errors::{EnhanceError, PipelineResult};
use crate::media::parallel;
use image::{DynamicImage, Rgb32FImage, RgbImage};
use std::sync::Arc;

/// Owned RGB frame with normalized `f32` channels
///
/// Frames are never mutated after construction; each stage produces a new one.
#[derive(Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Frame {
    /// Channels per pixel
    pub const CHANNELS: usize = 3;

    /// Wrap an interleaved RGB buffer
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(EnhanceError::invalid(format!(
                "frame must not be empty ({}x{})",
                width, height
            )));
        }

        let expected = width as usize * height as usize * Self::CHANNELS;
        if data.len() != expected {
            return Err(EnhanceError::invalid(format!(
                "frame buffer size mismatch: expected {}, got {}",
                expected,
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Frame with every pixel set to the same color
    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> PipelineResult<Self> {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * Self::CHANNELS)
            .collect();
        Self::from_raw(width, height, data)
    }

    /// Build a frame by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, f: F) -> PipelineResult<Self>
    where
        F: Fn(u32, u32) -> [f32; 3] + Sync,
    {
        let data = parallel::fill_rows(width, height, |y, row| {
            for (x, px) in row.chunks_exact_mut(Self::CHANNELS).enumerate() {
                px.copy_from_slice(&f(x as u32, y as u32));
            }
        });
        Self::from_raw(width, height, data)
    }

    /// Convert an 8-bit RGB image
    pub fn from_rgb8(image: &RgbImage) -> Self {
        let data = image.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            width: image.width(),
            height: image.height(),
            data,
        }
    }

    /// Take ownership of a 32-bit float RGB image
    pub fn from_rgb32f(image: Rgb32FImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    /// Decode an encoded image (JPEG, PNG, ...) into a frame
    pub fn decode(bytes: &[u8]) -> PipelineResult<Self> {
        let image = image::load_from_memory(bytes)?;
        let frame = Self::from_dynamic(&image);
        if frame.width == 0 || frame.height == 0 {
            return Err(EnhanceError::DecodeFailure("decoded image is empty".into()));
        }
        Ok(frame)
    }

    /// Convert any decoded image, dropping alpha
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageRgb32F(rgb) => Self::from_rgb32f(rgb.clone()),
            DynamicImage::ImageRgb8(rgb) => Self::from_rgb8(rgb),
            other => Self::from_rgb8(&other.to_rgb8()),
        }
    }

    /// Quantize to 8-bit RGB (clamped, rounded to nearest)
    pub fn to_rgb8(&self) -> RgbImage {
        let bytes = self
            .data
            .iter()
            .map(|&v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        // Dimensions and length are validated at construction
        RgbImage::from_raw(self.width, self.height, bytes)
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// Copy into a 32-bit float RGB image
    pub fn to_rgb32f(&self) -> Rgb32FImage {
        Rgb32FImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| Rgb32FImage::new(self.width, self.height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Interleaved channel data
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<f32> {
        self.data
    }

    /// Pixel at (x, y); coordinates must be in bounds
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Pixel with coordinates clamped to the frame edge
    #[inline]
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [f32; 3] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.pixel(x, y)
    }

    /// Iterate pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.data
            .chunks_exact(Self::CHANNELS)
            .map(|px| [px[0], px[1], px[2]])
    }

    /// Channel data of one row
    pub fn row(&self, y: u32) -> &[f32] {
        let row_len = self.width as usize * Self::CHANNELS;
        let start = y as usize * row_len;
        &self.data[start..start + row_len]
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// New frame with `map` applied to every pixel (row-parallel)
    pub fn map_pixels<F>(&self, map: F) -> Frame
    where
        F: Fn([f32; 3]) -> [f32; 3] + Sync,
    {
        Frame {
            width: self.width,
            height: self.height,
            data: parallel::map_pixels(&self.data, map),
        }
    }

    /// New frame of the same size, filled row by row (row-parallel)
    ///
    /// `fill_row(y, row)` receives the row index and the `width * 3` output
    /// channels of that row.
    pub fn fill_rows_like<F>(&self, fill_row: F) -> Frame
    where
        F: Fn(usize, &mut [f32]) + Sync,
    {
        Frame {
            width: self.width,
            height: self.height,
            data: parallel::fill_rows(self.width, self.height, fill_row),
        }
    }

    /// Largest absolute per-channel difference to another frame
    pub fn max_abs_diff(&self, other: &Frame) -> Option<f32> {
        if !self.same_dimensions(other) {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max),
        )
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("values", &self.data.len())
            .finish()
    }
}

/// Frame data as handed over by a camera provider
///
/// Providers may deliver a decoded frame or the encoded buffer they received
/// from the hardware. Decoding is deferred to the pipeline so a corrupt buffer
/// only degrades that one capture.
#[derive(Clone)]
pub enum FramePayload {
    /// Already decoded pixels
    Decoded(Frame),
    /// Encoded image bytes (JPEG, PNG, ...)
    Encoded(Arc<[u8]>),
}

impl FramePayload {
    /// Decode the payload into a frame
    pub fn decode(&self) -> PipelineResult<Frame> {
        match self {
            FramePayload::Decoded(frame) => Ok(frame.clone()),
            FramePayload::Encoded(bytes) => Frame::decode(bytes),
        }
    }

    /// Decode, consuming the payload (avoids a copy for decoded frames)
    pub fn into_frame(self) -> PipelineResult<Frame> {
        match self {
            FramePayload::Decoded(frame) => Ok(frame),
            FramePayload::Encoded(bytes) => Frame::decode(&bytes),
        }
    }
}

impl From<Frame> for FramePayload {
    fn from(frame: Frame) -> Self {
        FramePayload::Decoded(frame)
    }
}

impl From<Vec<u8>> for FramePayload {
    fn from(bytes: Vec<u8>) -> Self {
        FramePayload::Encoded(Arc::from(bytes))
    }
}

impl std::fmt::Debug for FramePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramePayload::Decoded(frame) => write!(f, "FramePayload::Decoded({:?})", frame),
            FramePayload::Encoded(bytes) => {
                write!(f, "FramePayload::Encoded({} bytes)", bytes.len())
            }
        }
    }
}
