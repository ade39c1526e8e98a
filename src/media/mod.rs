// SPDX-License-Identifier: GPL-3.0-only

//! Pixel buffers and color math used by the processing pipelines
//!
//! # Modules
//!
//! - [`frame`]: Normalized RGB frame buffer and provider payloads
//! - [`color_space`]: sRGB/linear, RGB/HSV and luminance helpers
//! - [`parallel`]: Row-parallel helpers backed by rayon

pub mod color_space;
pub mod frame;
pub mod parallel;

pub use frame::{Frame, FramePayload};
