// SPDX-License-Identifier: MPL-2.0

//! Video enhancement
//!
//! Currently frame-rate up-conversion only; see [`interpolation`].

pub mod interpolation;

pub use interpolation::{InterpolatedSequence, InterpolationOptions, interpolate_sequence};
