// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for photo and video enhancement
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌───────────────────┐
//! │   Bracket    │ ──▶ │  Photo Pipeline    │ ──▶ │ EnhancementResult │
//! │  (n frames)  │     │  - HDR fusion      │     │  frame + gain map │
//! │              │     │  - Tone mapping    │     │  + metadata       │
//! │              │     │  - Calibration     │     │                   │
//! │              │     │  - Zoom / SR       │     │                   │
//! └──────────────┘     └────────────────────┘     └───────────────────┘
//!
//! ┌──────────────┐     ┌────────────────────┐     ┌───────────────────┐
//! │ Frame        │ ──▶ │  Video Pipeline    │ ──▶ │ Up-converted      │
//! │ sequence     │     │  - Interpolation   │     │ sequence          │
//! └──────────────┘     └────────────────────┘     └───────────────────┘
//! ```
//!
//! # Design Principles
//!
//! 1. **Non-blocking**: CPU stages run on the blocking pool, never on the async runtime
//! 2. **Snapshotted settings**: every capture works on its own copy of the settings
//! 3. **Graceful degradation**: optional stages fall back to simpler local paths
//!
//! # Modules
//!
//! - [`photo`]: Exposure fusion, tone mapping, calibration, zoom and orchestration
//! - [`video`]: Frame-rate interpolation
//! - [`cancel`]: Cancellation handles shared by both

pub mod cancel;
pub mod photo;
pub mod video;

pub use cancel::{CancelHandle, CancelToken, cancel_pair};
