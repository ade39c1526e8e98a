// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for hardware and external services
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Pipeline Layer                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │               Backend Layer                 │
//! │  ┌─────────────┐    ┌──────────────────┐    │
//! │  │   Camera    │    │     Enhance      │    │
//! │  │  (trait)    │    │ (SR, interp.)    │    │
//! │  └─────────────┘    └──────────────────┘    │
//! │  ┌─────────────┐                            │
//! │  │  Virtual    │                            │
//! │  │  camera     │                            │
//! │  └─────────────┘                            │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Camera provider trait and zoom capability detection
//! - [`enhance`]: Super-resolution and frame interpolation services
//! - [`virtual_camera`]: Simulated camera backed by a still image

pub mod camera;
pub mod enhance;
pub mod virtual_camera;
