// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines for captured frames
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Capture      │ ──▶ │  Video Pipeline   │ ──▶ │  MOV / MP4   │
//! │ Frame        │     │  - HEVC / H.264   │     │  (one track) │
//! │ (HDR pixels) │     │  - Color tagging  │     │              │
//! │              │     │  - Muxing         │     │              │
//! └──────┬───────┘     └───────────────────┘     └──────────────┘
//!        │             ┌───────────────────┐     ┌──────────────┐
//!        └───────────▶ │  Still Image      │ ──▶ │  JPEG File   │
//!                      │  - RGB + orient   │     │              │
//!                      └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Still image side channel
//! - [`video`]: Compression pipeline, container writer and worker queues

pub mod photo;
pub mod video;
