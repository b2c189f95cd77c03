// SPDX-License-Identifier: MPL-2.0

//! hlgcam - single-frame HDR capture-to-video compression
//!
//! This library turns a captured frame into a finalized one-track video
//! container (HEVC 10-bit HLG by default) plus an optional oriented JPEG of
//! the same frame.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`media`]: Frames, encoder sessions, formats and orientation
//! - [`pipelines`]: The compression pipeline and the still image side channel
//! - [`config`]: User configuration handling
//! - [`storage`]: Temporary outputs and committing them to disk
//!
//! # Example
//!
//! ```ignore
//! let frame = CaptureFrame::new(pixels, gst::ClockTime::ZERO);
//! let artifact = compress_single_frame(
//!     frame,
//!     CompressionSettings::default(),
//!     PipelineBackends::gstreamer(),
//! )
//! .await?;
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use constants::QualityPreset;
pub use errors::{AppError, AppResult, VideoCompressionError};
pub use media::{CaptureFrame, ImageOrientation, PixelBuffer, PixelFormat, VideoOrientation};
pub use pipelines::video::{
    CompressionPipeline, CompressionSettings, PipelineBackends, PipelineState,
    compress_single_frame,
};
pub use storage::OutputArtifact;
