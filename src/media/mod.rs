// SPDX-License-Identifier: MPL-2.0

//! Media processing for the compression pipeline
//!
//! # Frames
//!
//! Capture frames arrive as lockable pixel buffers ([`frame`]) in RGBA,
//! 16-bit RGBA, NV12 or P010 layout.
//!
//! # Video Encoding
//!
//! The [`encoders`] module owns the compression session: codec selection
//! with hardware priority, HDR colour properties and asynchronous output
//! routing.
//!
//! # Formats
//!
//! The [`formats`] module provides codec/container metadata, the colour
//! description of each transfer profile, and CPU pixel conversions for the
//! still image.
//!
//! # Modules
//!
//! - [`encoders`]: Compression sessions and encoder detection
//! - [`formats`]: Codec metadata, colour descriptions and conversions
//! - [`frame`]: Capture frames and pixel buffers
//! - [`orientation`]: Track transforms and still image orientation

pub mod encoders;
pub mod formats;
pub mod frame;
pub mod orientation;

// Re-export commonly used types
pub use frame::{CaptureFrame, LockMode, PixelBuffer, PixelBufferGuard, PixelFormat};
pub use orientation::{ImageOrientation, Transform, VideoOrientation};
