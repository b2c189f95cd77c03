// SPDX-License-Identifier: MPL-2.0

//! Still image side channel
//!
//! ```text
//! Locked capture buffer → RGB conversion → Orientation → JPEG → Disk
//! ```
//!
//! The still image is produced from the same frame as the video, while the
//! frame is locked for encoding. Failures are logged and never reach the
//! compression completion.

pub mod encoding;

pub use encoding::{EncodedImage, StillImageEncoder};
