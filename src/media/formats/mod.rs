// SPDX-License-Identifier: MPL-2.0

//! Format and codec utilities
//!
//! This module provides codec/container metadata, colour descriptions for
//! HDR transfer profiles, and pixel format conversions.

pub mod codec;
pub mod color;
pub mod conversions;

pub use codec::{CodecProfile, ContainerFormat, ProfileLevel, VideoCodec};
pub use color::{ColorDescription, TransferProfile};
