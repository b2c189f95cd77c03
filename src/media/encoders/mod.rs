// SPDX-License-Identifier: MPL-2.0

//! Video compression sessions and encoder selection
//!
//! This module provides:
//! - The hardware session abstraction ([`CompressionBackend`], [`HardwareSession`])
//! - Token based output routing ([`SessionRegistry`], [`OutputRoute`])
//! - Hardware encoder detection and codec fallback
//! - [`FrameEncoder`], the owner of one compression session
//! - A GStreamer implementation of the backend

pub mod detection;
pub mod gst_backend;
pub mod registry;
pub mod session;
pub mod video;

// Re-export commonly used types
pub use detection::{EncoderCapabilities, GstEncoderCapabilities, log_available_encoders};
pub use gst_backend::GstCompressionBackend;
pub use registry::{OutputHandler, OutputRoute, SessionRegistry, SessionToken};
pub use session::{
    CompressedSample, CompressionBackend, EncodeInfoFlags, EncodeOutput, HardwareSession,
    SessionParams, SessionProperty,
};
pub use video::{FrameEncoder, check_encode_output, select_profile_level};
