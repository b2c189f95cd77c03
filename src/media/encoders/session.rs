// SPDX-License-Identifier: MPL-2.0

//! Hardware compression session abstraction
//!
//! A [`CompressionBackend`] creates stateful [`HardwareSession`]s. Sessions
//! accept raw frames and emit compressed output asynchronously on their own
//! context through an [`OutputRoute`]; the caller never receives output as a
//! return value.

use super::registry::OutputRoute;
use crate::errors::{BackendError, BackendResult};
use crate::media::formats::color::{ColorPrimaries, TransferFunction, YCbCrMatrix};
use crate::media::formats::{ProfileLevel, VideoCodec};
use crate::media::frame::{PixelBufferGuard, PixelFormat};
use gstreamer as gst;

/// Parameters fixed at session creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub width: u32,
    pub height: u32,
    /// Layout of the raw frames that will be submitted
    pub source_format: PixelFormat,
    pub codec: VideoCodec,
}

/// A session property set between creation and `prepare_to_encode`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionProperty {
    ProfileLevel(ProfileLevel),
    RealTime(bool),
    MaxKeyFrameInterval(u32),
    /// Quality factor in 0.0..=1.0
    Quality(f32),
    ColorPrimaries(ColorPrimaries),
    TransferFunction(TransferFunction),
    YCbCrMatrix(YCbCrMatrix),
    FullRangeVideo(bool),
}

impl SessionProperty {
    /// Short property name for logging
    pub fn name(&self) -> &'static str {
        match self {
            SessionProperty::ProfileLevel(_) => "profile-level",
            SessionProperty::RealTime(_) => "real-time",
            SessionProperty::MaxKeyFrameInterval(_) => "max-key-frame-interval",
            SessionProperty::Quality(_) => "quality",
            SessionProperty::ColorPrimaries(_) => "color-primaries",
            SessionProperty::TransferFunction(_) => "transfer-function",
            SessionProperty::YCbCrMatrix(_) => "ycbcr-matrix",
            SessionProperty::FullRangeVideo(_) => "full-range-video",
        }
    }
}

/// Flags attached to each encode output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeInfoFlags {
    /// The encoder dropped the frame instead of compressing it
    pub frame_dropped: bool,
}

/// One compressed access unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedSample {
    pub data: Vec<u8>,
    pub pts: gst::ClockTime,
    pub duration: Option<gst::ClockTime>,
    pub keyframe: bool,
    /// Whether the payload is complete and may be muxed
    pub data_ready: bool,
    pub codec: VideoCodec,
}

/// Result of compressing one frame, delivered through the output route
#[derive(Debug, Clone)]
pub struct EncodeOutput {
    pub status: Result<(), BackendError>,
    pub flags: EncodeInfoFlags,
    pub sample: Option<CompressedSample>,
}

impl EncodeOutput {
    /// A successful output carrying a sample
    pub fn sample(sample: CompressedSample) -> Self {
        Self {
            status: Ok(()),
            flags: EncodeInfoFlags::default(),
            sample: Some(sample),
        }
    }

    /// A failed output without sample
    pub fn failed(error: BackendError) -> Self {
        Self {
            status: Err(error),
            flags: EncodeInfoFlags::default(),
            sample: None,
        }
    }

    /// An output reporting that the frame was dropped
    pub fn dropped() -> Self {
        Self {
            status: Ok(()),
            flags: EncodeInfoFlags {
                frame_dropped: true,
            },
            sample: None,
        }
    }
}

/// Factory for hardware compression sessions
pub trait CompressionBackend: Send + Sync {
    /// Create a session whose outputs are delivered through `route`
    fn create_session(
        &self,
        params: &SessionParams,
        route: OutputRoute,
    ) -> BackendResult<Box<dyn HardwareSession>>;
}

/// A stateful compression session
pub trait HardwareSession: Send {
    fn set_property(&mut self, property: SessionProperty) -> BackendResult<()>;

    /// Allocate encoder resources once all properties are set
    fn prepare_to_encode(&mut self) -> BackendResult<()>;

    /// Submit one frame; output arrives later through the route
    fn encode_frame(
        &mut self,
        pixels: &PixelBufferGuard<'_>,
        pts: gst::ClockTime,
        duration: Option<gst::ClockTime>,
    ) -> BackendResult<()>;

    /// Block until every frame with a timestamp up to `until` has been
    /// emitted. `None` flushes everything.
    fn complete_frames(&mut self, until: Option<gst::ClockTime>) -> BackendResult<()>;

    /// Release the session; no output is delivered afterwards
    fn invalidate(&mut self);
}
