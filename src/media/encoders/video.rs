// SPDX-License-Identifier: MPL-2.0

//! Frame encoder with hardware codec selection
//!
//! [`FrameEncoder`] owns one compression session for the lifetime of a
//! capture. It picks the codec from the requested profile and the installed
//! hardware, configures colour and quality properties, and submits frames.
//! Compressed output never comes back from `encode`; the backend delivers it
//! through the session's [`OutputRoute`] and [`check_encode_output`] turns
//! each delivery into a sample or an error.

use super::detection::EncoderCapabilities;
use super::registry::{OutputHandler, OutputRoute, SessionRegistry};
use super::session::{
    CompressedSample, CompressionBackend, EncodeOutput, HardwareSession, SessionParams,
    SessionProperty,
};
use crate::errors::VideoCompressionError;
use crate::media::formats::{CodecProfile, ProfileLevel, TransferProfile, VideoCodec};
use crate::media::frame::{CaptureFrame, LockMode, PixelBufferGuard};
use crate::pipelines::video::CompressionSettings;
use gstreamer as gst;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pick the profile level for a requested codec profile
///
/// HEVC profiles fall back to H.264 High when no hardware HEVC encoder is
/// present; `Avc` always uses H.264 High.
pub fn select_profile_level(
    profile: CodecProfile,
    capabilities: &dyn EncoderCapabilities,
) -> ProfileLevel {
    let wanted = match profile {
        CodecProfile::Hevc10Bit => ProfileLevel::HevcMain10Auto,
        CodecProfile::Hevc8Bit => ProfileLevel::HevcMainAuto,
        CodecProfile::Avc => return ProfileLevel::H264HighAuto,
    };

    if capabilities.has_hardware_encoder(VideoCodec::Hevc) {
        wanted
    } else {
        info!(
            requested = ?profile,
            "No hardware HEVC encoder, falling back to H.264 High"
        );
        ProfileLevel::H264HighAuto
    }
}

/// Session properties for a profile level, quality and transfer profile
///
/// The keyframe interval is always 1 so every sample is independently
/// decodable.
pub fn session_properties(
    profile_level: ProfileLevel,
    quality: f32,
    transfer: TransferProfile,
) -> Vec<SessionProperty> {
    let color = transfer.color_description();
    let mut properties = vec![
        SessionProperty::ProfileLevel(profile_level),
        SessionProperty::RealTime(false),
        SessionProperty::MaxKeyFrameInterval(1),
        SessionProperty::Quality(quality),
        SessionProperty::ColorPrimaries(color.primaries),
        SessionProperty::TransferFunction(color.transfer),
        SessionProperty::YCbCrMatrix(color.matrix),
    ];
    if let Some(full_range) = color.full_range {
        properties.push(SessionProperty::FullRangeVideo(full_range));
    }
    properties
}

/// Validate one encode output
///
/// Checks run in order: backend status, dropped frame, missing sample,
/// payload not ready. The first failing check decides the error.
pub fn check_encode_output(output: EncodeOutput) -> Result<CompressedSample, VideoCompressionError> {
    if let Err(e) = output.status {
        warn!(error = %e, "Encoder reported failure status");
        return Err(VideoCompressionError::CompressionFailure);
    }
    if output.flags.frame_dropped {
        warn!("Encoder dropped the frame");
        return Err(VideoCompressionError::CompressionFailure);
    }
    let Some(sample) = output.sample else {
        warn!("Encoder output carried no sample");
        return Err(VideoCompressionError::CompressionFailure);
    };
    if !sample.data_ready {
        warn!(pts = %sample.pts, "Encoded sample payload not ready");
        return Err(VideoCompressionError::CompressionFailure);
    }
    Ok(sample)
}

/// Owner of one hardware compression session
pub struct FrameEncoder {
    session: Option<Box<dyn HardwareSession>>,
    route: OutputRoute,
    registry: Arc<SessionRegistry>,
    /// Kept alive while the route is registered
    handler: Option<Arc<dyn OutputHandler>>,
    profile_level: ProfileLevel,
    expecting_single_frame: bool,
    single_frame_duration: gst::ClockTime,
    frames_submitted: u64,
}

impl FrameEncoder {
    /// Create and configure a session sized for `frame`
    pub fn open(
        frame: &CaptureFrame,
        settings: &CompressionSettings,
        backend: &dyn CompressionBackend,
        capabilities: &dyn EncoderCapabilities,
        registry: &Arc<SessionRegistry>,
        handler: Arc<dyn OutputHandler>,
    ) -> Result<Self, VideoCompressionError> {
        let Some(image) = frame.image.as_ref() else {
            error!("Cannot size a compression session without an image");
            return Err(VideoCompressionError::SessionInitFailure);
        };

        let profile_level = select_profile_level(settings.codec_profile, capabilities);
        let params = SessionParams {
            width: image.width(),
            height: image.height(),
            source_format: image.format(),
            codec: profile_level.codec(),
        };

        info!(
            width = params.width,
            height = params.height,
            format = ?params.source_format,
            profile = ?profile_level,
            transfer = ?settings.transfer_profile,
            "Opening compression session"
        );

        let token = registry.register(&handler);
        let route = OutputRoute::new(Arc::clone(registry), token);

        let session = match backend.create_session(&params, route.clone()) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "Failed to create compression session");
                registry.unregister(token);
                return Err(VideoCompressionError::SessionInitFailure);
            }
        };

        let mut encoder = Self {
            session: Some(session),
            route,
            registry: Arc::clone(registry),
            handler: Some(handler),
            profile_level,
            expecting_single_frame: settings.expecting_single_frame,
            single_frame_duration: settings.single_frame_duration(),
            frames_submitted: 0,
        };

        // Dropping `encoder` on error invalidates and unregisters
        encoder.configure(settings.quality, settings.transfer_profile)?;
        Ok(encoder)
    }

    fn configure(
        &mut self,
        quality: f32,
        transfer: TransferProfile,
    ) -> Result<(), VideoCompressionError> {
        let session = self
            .session
            .as_mut()
            .ok_or(VideoCompressionError::NoCompressSession)?;

        for property in session_properties(self.profile_level, quality, transfer) {
            match session.set_property(property) {
                Ok(()) => debug!(property = property.name(), value = ?property, "Set session property"),
                Err(e) => warn!(
                    property = property.name(),
                    error = %e,
                    "Session rejected property, continuing"
                ),
            }
        }

        session.prepare_to_encode().map_err(|e| {
            error!(error = %e, "Failed to prepare compression session");
            VideoCompressionError::SessionInitFailure
        })
    }

    /// Codec of the compressed stream
    pub fn codec(&self) -> VideoCodec {
        self.profile_level.codec()
    }

    pub fn profile_level(&self) -> ProfileLevel {
        self.profile_level
    }

    /// Submit one frame
    pub fn encode(&mut self, frame: &CaptureFrame) -> Result<(), VideoCompressionError> {
        self.encode_with(frame, |_| {})
    }

    /// Submit one frame, then run `after_submit` while the pixels are still
    /// locked
    ///
    /// `after_submit` runs whether or not the backend accepted the frame, as
    /// long as the pixels could be locked.
    pub fn encode_with<F>(
        &mut self,
        frame: &CaptureFrame,
        after_submit: F,
    ) -> Result<(), VideoCompressionError>
    where
        F: FnOnce(&PixelBufferGuard<'_>),
    {
        let image = frame
            .image
            .as_ref()
            .ok_or(VideoCompressionError::ImageMissing)?;
        let session = self
            .session
            .as_mut()
            .ok_or(VideoCompressionError::NoCompressSession)?;

        let duration = if self.expecting_single_frame {
            Some(self.single_frame_duration)
        } else {
            frame.duration
        };

        let pixels = image.lock(LockMode::ReadWrite)?;
        let submitted = session
            .encode_frame(&pixels, frame.pts, duration)
            .map_err(|e| {
                error!(pts = %frame.pts, error = %e, "Encoder rejected frame");
                VideoCompressionError::CompressionFailure
            });
        after_submit(&pixels);
        drop(pixels);

        submitted?;
        self.frames_submitted += 1;
        debug!(
            pts = %frame.pts,
            duration = ?duration,
            count = self.frames_submitted,
            "Submitted frame"
        );
        Ok(())
    }

    /// Flush all pending frames and close the session
    ///
    /// Every output of the session has been delivered when this returns.
    pub fn complete(&mut self) -> Result<(), VideoCompressionError> {
        let mut session = self
            .session
            .take()
            .ok_or(VideoCompressionError::NoCompressSession)?;

        info!(frames = self.frames_submitted, "Completing compression session");
        let flushed = session.complete_frames(None).map_err(|e| {
            error!(error = %e, "Failed to flush compression session");
            VideoCompressionError::CompressionFailure
        });

        session.invalidate();
        self.release_route();
        flushed
    }

    fn release_route(&mut self) {
        self.registry.unregister(self.route.token());
        self.handler = None;
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            debug!("Invalidating compression session on drop");
            session.invalidate();
            self.release_route();
        }
    }
}

impl std::fmt::Debug for FrameEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEncoder")
            .field("open", &self.session.is_some())
            .field("route", &self.route)
            .field("profile_level", &self.profile_level)
            .field("frames_submitted", &self.frames_submitted)
            .finish()
    }
}
