// SPDX-License-Identifier: MPL-2.0

//! GStreamer compression backend
//!
//! Each session is a small pipeline:
//!
//! ```text
//! appsrc ! videoconvert ! capsfilter(colorimetry) ! <encoder>
//!        ! capsfilter(profile, byte-stream, au) ! appsink
//! ```
//!
//! For HDR targets the converter remaps the transfer function and primaries
//! of the input instead of relabelling its code values.
//!
//! Encoded access units are pulled on the appsink streaming thread and
//! delivered through the session's output route.

use super::detection::{EncoderElement, find_encoder};
use super::registry::OutputRoute;
use super::session::{
    CompressedSample, CompressionBackend, EncodeOutput, HardwareSession, SessionParams,
    SessionProperty,
};
use crate::constants::{pipeline as limits, quality_to_quantizer, timing};
use crate::errors::{BackendError, BackendResult};
use crate::media::formats::color::{
    ColorDescription, ColorPrimaries, TransferFunction, YCbCrMatrix,
};
use crate::media::formats::{ProfileLevel, VideoCodec};
use crate::media::frame::PixelBufferGuard;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use tracing::{debug, error, info, warn};

/// Properties that name the keyframe interval on the supported encoders
const KEYFRAME_INTERVAL_PROPERTIES: &[&str] = &[
    "key-int-max",
    "keyframe-period",
    "gop-size",
    "max-keyframe-interval",
];

/// `videoconvert` properties for a target colour description
///
/// The converter defaults (`none`) only relabel colorimetry, which would tag
/// SDR code values as HLG or PQ.
fn converter_modes(target: Option<&ColorDescription>) -> &'static [(&'static str, &'static str)] {
    match target {
        Some(description) if description.is_hdr() => {
            &[("gamma-mode", "remap"), ("primaries-mode", "fast")]
        }
        _ => &[],
    }
}

/// Backend creating sessions on the best installed encoder element
#[derive(Debug, Default, Clone, Copy)]
pub struct GstCompressionBackend;

impl CompressionBackend for GstCompressionBackend {
    fn create_session(
        &self,
        params: &SessionParams,
        route: OutputRoute,
    ) -> BackendResult<Box<dyn HardwareSession>> {
        gst::init()?;

        let element = find_encoder(params.codec).ok_or_else(|| {
            BackendError::NotAvailable(format!("No {} encoder installed", params.codec))
        })?;

        let encoder = gst::ElementFactory::make(element.element_name)
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!(
                    "Failed to create encoder {}: {}",
                    element.element_name, e
                ))
            })?;

        info!(
            encoder = element.element_name,
            hardware = element.is_hardware,
            codec = %params.codec,
            "Created compression session"
        );

        Ok(Box::new(GstHardwareSession {
            params: *params,
            element,
            encoder,
            route,
            color: PendingColor::default(),
            profile_level: None,
            running: None,
        }))
    }
}

/// Colour properties collected until the pipeline is built
#[derive(Debug, Default, Clone, Copy)]
struct PendingColor {
    primaries: Option<ColorPrimaries>,
    transfer: Option<TransferFunction>,
    matrix: Option<YCbCrMatrix>,
    full_range: Option<bool>,
}

impl PendingColor {
    fn description(&self) -> Option<ColorDescription> {
        Some(ColorDescription {
            primaries: self.primaries?,
            transfer: self.transfer?,
            matrix: self.matrix?,
            full_range: self.full_range,
        })
    }
}

struct RunningPipeline {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
}

/// One encoder pipeline
pub struct GstHardwareSession {
    params: SessionParams,
    element: EncoderElement,
    encoder: gst::Element,
    route: OutputRoute,
    color: PendingColor,
    profile_level: Option<ProfileLevel>,
    running: Option<RunningPipeline>,
}

impl GstHardwareSession {
    fn set_str(&self, name: &str, value: &str) -> BackendResult<()> {
        if !self.encoder.has_property(name) {
            return Err(BackendError::Rejected(format!(
                "{} has no property {}",
                self.element.element_name, name
            )));
        }
        self.encoder
            .try_set_property_from_str(name, value)
            .map_err(|e| {
                BackendError::Rejected(format!(
                    "{}: {}={} refused: {}",
                    self.element.element_name, name, value, e
                ))
            })
    }

    fn apply_keyframe_interval(&self, interval: u32) -> BackendResult<()> {
        let name = KEYFRAME_INTERVAL_PROPERTIES
            .iter()
            .find(|name| self.encoder.has_property(name))
            .ok_or_else(|| {
                BackendError::Rejected(format!(
                    "{} has no keyframe interval control",
                    self.element.element_name
                ))
            })?;
        self.set_str(name, &interval.to_string())
    }

    fn apply_quality(&self, quality: f32) -> BackendResult<()> {
        let qp = quality_to_quantizer(quality).to_string();
        match self.element.element_name {
            "x264enc" => {
                self.set_str("pass", "quant")?;
                self.set_str("quantizer", &qp)
            }
            "x265enc" => self.set_str("qp", &qp),
            "vah264enc" | "vah265enc" => {
                self.set_str("rate-control", "cqp")?;
                self.set_str("qpi", &qp)
            }
            "vaapih264enc" | "vaapih265enc" => {
                self.set_str("rate-control", "cqp")?;
                self.set_str("init-qp", &qp)
            }
            "nvh264enc" | "nvh265enc" => {
                self.set_str("rc-mode", "constqp")?;
                self.set_str("qp-const", &qp)
            }
            "qsvh264enc" | "qsvh265enc" => {
                self.set_str("rate-control", "cqp")?;
                self.set_str("qp-i", &qp)
            }
            "vtenc_h264" | "vtenc_h265" => self.set_str("quality", &format!("{:.3}", quality)),
            other => Err(BackendError::Rejected(format!(
                "{} has no quality control",
                other
            ))),
        }
    }

    fn apply_real_time(&self, real_time: bool) -> BackendResult<()> {
        match self.element.element_name {
            "vtenc_h264" | "vtenc_h265" => self.set_str("realtime", &real_time.to_string()),
            "x264enc" if real_time => self.set_str("tune", "zerolatency"),
            "openh264enc" if real_time => self.set_str("usage-type", "camera"),
            // Offline encoding is the default everywhere else
            _ => Ok(()),
        }
    }

    fn make(factory: &str) -> BackendResult<gst::Element> {
        gst::ElementFactory::make(factory).build().map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to create {}: {}", factory, e))
        })
    }

    fn build_pipeline(&self) -> BackendResult<RunningPipeline> {
        let codec = self.params.codec;
        let profile_level = self.profile_level.unwrap_or(match codec {
            VideoCodec::Hevc => ProfileLevel::HevcMainAuto,
            VideoCodec::H264 => ProfileLevel::H264HighAuto,
        });

        let input_caps = gst::Caps::builder("video/x-raw")
            .field("format", self.params.source_format.to_gst_format_string())
            .field("width", self.params.width as i32)
            .field("height", self.params.height as i32)
            .field("framerate", gst::Fraction::new(0, 1))
            .build();

        let appsrc = gst_app::AppSrc::builder()
            .caps(&input_caps)
            .format(gst::Format::Time)
            .is_live(false)
            .block(true)
            .max_bytes(limits::ENCODER_QUEUE_MAX_BYTES)
            .build();

        let description = self.color.description();
        let videoconvert = Self::make("videoconvert")?;
        for (name, value) in converter_modes(description.as_ref()) {
            if !videoconvert.has_property(name) {
                warn!(property = name, "videoconvert cannot convert colour, relabelling only");
                continue;
            }
            if let Err(e) = videoconvert.try_set_property_from_str(name, value) {
                warn!(property = name, value, error = %e, "videoconvert refused colour mode");
            }
        }

        let mut raw_caps = gst::Caps::builder("video/x-raw");
        if profile_level.is_10bit() {
            raw_caps = raw_caps.field("format", gst::List::new(["P010_10LE", "I420_10LE"]));
        }
        if let Some(description) = description {
            let colorimetry = description
                .gst_colorimetry()
                .map_err(BackendError::InitializationFailed)?;
            debug!(colorimetry = %colorimetry, "Encoder input colorimetry");
            raw_caps = raw_caps.field("colorimetry", colorimetry.to_string());
        }
        let raw_filter = gst::ElementFactory::make("capsfilter")
            .property("caps", raw_caps.build())
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create capsfilter: {}", e))
            })?;

        let encoded_caps = gst::Caps::builder(codec.caps_name())
            .field("profile", profile_level.caps_profile())
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .build();
        let encoded_filter = gst::ElementFactory::make("capsfilter")
            .property("caps", &encoded_caps)
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create capsfilter: {}", e))
            })?;

        let appsink = gst_app::AppSink::builder().sync(false).build();
        let route = self.route.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    route.deliver(encode_output_from(&sample, codec));
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        let pipeline = gst::Pipeline::new();
        let elements = [
            appsrc.upcast_ref(),
            &videoconvert,
            &raw_filter,
            &self.encoder,
            &encoded_filter,
            appsink.upcast_ref(),
        ];
        pipeline.add_many(elements).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to add elements: {}", e))
        })?;
        gst::Element::link_many(elements).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to link elements: {}", e))
        })?;

        Ok(RunningPipeline { pipeline, appsrc })
    }

    fn check_bus_error(pipeline: &gst::Pipeline) -> BackendResult<()> {
        let Some(bus) = pipeline.bus() else {
            return Ok(());
        };
        if let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    source = ?err.src().map(|s| s.name()),
                    "Encoder pipeline error"
                );
                return Err(BackendError::Other(err.error().to_string()));
            }
        }
        Ok(())
    }
}

/// Convert an appsink sample into an encode output
fn encode_output_from(sample: &gst::Sample, codec: VideoCodec) -> EncodeOutput {
    let Some(buffer) = sample.buffer() else {
        return EncodeOutput::failed(BackendError::Other("Sample without buffer".into()));
    };
    let Some(pts) = buffer.pts() else {
        return EncodeOutput::failed(BackendError::Other("Sample without timestamp".into()));
    };
    let Ok(map) = buffer.map_readable() else {
        return EncodeOutput::failed(BackendError::Other("Failed to map sample".into()));
    };

    EncodeOutput::sample(CompressedSample {
        data: map.as_slice().to_vec(),
        pts,
        duration: buffer.duration(),
        keyframe: !buffer.flags().contains(gst::BufferFlags::DELTA_UNIT),
        data_ready: !map.as_slice().is_empty(),
        codec,
    })
}

impl HardwareSession for GstHardwareSession {
    fn set_property(&mut self, property: SessionProperty) -> BackendResult<()> {
        if self.running.is_some() {
            return Err(BackendError::Rejected(
                "Session already prepared to encode".into(),
            ));
        }

        match property {
            SessionProperty::ProfileLevel(level) => {
                if level.codec() != self.params.codec {
                    return Err(BackendError::Rejected(format!(
                        "{:?} does not match session codec {}",
                        level, self.params.codec
                    )));
                }
                self.profile_level = Some(level);
                Ok(())
            }
            SessionProperty::RealTime(real_time) => self.apply_real_time(real_time),
            SessionProperty::MaxKeyFrameInterval(interval) => {
                self.apply_keyframe_interval(interval)
            }
            SessionProperty::Quality(quality) => self.apply_quality(quality),
            SessionProperty::ColorPrimaries(primaries) => {
                self.color.primaries = Some(primaries);
                Ok(())
            }
            SessionProperty::TransferFunction(transfer) => {
                self.color.transfer = Some(transfer);
                Ok(())
            }
            SessionProperty::YCbCrMatrix(matrix) => {
                self.color.matrix = Some(matrix);
                Ok(())
            }
            SessionProperty::FullRangeVideo(full_range) => {
                self.color.full_range = Some(full_range);
                Ok(())
            }
        }
    }

    fn prepare_to_encode(&mut self) -> BackendResult<()> {
        if self.running.is_some() {
            return Ok(());
        }

        let running = self.build_pipeline()?;
        running
            .pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to start encoder: {}", e))
            })?;

        debug!(encoder = self.element.element_name, "Encoder pipeline playing");
        self.running = Some(running);
        Ok(())
    }

    fn encode_frame(
        &mut self,
        pixels: &PixelBufferGuard<'_>,
        pts: gst::ClockTime,
        duration: Option<gst::ClockTime>,
    ) -> BackendResult<()> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| BackendError::Rejected("Session not prepared".into()))?;

        if pixels.width() != self.params.width
            || pixels.height() != self.params.height
            || pixels.format() != self.params.source_format
        {
            return Err(BackendError::Rejected(format!(
                "Frame {}x{} {:?} does not match session {}x{} {:?}",
                pixels.width(),
                pixels.height(),
                pixels.format(),
                self.params.width,
                self.params.height,
                self.params.source_format
            )));
        }

        let mut buffer = gst::Buffer::from_mut_slice(pixels.to_vec());
        {
            let buffer_ref = buffer.make_mut();
            buffer_ref.set_pts(pts);
            if let Some(duration) = duration {
                buffer_ref.set_duration(duration);
            }
        }

        running.appsrc.push_buffer(buffer).map_err(|e| {
            warn!(?e, "Failed to push frame to encoder");
            BackendError::Rejected(format!("Failed to push frame: {:?}", e))
        })?;

        Self::check_bus_error(&running.pipeline)
    }

    fn complete_frames(&mut self, until: Option<gst::ClockTime>) -> BackendResult<()> {
        let Some(running) = self.running.as_ref() else {
            return Ok(());
        };
        if let Some(until) = until {
            // Partial flushes are not expressible; drain everything
            debug!(until = %until, "Draining whole encoder pipeline");
        }

        running
            .appsrc
            .end_of_stream()
            .map_err(|e| BackendError::Other(format!("Failed to send EOS: {:?}", e)))?;

        let bus = running
            .pipeline
            .bus()
            .ok_or_else(|| BackendError::Other("No bus available".into()))?;
        let msg = bus
            .timed_pop_filtered(
                gst::ClockTime::from_seconds(timing::FLUSH_TIMEOUT_SECS),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            )
            .ok_or_else(|| BackendError::Timeout("Encoder did not drain".into()))?;

        match msg.view() {
            gst::MessageView::Error(err) => {
                error!(
                    error = %err.error(),
                    debug = ?err.debug(),
                    "Encoder pipeline error while draining"
                );
                Err(BackendError::Other(err.error().to_string()))
            }
            _ => {
                debug!("Encoder pipeline drained");
                Ok(())
            }
        }
    }

    fn invalidate(&mut self) {
        if let Some(running) = self.running.take() {
            if let Err(e) = running.pipeline.set_state(gst::State::Null) {
                error!(?e, "Failed to set encoder pipeline to Null");
            }
        }
    }
}

impl Drop for GstHardwareSession {
    fn drop(&mut self) {
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::encoders::registry::SessionRegistry;
    use crate::media::formats::TransferProfile;

    #[test]
    fn test_pending_color_needs_all_parts() {
        let mut color = PendingColor::default();
        assert!(color.description().is_none());
        color.primaries = Some(ColorPrimaries::Bt2020);
        color.transfer = Some(TransferFunction::Hlg);
        assert!(color.description().is_none());
        color.matrix = Some(YCbCrMatrix::Bt2020);
        color.full_range = Some(false);
        assert_eq!(
            color.description(),
            Some(TransferProfile::Hlg.color_description())
        );
    }

    #[test]
    fn test_hdr_targets_remap_colour() {
        let hlg = TransferProfile::Hlg.color_description();
        assert_eq!(
            converter_modes(Some(&hlg)),
            &[("gamma-mode", "remap"), ("primaries-mode", "fast")]
        );
        let pq = TransferProfile::Pq.color_description();
        assert_eq!(converter_modes(Some(&pq)).len(), 2);

        let sdr = TransferProfile::Sdr.color_description();
        assert!(converter_modes(Some(&sdr)).is_empty());
        assert!(converter_modes(None).is_empty());
    }

    #[test]
    #[ignore = "requires GStreamer with an H.264 or HEVC encoder"]
    fn test_create_session() {
        let registry = SessionRegistry::new();
        let handler: std::sync::Arc<dyn crate::media::encoders::registry::OutputHandler> =
            std::sync::Arc::new(NullHandler);
        let token = registry.register(&handler);
        let params = SessionParams {
            width: 64,
            height: 64,
            source_format: crate::media::frame::PixelFormat::Rgba8,
            codec: VideoCodec::H264,
        };
        let session = GstCompressionBackend.create_session(&params, OutputRoute::new(registry, token));
        assert!(session.is_ok());
    }

    struct NullHandler;

    impl crate::media::encoders::registry::OutputHandler for NullHandler {
        fn handle_output(&self, _output: EncodeOutput) {}
    }
}
