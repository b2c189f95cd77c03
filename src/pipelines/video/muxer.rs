// SPDX-License-Identifier: MPL-2.0

//! Container writing
//!
//! [`ContainerWriter`] owns one muxing session with a single pass-through
//! video track. Samples are appended in presentation order once the sink
//! reports it can take more data; finishing closes the track, ends the
//! session at an explicit time, and finalizes the file.
//!
//! The production sink is a GStreamer pipeline:
//!
//! ```text
//! appsrc(h264|h265 byte-stream) ! h26xparse ! qtmux|mp4mux ! filesink
//! ```

use crate::constants::{pipeline as limits, timing};
use crate::errors::{BackendError, BackendResult, VideoCompressionError};
use crate::media::encoders::CompressedSample;
use crate::media::formats::{ContainerFormat, VideoCodec};
use crate::media::orientation::Transform;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// The single video track of a container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackConfig {
    pub codec: VideoCodec,
    pub width: u32,
    pub height: u32,
    /// Display transform stored in the track header
    pub transform: Transform,
}

/// Terminal status of a muxing session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterStatus {
    Completed,
    Failed(String),
    Cancelled,
}

/// Factory for muxing sessions
pub trait MuxerBackend: Send + Sync {
    fn create_sink(
        &self,
        destination: &Path,
        container: ContainerFormat,
    ) -> BackendResult<Box<dyn MuxSink>>;
}

/// A muxing session writing one file
pub trait MuxSink: Send {
    fn add_track(&mut self, track: &TrackConfig) -> BackendResult<()>;
    fn start_writing(&mut self) -> BackendResult<()>;
    /// Timestamp that maps to the start of the file
    fn start_session(&mut self, at: gst::ClockTime);
    fn is_ready_for_more_media_data(&self) -> bool;
    fn append(&mut self, sample: &CompressedSample) -> BackendResult<()>;
    /// No more samples will be appended to the track
    fn mark_finished(&mut self);
    /// Timestamp at which the file ends
    fn end_session(&mut self, at: gst::ClockTime);
    fn finish_writing(&mut self) -> WriterStatus;
}

/// Owner of one muxing session
pub struct ContainerWriter {
    sink: Box<dyn MuxSink>,
    destination: PathBuf,
    poll_interval: Duration,
    ready_timeout: Duration,
    attempts: u64,
    appended: u64,
    finished: bool,
}

impl ContainerWriter {
    /// Create the sink, add the track and start the session at `start_time`
    pub fn open(
        destination: &Path,
        container: ContainerFormat,
        track: &TrackConfig,
        start_time: gst::ClockTime,
        backend: &dyn MuxerBackend,
    ) -> Result<Self, VideoCompressionError> {
        info!(
            path = %destination.display(),
            container = ?container,
            codec = %track.codec,
            rotation = track.transform.rotation_degrees(),
            "Opening container writer"
        );

        let mut sink = backend.create_sink(destination, container).map_err(|e| {
            error!(error = %e, "Failed to create container writer");
            VideoCompressionError::WriterInitFailure
        })?;

        sink.add_track(track).map_err(|e| {
            error!(error = %e, "Container refused video track");
            VideoCompressionError::NotSupported
        })?;

        sink.start_writing().map_err(|e| {
            error!(error = %e, "Failed to start container writer");
            VideoCompressionError::WriterInitFailure
        })?;
        sink.start_session(start_time);

        Ok(Self {
            sink,
            destination: destination.to_path_buf(),
            poll_interval: timing::APPEND_POLL_INTERVAL,
            ready_timeout: timing::APPEND_READY_TIMEOUT,
            attempts: 0,
            appended: 0,
            finished: false,
        })
    }

    /// Override the readiness poll interval and timeout
    pub fn with_backpressure(mut self, poll_interval: Duration, ready_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.ready_timeout = ready_timeout;
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Append attempts, successful or not
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Samples accepted by the sink
    pub fn appended(&self) -> u64 {
        self.appended
    }

    fn wait_until_ready(&self) -> Result<(), VideoCompressionError> {
        let deadline = Instant::now() + self.ready_timeout;
        while !self.sink.is_ready_for_more_media_data() {
            if Instant::now() >= deadline {
                return Err(VideoCompressionError::WriterFailure(format!(
                    "writer not ready after {:?}",
                    self.ready_timeout
                )));
            }
            std::thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    /// Append one compressed sample
    pub fn append(&mut self, sample: &CompressedSample) -> Result<(), VideoCompressionError> {
        self.attempts += 1;
        if self.finished {
            return Err(VideoCompressionError::WriterFailure(
                "append after finish".into(),
            ));
        }

        self.wait_until_ready().inspect_err(|e| {
            warn!(attempt = self.attempts, error = %e, "Writer backpressure timeout");
        })?;

        self.sink.append(sample).map_err(|e| {
            error!(pts = %sample.pts, error = %e, "Writer rejected sample");
            VideoCompressionError::WriterFailure(e.to_string())
        })?;

        self.appended += 1;
        debug!(
            pts = %sample.pts,
            bytes = sample.data.len(),
            keyframe = sample.keyframe,
            attempt = self.attempts,
            "Appended sample"
        );
        Ok(())
    }

    /// Close the track, end the session at `end_time` and finalize the file
    pub fn finish(&mut self, end_time: gst::ClockTime) -> Result<(), VideoCompressionError> {
        if self.finished {
            return Err(VideoCompressionError::WriterFailure(
                "writer already finished".into(),
            ));
        }
        self.finished = true;

        self.sink.mark_finished();
        self.sink.end_session(end_time);

        match self.sink.finish_writing() {
            WriterStatus::Completed => {
                info!(
                    path = %self.destination.display(),
                    samples = self.appended,
                    end = %end_time,
                    "Container finalized"
                );
                Ok(())
            }
            WriterStatus::Failed(reason) => {
                error!(reason = %reason, "Container finalization failed");
                Err(VideoCompressionError::WriterFailure(reason))
            }
            WriterStatus::Cancelled => {
                error!("Container finalization cancelled");
                Err(VideoCompressionError::WriterFailure("cancelled".into()))
            }
        }
    }
}

impl std::fmt::Debug for ContainerWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerWriter")
            .field("destination", &self.destination)
            .field("attempts", &self.attempts)
            .field("appended", &self.appended)
            .field("finished", &self.finished)
            .finish()
    }
}

/// Backend creating GStreamer mux pipelines
#[derive(Debug, Default, Clone, Copy)]
pub struct GstMuxerBackend;

impl MuxerBackend for GstMuxerBackend {
    fn create_sink(
        &self,
        destination: &Path,
        container: ContainerFormat,
    ) -> BackendResult<Box<dyn MuxSink>> {
        gst::init()?;

        if gst::ElementFactory::find(container.muxer_name()).is_none() {
            return Err(BackendError::NotAvailable(format!(
                "Muxer {} not installed",
                container.muxer_name()
            )));
        }

        Ok(Box::new(GstMuxSink {
            destination: destination.to_path_buf(),
            container,
            pipeline: None,
            start: gst::ClockTime::ZERO,
            end: None,
            held: None,
            finished: false,
        }))
    }
}

struct MuxPipeline {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
}

/// GStreamer implementation of [`MuxSink`]
///
/// The most recent sample is held back so its duration can be fitted to
/// the session end time.
pub struct GstMuxSink {
    destination: PathBuf,
    container: ContainerFormat,
    pipeline: Option<MuxPipeline>,
    start: gst::ClockTime,
    end: Option<gst::ClockTime>,
    held: Option<gst::Buffer>,
    finished: bool,
}

impl GstMuxSink {
    fn make(factory: &str) -> BackendResult<gst::Element> {
        gst::ElementFactory::make(factory).build().map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to create {}: {}", factory, e))
        })
    }

    fn build(&self, track: &TrackConfig) -> BackendResult<MuxPipeline> {
        let caps = gst::Caps::builder(track.codec.caps_name())
            .field("stream-format", "byte-stream")
            .field("alignment", "au")
            .field("width", track.width as i32)
            .field("height", track.height as i32)
            .field("framerate", gst::Fraction::new(0, 1))
            .build();

        let appsrc = gst_app::AppSrc::builder()
            .caps(&caps)
            .format(gst::Format::Time)
            .is_live(false)
            .max_bytes(limits::MUX_QUEUE_MAX_BYTES)
            .build();

        let parser = Self::make(track.codec.parser_name())?;
        let muxer = Self::make(self.container.muxer_name())?;

        // Seekable output: duration and index written at finalization
        if muxer.has_property("streamable") {
            muxer.set_property("streamable", false);
        }

        let location = self.destination.to_str().ok_or_else(|| {
            BackendError::InitializationFailed(format!(
                "Non UTF-8 output path {}",
                self.destination.display()
            ))
        })?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", location)
            .build()
            .map_err(|e| {
                BackendError::InitializationFailed(format!("Failed to create filesink: {}", e))
            })?;

        let pipeline = gst::Pipeline::new();
        let elements = [appsrc.upcast_ref(), &parser, &muxer, &filesink];
        pipeline.add_many(elements).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to add elements: {}", e))
        })?;
        gst::Element::link_many(elements).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to link elements: {}", e))
        })?;

        Ok(MuxPipeline { pipeline, appsrc })
    }

    fn push(&self, buffer: gst::Buffer) -> BackendResult<()> {
        let mux = self
            .pipeline
            .as_ref()
            .ok_or_else(|| BackendError::Rejected("No video track".into()))?;
        mux.appsrc
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| BackendError::Rejected(format!("Failed to push sample: {:?}", e)))
    }

    fn wait_for_eos(pipeline: &gst::Pipeline) -> WriterStatus {
        let Some(bus) = pipeline.bus() else {
            return WriterStatus::Failed("No bus available".into());
        };
        match bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(timing::FINALIZE_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        ) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        error = %err.error(),
                        debug = ?err.debug(),
                        source = ?err.src().map(|s| s.name()),
                        "Muxer pipeline error"
                    );
                    WriterStatus::Failed(err.error().to_string())
                }
                _ => WriterStatus::Completed,
            },
            None => WriterStatus::Failed("Timed out finalizing container".into()),
        }
    }
}

impl MuxSink for GstMuxSink {
    fn add_track(&mut self, track: &TrackConfig) -> BackendResult<()> {
        if self.pipeline.is_some() {
            return Err(BackendError::Rejected(
                "Container already has a video track".into(),
            ));
        }

        let mux = self.build(track)?;

        let mut tags = gst::TagList::new();
        tags.make_mut().add::<gst::tags::ImageOrientation>(
            &track.transform.orientation_tag(),
            gst::TagMergeMode::Replace,
        );
        if !mux.appsrc.send_event(gst::event::Tag::new(tags)) {
            warn!("Muxer did not accept orientation tag");
        }

        self.pipeline = Some(mux);
        Ok(())
    }

    fn start_writing(&mut self) -> BackendResult<()> {
        let mux = self
            .pipeline
            .as_ref()
            .ok_or_else(|| BackendError::InitializationFailed("No video track".into()))?;
        mux.pipeline.set_state(gst::State::Playing).map_err(|e| {
            BackendError::InitializationFailed(format!("Failed to start muxer: {}", e))
        })?;
        debug!(path = %self.destination.display(), "Muxer pipeline playing");
        Ok(())
    }

    fn start_session(&mut self, at: gst::ClockTime) {
        self.start = at;
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        self.pipeline
            .as_ref()
            .is_some_and(|mux| mux.appsrc.current_level_bytes() < limits::MUX_QUEUE_MAX_BYTES)
    }

    fn append(&mut self, sample: &CompressedSample) -> BackendResult<()> {
        if self.finished {
            return Err(BackendError::Rejected("Track already finished".into()));
        }

        let mut buffer = gst::Buffer::from_mut_slice(sample.data.clone());
        {
            let buffer_ref = buffer.make_mut();
            buffer_ref.set_pts(sample.pts.saturating_sub(self.start));
            if let Some(duration) = sample.duration {
                buffer_ref.set_duration(duration);
            }
            if !sample.keyframe {
                buffer_ref.set_flags(gst::BufferFlags::DELTA_UNIT);
            }
        }

        if let Some(previous) = self.held.replace(buffer) {
            self.push(previous)?;
        }
        Ok(())
    }

    fn mark_finished(&mut self) {
        self.finished = true;
    }

    fn end_session(&mut self, at: gst::ClockTime) {
        self.end = Some(at.saturating_sub(self.start));
    }

    fn finish_writing(&mut self) -> WriterStatus {
        let Some(mut held) = self.held.take() else {
            return self.drain();
        };

        if let (Some(end), Some(pts)) = (self.end, held.pts()) {
            if end > pts {
                held.make_mut().set_duration(end - pts);
            }
        }
        if let Err(e) = self.push(held) {
            return WriterStatus::Failed(e.to_string());
        }
        self.drain()
    }
}

impl GstMuxSink {
    fn drain(&mut self) -> WriterStatus {
        let Some(mux) = self.pipeline.take() else {
            return WriterStatus::Cancelled;
        };

        let status = match mux.appsrc.end_of_stream() {
            Ok(_) => Self::wait_for_eos(&mux.pipeline),
            Err(e) => WriterStatus::Failed(format!("Failed to send EOS: {:?}", e)),
        };

        if let Err(e) = mux.pipeline.set_state(gst::State::Null) {
            error!(?e, "Failed to set muxer pipeline to Null");
        }
        status
    }
}

impl Drop for GstMuxSink {
    fn drop(&mut self) {
        if let Some(mux) = self.pipeline.take() {
            debug!("Dropping unfinished muxer pipeline");
            let _ = mux.pipeline.set_state(gst::State::Null);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        appended: Vec<gst::ClockTime>,
        end: Option<gst::ClockTime>,
        finished: bool,
    }

    struct ScriptedSink {
        log: Arc<Mutex<Log>>,
        ready: bool,
        status: WriterStatus,
    }

    impl MuxSink for ScriptedSink {
        fn add_track(&mut self, _track: &TrackConfig) -> BackendResult<()> {
            Ok(())
        }
        fn start_writing(&mut self) -> BackendResult<()> {
            Ok(())
        }
        fn start_session(&mut self, _at: gst::ClockTime) {}
        fn is_ready_for_more_media_data(&self) -> bool {
            self.ready
        }
        fn append(&mut self, sample: &CompressedSample) -> BackendResult<()> {
            self.log.lock().unwrap().appended.push(sample.pts);
            Ok(())
        }
        fn mark_finished(&mut self) {
            self.log.lock().unwrap().finished = true;
        }
        fn end_session(&mut self, at: gst::ClockTime) {
            self.log.lock().unwrap().end = Some(at);
        }
        fn finish_writing(&mut self) -> WriterStatus {
            self.status.clone()
        }
    }

    struct ScriptedBackend {
        log: Arc<Mutex<Log>>,
        ready: bool,
        status: WriterStatus,
    }

    impl MuxerBackend for ScriptedBackend {
        fn create_sink(
            &self,
            _destination: &Path,
            _container: ContainerFormat,
        ) -> BackendResult<Box<dyn MuxSink>> {
            Ok(Box::new(ScriptedSink {
                log: self.log.clone(),
                ready: self.ready,
                status: self.status.clone(),
            }))
        }
    }

    fn track() -> TrackConfig {
        TrackConfig {
            codec: VideoCodec::Hevc,
            width: 16,
            height: 16,
            transform: Transform::IDENTITY,
        }
    }

    fn sample(ms: u64) -> CompressedSample {
        CompressedSample {
            data: vec![1, 2, 3],
            pts: gst::ClockTime::from_mseconds(ms),
            duration: None,
            keyframe: true,
            data_ready: true,
            codec: VideoCodec::Hevc,
        }
    }

    fn open(ready: bool, status: WriterStatus) -> (ContainerWriter, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let backend = ScriptedBackend {
            log: log.clone(),
            ready,
            status,
        };
        let writer = ContainerWriter::open(
            Path::new("/tmp/unused.mov"),
            ContainerFormat::QuickTime,
            &track(),
            gst::ClockTime::ZERO,
            &backend,
        )
        .unwrap();
        (writer, log)
    }

    #[test]
    fn test_append_and_finish() {
        let (mut writer, log) = open(true, WriterStatus::Completed);
        writer.append(&sample(0)).unwrap();
        writer.append(&sample(33)).unwrap();
        writer.finish(gst::ClockTime::from_seconds(1)).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.appended.len(), 2);
        assert!(log.finished);
        assert_eq!(log.end, Some(gst::ClockTime::from_seconds(1)));
        assert_eq!(writer.attempts(), 2);
        assert_eq!(writer.appended(), 2);
    }

    #[test]
    fn test_backpressure_timeout_counts_attempt() {
        let (writer, log) = open(false, WriterStatus::Completed);
        let mut writer =
            writer.with_backpressure(Duration::from_millis(1), Duration::from_millis(20));
        let result = writer.append(&sample(0));
        assert!(matches!(result, Err(VideoCompressionError::WriterFailure(_))));
        assert_eq!(writer.attempts(), 1);
        assert_eq!(writer.appended(), 0);
        assert!(log.lock().unwrap().appended.is_empty());
    }

    #[test]
    fn test_failed_finalize_maps_to_writer_failure() {
        let (mut writer, _log) = open(true, WriterStatus::Failed("disk full".into()));
        assert_eq!(
            writer.finish(gst::ClockTime::ZERO),
            Err(VideoCompressionError::WriterFailure("disk full".into()))
        );
        // Second finish is refused
        assert!(writer.finish(gst::ClockTime::ZERO).is_err());
    }

    #[test]
    fn test_cancelled_finalize() {
        let (mut writer, _log) = open(true, WriterStatus::Cancelled);
        assert!(matches!(
            writer.finish(gst::ClockTime::ZERO),
            Err(VideoCompressionError::WriterFailure(_))
        ));
    }
}
