// SPDX-License-Identifier: MPL-2.0

//! Scripted backends for pipeline tests
//!
//! The compression fake delivers its outputs from its own thread, in
//! submission order, and joins that thread in `complete_frames` like a real
//! encoder flush. The muxer fake records what it was asked to write.

#![allow(dead_code)]

use gstreamer as gst;
use hlgcam::errors::{BackendError, BackendResult, VideoCompressionError};
use hlgcam::media::encoders::{
    CompressedSample, CompressionBackend, EncodeOutput, EncoderCapabilities, HardwareSession,
    OutputRoute, SessionParams, SessionProperty, SessionRegistry,
};
use hlgcam::media::formats::{ContainerFormat, VideoCodec};
use hlgcam::media::{CaptureFrame, PixelBuffer, PixelBufferGuard, PixelFormat};
use hlgcam::pipelines::video::{
    CompressionPipeline, MuxSink, MuxerBackend, PipelineBackends, TrackConfig, WriterStatus,
};
use hlgcam::storage::OutputArtifact;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// What the fake encoder emits for one submitted frame
#[derive(Debug, Clone)]
pub enum Emit {
    /// A ready keyframe
    Sample,
    /// The frame was dropped
    Dropped,
    /// A backend error status
    Failed,
    /// A sample whose data is not ready
    NotReady,
    /// Nothing at all
    Nothing,
}

#[derive(Debug, Default)]
pub struct CompressionLog {
    pub sessions_created: u32,
    pub params: Option<SessionParams>,
    pub properties: Vec<SessionProperty>,
    pub encoded: Vec<gst::ClockTime>,
    pub exclusive_locks: u32,
    pub completed: u32,
    pub invalidated: u32,
}

#[derive(Clone, Default)]
pub struct FakeCompression {
    pub log: Arc<Mutex<CompressionLog>>,
    pub fail_create: bool,
    pub fail_prepare: bool,
    pub reject_encode: bool,
    /// Outputs per frame, by submission index; missing entries emit `Sample`
    pub script: Vec<Vec<Emit>>,
}

impl FakeCompression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(script: Vec<Vec<Emit>>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }
}

impl CompressionBackend for FakeCompression {
    fn create_session(
        &self,
        params: &SessionParams,
        route: OutputRoute,
    ) -> BackendResult<Box<dyn HardwareSession>> {
        if self.fail_create {
            return Err(BackendError::NotAvailable("scripted create failure".into()));
        }
        {
            let mut log = self.log.lock().unwrap();
            log.sessions_created += 1;
            log.params = Some(*params);
        }

        let (sender, receiver) = mpsc::channel::<EncodeOutput>();
        let worker = std::thread::spawn(move || {
            for output in receiver {
                route.deliver(output);
            }
        });

        Ok(Box::new(FakeSession {
            log: Arc::clone(&self.log),
            codec: params.codec,
            fail_prepare: self.fail_prepare,
            reject_encode: self.reject_encode,
            script: self.script.clone(),
            sender: Some(sender),
            worker: Some(worker),
            submitted: 0,
        }))
    }
}

struct FakeSession {
    log: Arc<Mutex<CompressionLog>>,
    codec: VideoCodec,
    fail_prepare: bool,
    reject_encode: bool,
    script: Vec<Vec<Emit>>,
    sender: Option<mpsc::Sender<EncodeOutput>>,
    worker: Option<JoinHandle<()>>,
    submitted: usize,
}

impl FakeSession {
    fn sample(&self, pts: gst::ClockTime, duration: Option<gst::ClockTime>) -> CompressedSample {
        CompressedSample {
            data: vec![0, 0, 0, 1, 0x26, 0x01],
            pts,
            duration,
            keyframe: true,
            data_ready: true,
            codec: self.codec,
        }
    }

    fn join(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            worker.join().unwrap();
        }
    }
}

impl HardwareSession for FakeSession {
    fn set_property(&mut self, property: SessionProperty) -> BackendResult<()> {
        self.log.lock().unwrap().properties.push(property);
        Ok(())
    }

    fn prepare_to_encode(&mut self) -> BackendResult<()> {
        if self.fail_prepare {
            return Err(BackendError::InitializationFailed("scripted".into()));
        }
        Ok(())
    }

    fn encode_frame(
        &mut self,
        pixels: &PixelBufferGuard<'_>,
        pts: gst::ClockTime,
        duration: Option<gst::ClockTime>,
    ) -> BackendResult<()> {
        {
            let mut log = self.log.lock().unwrap();
            log.encoded.push(pts);
            if pixels.is_exclusive() {
                log.exclusive_locks += 1;
            }
        }
        if self.reject_encode {
            return Err(BackendError::Rejected("scripted rejection".into()));
        }

        let emits = self
            .script
            .get(self.submitted)
            .cloned()
            .unwrap_or_else(|| vec![Emit::Sample]);
        self.submitted += 1;

        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BackendError::Other("session flushed".into()))?;
        for emit in emits {
            let output = match emit {
                Emit::Sample => EncodeOutput::sample(self.sample(pts, duration)),
                Emit::Dropped => EncodeOutput::dropped(),
                Emit::Failed => EncodeOutput::failed(BackendError::Other("scripted".into())),
                Emit::NotReady => {
                    let mut sample = self.sample(pts, duration);
                    sample.data_ready = false;
                    EncodeOutput::sample(sample)
                }
                Emit::Nothing => continue,
            };
            let _ = sender.send(output);
        }
        Ok(())
    }

    fn complete_frames(&mut self, _until: Option<gst::ClockTime>) -> BackendResult<()> {
        self.join();
        self.log.lock().unwrap().completed += 1;
        Ok(())
    }

    fn invalidate(&mut self) {
        self.join();
        self.log.lock().unwrap().invalidated += 1;
    }
}

#[derive(Debug, Default)]
pub struct MuxLog {
    pub created: Vec<PathBuf>,
    pub track: Option<TrackConfig>,
    pub start: Option<gst::ClockTime>,
    pub appended: Vec<gst::ClockTime>,
    pub end: Option<gst::ClockTime>,
    pub marked_finished: bool,
    pub finalized: bool,
}

#[derive(Clone, Default)]
pub struct FakeMuxer {
    pub log: Arc<Mutex<MuxLog>>,
    pub fail_create: bool,
    pub reject_track: bool,
    pub reject_append: bool,
    pub never_ready: bool,
    /// Refuse to finalize a file without samples
    pub reject_empty: bool,
    /// Status reported by a finalize that is not refused
    pub status: Option<WriterStatus>,
    /// Create the destination file the way a real muxer does
    pub create_files: bool,
}

impl FakeMuxer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MuxerBackend for FakeMuxer {
    fn create_sink(
        &self,
        destination: &Path,
        _container: ContainerFormat,
    ) -> BackendResult<Box<dyn MuxSink>> {
        if self.fail_create {
            return Err(BackendError::Io("scripted create failure".into()));
        }
        if self.create_files {
            std::fs::write(destination, b"ftyp").map_err(|e| BackendError::Io(e.to_string()))?;
        }
        self.log
            .lock()
            .unwrap()
            .created
            .push(destination.to_path_buf());
        Ok(Box::new(FakeSink {
            muxer: self.clone(),
        }))
    }
}

struct FakeSink {
    muxer: FakeMuxer,
}

impl MuxSink for FakeSink {
    fn add_track(&mut self, track: &TrackConfig) -> BackendResult<()> {
        if self.muxer.reject_track {
            return Err(BackendError::Rejected("scripted track rejection".into()));
        }
        self.muxer.log.lock().unwrap().track = Some(*track);
        Ok(())
    }

    fn start_writing(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn start_session(&mut self, at: gst::ClockTime) {
        self.muxer.log.lock().unwrap().start = Some(at);
    }

    fn is_ready_for_more_media_data(&self) -> bool {
        !self.muxer.never_ready
    }

    fn append(&mut self, sample: &CompressedSample) -> BackendResult<()> {
        if self.muxer.reject_append {
            return Err(BackendError::Rejected("scripted append rejection".into()));
        }
        self.muxer.log.lock().unwrap().appended.push(sample.pts);
        Ok(())
    }

    fn mark_finished(&mut self) {
        self.muxer.log.lock().unwrap().marked_finished = true;
    }

    fn end_session(&mut self, at: gst::ClockTime) {
        self.muxer.log.lock().unwrap().end = Some(at);
    }

    fn finish_writing(&mut self) -> WriterStatus {
        let mut log = self.muxer.log.lock().unwrap();
        if self.muxer.reject_empty && log.appended.is_empty() {
            return WriterStatus::Failed("no samples".into());
        }
        log.finalized = true;
        self.muxer.status.clone().unwrap_or(WriterStatus::Completed)
    }
}

/// Answers hardware availability with a fixed value
pub struct FixedCapabilities(pub bool);

impl EncoderCapabilities for FixedCapabilities {
    fn has_hardware_encoder(&self, _codec: VideoCodec) -> bool {
        self.0
    }
}

pub fn backends(compression: &FakeCompression, muxer: &FakeMuxer) -> PipelineBackends {
    PipelineBackends {
        compression: Arc::new(compression.clone()),
        muxer: Arc::new(muxer.clone()),
        capabilities: Arc::new(FixedCapabilities(true)),
        registry: SessionRegistry::new(),
    }
}

pub fn frame(width: u32, height: u32, pts_ms: u64) -> CaptureFrame {
    frame_with_format(width, height, PixelFormat::Rgba8, pts_ms)
}

pub fn frame_with_format(width: u32, height: u32, format: PixelFormat, pts_ms: u64) -> CaptureFrame {
    let data = vec![0x40; format.frame_size(width, height)];
    let pixels = PixelBuffer::new(width, height, format, data).unwrap();
    CaptureFrame::new(pixels, gst::ClockTime::from_mseconds(pts_ms))
}

/// Pipeline writing into `dir`
pub fn pipeline_in(dir: &Path, backends: PipelineBackends) -> CompressionPipeline {
    CompressionPipeline::new(backends)
        .with_artifact(OutputArtifact::new(
            dir.join("out.mov"),
            dir.join("out.jpg"),
        ))
        .with_backpressure(Duration::from_millis(1), Duration::from_millis(50))
}

/// Completion callback paired with a receiver of everything it gets
pub fn completion() -> (
    impl FnOnce(Result<(), VideoCompressionError>) + Send + 'static,
    mpsc::Receiver<Result<(), VideoCompressionError>>,
) {
    let (tx, rx) = mpsc::channel();
    let done = move |result: Result<(), VideoCompressionError>| {
        let _ = tx.send(result);
    };
    (done, rx)
}

pub fn wait(rx: &mpsc::Receiver<Result<(), VideoCompressionError>>) -> Result<(), VideoCompressionError> {
    rx.recv_timeout(COMPLETION_TIMEOUT)
        .expect("completion did not fire")
}

/// Nothing else arrives after the first completion
pub fn assert_fired_once(rx: &mpsc::Receiver<Result<(), VideoCompressionError>>) {
    assert!(
        rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "completion fired more than once"
    );
}
