// SPDX-License-Identifier: MPL-2.0

//! Single-frame compression pipeline
//!
//! [`CompressionPipeline`] coordinates a [`FrameEncoder`] and a
//! [`ContainerWriter`] through prepare, encode and finish:
//!
//! ```text
//! caller ──submit──▶ compression queue ──encode──▶ backend session
//!                                                      │ (own thread)
//!                                                      ▼
//!                    writing queue ◀──append── output router
//! ```
//!
//! The encoder lives on the compression queue and the writer on the writing
//! queue. Errors from any context land in a first-error slot and the
//! caller's completion fires exactly once when the pipeline reaches a
//! terminal state.

use super::muxer::{ContainerWriter, GstMuxerBackend, MuxerBackend, TrackConfig};
use super::queue::{self, QueueHandle};
use super::settings::CompressionSettings;
use crate::constants::{queues, timing};
use crate::errors::{ErrorKind, VideoCompressionError};
use crate::media::encoders::{
    CompressionBackend, EncodeOutput, EncoderCapabilities, FrameEncoder, GstCompressionBackend,
    GstEncoderCapabilities, OutputHandler, SessionRegistry, check_encode_output,
};
use crate::media::frame::CaptureFrame;
use crate::pipelines::photo::StillImageEncoder;
use crate::storage::OutputArtifact;
use gstreamer as gst;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Completion callback, invoked exactly once per prepared pipeline
pub type CompletionHandler = Box<dyn FnOnce(Result<(), VideoCompressionError>) + Send>;

/// Lifecycle of a pipeline
///
/// Terminal states (`Completed`, `Failed`) require a fresh pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Preparing,
    Encoding,
    Finishing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Preparing => "preparing",
            PipelineState::Encoding => "encoding",
            PipelineState::Finishing => "finishing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Backends and shared services used by a pipeline
#[derive(Clone)]
pub struct PipelineBackends {
    pub compression: Arc<dyn CompressionBackend>,
    pub muxer: Arc<dyn MuxerBackend>,
    pub capabilities: Arc<dyn EncoderCapabilities>,
    pub registry: Arc<SessionRegistry>,
}

impl PipelineBackends {
    /// GStreamer encoder and muxer with element-factory capability detection
    pub fn gstreamer() -> Self {
        Self {
            compression: Arc::new(GstCompressionBackend),
            muxer: Arc::new(GstMuxerBackend),
            capabilities: Arc::new(GstEncoderCapabilities),
            registry: SessionRegistry::new(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// First error of a session; later errors are logged and dropped
#[derive(Default)]
struct ErrorSlot(Mutex<Option<VideoCompressionError>>);

impl ErrorSlot {
    fn record(&self, error: VideoCompressionError) -> bool {
        let mut slot = lock(&self.0);
        match slot.as_ref() {
            None => {
                warn!(kind = %ErrorKind(&error), error = %error, "Recording session error");
                *slot = Some(error);
                true
            }
            Some(first) => {
                debug!(
                    first = %ErrorKind(first),
                    suppressed = %error,
                    "Suppressing later session error"
                );
                false
            }
        }
    }

    fn take(&self) -> Option<VideoCompressionError> {
        lock(&self.0).take()
    }
}

/// Holder of the completion callback; firing empties it
#[derive(Default)]
struct CompletionSlot(Mutex<Option<CompletionHandler>>);

impl CompletionSlot {
    fn set(&self, handler: CompletionHandler) {
        *lock(&self.0) = Some(handler);
    }

    fn fire(&self, result: Result<(), VideoCompressionError>) -> bool {
        let handler = lock(&self.0).take();
        match handler {
            Some(handler) => {
                handler(result);
                true
            }
            None => false,
        }
    }
}

/// State shared between the caller and the worker contexts
struct Shared {
    state: Mutex<PipelineState>,
    errors: ErrorSlot,
    completion: CompletionSlot,
}

impl Shared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipelineState::Idle),
            errors: ErrorSlot::default(),
            completion: CompletionSlot::default(),
        })
    }

    fn state(&self) -> PipelineState {
        *lock(&self.state)
    }

    /// Terminal states are final; later transitions are dropped
    fn set_state(&self, next: PipelineState) {
        let mut state = lock(&self.state);
        if state.is_terminal() {
            warn!(from = %*state, to = %next, "Ignoring transition out of a terminal state");
            return;
        }
        debug!(from = %*state, to = %next, "Pipeline state change");
        *state = next;
    }

    /// Fail during prepare: record, go to Failed, fire the completion
    fn fail(&self, error: VideoCompressionError) {
        self.errors.record(error.clone());
        self.set_state(PipelineState::Failed);
        let result = Err(self.errors.take().unwrap_or(error));
        self.completion.fire(result);
    }

    /// Reach the terminal state after the writer finished
    fn conclude(&self, finished: Result<(), VideoCompressionError>, frames_submitted: u64) {
        if let Err(e) = finished {
            let e = if frames_submitted == 0 {
                debug!(writer_error = %e, "Writer refused the empty track");
                VideoCompressionError::NoCompressSession
            } else {
                e
            };
            self.errors.record(e);
        }

        let result = match self.errors.take() {
            Some(e) => {
                error!(kind = %ErrorKind(&e), error = %e, "Compression failed");
                self.set_state(PipelineState::Failed);
                Err(e)
            }
            None => {
                info!(frames = frames_submitted, "Compression completed");
                self.set_state(PipelineState::Completed);
                Ok(())
            }
        };
        self.completion.fire(result);
    }
}

/// Routes validated encoder output onto the writing queue
struct SampleRouter {
    writing: QueueHandle<ContainerWriter>,
    shared: Arc<Shared>,
}

impl OutputHandler for SampleRouter {
    fn handle_output(&self, output: EncodeOutput) {
        let sample = match check_encode_output(output) {
            Ok(sample) => sample,
            Err(e) => {
                self.shared.errors.record(e);
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let dispatched = self.writing.dispatch(move |writer: &mut ContainerWriter| {
            if let Err(e) = writer.append(&sample) {
                shared.errors.record(e);
            }
        });
        if !dispatched {
            self.shared
                .errors
                .record(VideoCompressionError::WriterFailure(format!(
                    "{} queue closed",
                    self.writing.label()
                )));
        }
    }
}

/// State owned by the compression queue
struct CompressionContext {
    encoder: FrameEncoder,
    /// Present until the still image has been rendered once
    still: Option<StillImageEncoder>,
}

/// Resources of a running session
///
/// Both queue handles exist together and are dropped together.
struct EncodingSession {
    compression: QueueHandle<CompressionContext>,
    writing: QueueHandle<ContainerWriter>,
    anchor: gst::ClockTime,
    last_pts: gst::ClockTime,
    frames_submitted: u64,
    settings: CompressionSettings,
}

impl EncodingSession {
    /// End of the container timeline, saturating at the clock maximum
    fn end_time(&self) -> gst::ClockTime {
        if self.settings.expecting_single_frame {
            self.last_pts
                .saturating_add(self.settings.single_frame_duration())
        } else {
            self.last_pts
        }
    }
}

/// Orchestrator of one compression run
pub struct CompressionPipeline {
    backends: PipelineBackends,
    shared: Arc<Shared>,
    artifact: Option<OutputArtifact>,
    session: Option<EncodingSession>,
    poll_interval: Duration,
    ready_timeout: Duration,
}

impl CompressionPipeline {
    pub fn new(backends: PipelineBackends) -> Self {
        Self {
            backends,
            shared: Shared::new(),
            artifact: None,
            session: None,
            poll_interval: timing::APPEND_POLL_INTERVAL,
            ready_timeout: timing::APPEND_READY_TIMEOUT,
        }
    }

    /// Override how long appends wait for the writer to accept data
    pub fn with_backpressure(mut self, poll_interval: Duration, ready_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.ready_timeout = ready_timeout;
        self
    }

    /// Write into preset locations instead of allocating temporary ones
    pub fn with_artifact(mut self, artifact: OutputArtifact) -> Self {
        self.artifact = Some(artifact);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Output locations, known once prepared
    pub fn artifact(&self) -> Option<&OutputArtifact> {
        self.artifact.as_ref()
    }

    /// Open the encoder and the writer sized for `frame`
    ///
    /// Valid only on a fresh pipeline; any other state returns
    /// `InvalidState` and leaves `completion` untouched. When opening fails
    /// the pipeline becomes `Failed`, `completion` fires with the error and
    /// the same error is returned.
    pub fn prepare<F>(
        &mut self,
        frame: &CaptureFrame,
        settings: CompressionSettings,
        completion: F,
    ) -> Result<(), VideoCompressionError>
    where
        F: FnOnce(Result<(), VideoCompressionError>) + Send + 'static,
    {
        let state = self.state();
        if state != PipelineState::Idle {
            warn!(state = %state, "prepare called on a used pipeline");
            return Err(VideoCompressionError::InvalidState(state.to_string()));
        }

        self.shared.completion.set(Box::new(completion));
        self.shared.set_state(PipelineState::Preparing);

        let settings = settings.validated();
        let artifact = self
            .artifact
            .get_or_insert_with(|| OutputArtifact::allocate(settings.container))
            .clone();

        match self.open_session(frame, settings, &artifact) {
            Ok(session) => {
                info!(
                    anchor = %session.anchor,
                    video = %artifact.video_path.display(),
                    "Pipeline ready for frames"
                );
                self.session = Some(session);
                self.shared.set_state(PipelineState::Encoding);
                Ok(())
            }
            Err(e) => {
                self.shared.fail(e.clone());
                Err(e)
            }
        }
    }

    fn open_session(
        &self,
        frame: &CaptureFrame,
        settings: CompressionSettings,
        artifact: &OutputArtifact,
    ) -> Result<EncodingSession, VideoCompressionError> {
        let (writing, writing_pending) = queue::channel::<ContainerWriter>(queues::WRITING);
        let (compression, compression_pending) =
            queue::channel::<CompressionContext>(queues::COMPRESSION);

        let router: Arc<dyn OutputHandler> = Arc::new(SampleRouter {
            writing: writing.clone(),
            shared: Arc::clone(&self.shared),
        });

        let encoder = FrameEncoder::open(
            frame,
            &settings,
            self.backends.compression.as_ref(),
            self.backends.capabilities.as_ref(),
            &self.backends.registry,
            router,
        )?;

        let (width, height) = frame
            .dimensions()
            .ok_or(VideoCompressionError::SessionInitFailure)?;
        let track = TrackConfig {
            codec: encoder.codec(),
            width,
            height,
            transform: settings.track_transform(),
        };

        // Dropping `encoder` on failure invalidates its session
        let writer = ContainerWriter::open(
            &artifact.video_path,
            settings.container,
            &track,
            frame.pts,
            self.backends.muxer.as_ref(),
        )?
        .with_backpressure(self.poll_interval, self.ready_timeout);

        let still = settings
            .save_still_image
            .then(|| StillImageEncoder::new(&artifact.still_path, settings.image_orientation));

        writing_pending.start(writer).map_err(|e| {
            error!(error = %e, "Failed to start writing queue");
            VideoCompressionError::WriterInitFailure
        })?;
        compression_pending
            .start(CompressionContext { encoder, still })
            .map_err(|e| {
                error!(error = %e, "Failed to start compression queue");
                VideoCompressionError::SessionInitFailure
            })?;

        Ok(EncodingSession {
            compression,
            writing,
            anchor: frame.pts,
            last_pts: frame.pts,
            frames_submitted: 0,
            settings,
        })
    }

    /// Queue one frame for compression
    ///
    /// Compression failures are reported through the completion at finish.
    pub fn submit_frame(&mut self, frame: CaptureFrame) -> Result<(), VideoCompressionError> {
        let state = self.state();
        let session = match (state, self.session.as_mut()) {
            (PipelineState::Encoding, Some(session)) => session,
            _ => {
                warn!(state = %state, "submit_frame outside of encoding");
                return Err(VideoCompressionError::InvalidState(state.to_string()));
            }
        };

        session.last_pts = frame.pts;
        session.frames_submitted += 1;
        debug!(
            pts = %frame.pts,
            count = session.frames_submitted,
            "Queueing frame"
        );

        let shared = Arc::clone(&self.shared);
        let dispatched = session
            .compression
            .dispatch(move |ctx: &mut CompressionContext| {
                let mut rendered = false;
                let result = ctx.encoder.encode_with(&frame, |pixels| {
                    if let Some(still) = ctx.still.as_ref() {
                        still.write_logged(pixels);
                        rendered = true;
                    }
                });
                if rendered {
                    ctx.still = None;
                }
                if let Err(e) = result {
                    shared.errors.record(e);
                }
            });

        if !dispatched {
            self.shared
                .errors
                .record(VideoCompressionError::NoCompressSession);
        }
        Ok(())
    }

    /// Flush the encoder, finalize the container and fire the completion
    ///
    /// Returns once the work is queued; the completion reports the outcome.
    pub fn finish(&mut self) -> Result<(), VideoCompressionError> {
        let state = self.state();
        let session = match (state, self.session.take()) {
            (PipelineState::Encoding, Some(session)) => session,
            (_, session) => {
                self.session = session;
                warn!(state = %state, "finish outside of encoding");
                return Err(VideoCompressionError::InvalidState(state.to_string()));
            }
        };

        self.shared.set_state(PipelineState::Finishing);

        let end_time = session.end_time();
        let frames_submitted = session.frames_submitted;
        info!(
            frames = frames_submitted,
            end = %end_time,
            "Finishing compression"
        );

        let EncodingSession {
            compression,
            writing,
            ..
        } = session;

        let shared = Arc::clone(&self.shared);
        let dispatched = compression.dispatch(move |ctx: &mut CompressionContext| {
            // All output has been routed to the writing queue once this returns
            if let Err(e) = ctx.encoder.complete() {
                shared.errors.record(e);
            }

            let writer_shared = Arc::clone(&shared);
            let dispatched = writing.dispatch(move |writer: &mut ContainerWriter| {
                let finished = writer.finish(end_time);
                writer_shared.conclude(finished, frames_submitted);
            });
            if !dispatched {
                let closed = format!("{} queue closed", writing.label());
                shared.conclude(Err(VideoCompressionError::WriterFailure(closed)), frames_submitted);
            }
        });

        if !dispatched {
            self.shared
                .conclude(Err(VideoCompressionError::NoCompressSession), frames_submitted);
        }
        Ok(())
    }
}

impl Drop for CompressionPipeline {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!(
                frames = session.frames_submitted,
                "Pipeline dropped while encoding, tearing down session"
            );
            drop(session);
            self.shared.set_state(PipelineState::Failed);
            self.shared
                .completion
                .fire(Err(VideoCompressionError::NoCompressSession));
        }
    }
}

impl fmt::Debug for CompressionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionPipeline")
            .field("state", &self.state())
            .field("artifact", &self.artifact)
            .finish()
    }
}

/// Compress one frame and wait for the container to be finalized
///
/// Convenience wrapper over prepare, submit and finish. The returned
/// artifact lives in the temporary directory; the caller commits or cleans
/// it up. On failure the partial outputs are removed before returning.
pub async fn compress_single_frame(
    frame: CaptureFrame,
    settings: CompressionSettings,
    backends: PipelineBackends,
) -> Result<OutputArtifact, VideoCompressionError> {
    compress_single_frame_with(CompressionPipeline::new(backends), frame, settings).await
}

/// [`compress_single_frame`] on a caller-configured fresh pipeline
pub async fn compress_single_frame_with(
    mut pipeline: CompressionPipeline,
    frame: CaptureFrame,
    settings: CompressionSettings,
) -> Result<OutputArtifact, VideoCompressionError> {
    let (tx, rx) = futures::channel::oneshot::channel();

    let prepared = pipeline.prepare(&frame, settings, move |result| {
        let _ = tx.send(result);
    });
    let artifact = match (prepared, pipeline.artifact().cloned()) {
        (Ok(()), Some(artifact)) => artifact,
        (Ok(()), None) => return Err(VideoCompressionError::WriterInitFailure),
        // A used pipeline's outputs belong to its earlier run
        (Err(e @ VideoCompressionError::InvalidState(_)), _) => return Err(e),
        (Err(e), artifact) => {
            if let Some(artifact) = artifact {
                artifact.cleanup();
            }
            return Err(e);
        }
    };

    let queued = pipeline
        .submit_frame(frame)
        .and_then(|()| pipeline.finish());
    let result = match queued {
        Ok(()) => rx.await.unwrap_or_else(|_| {
            error!("Completion dropped without firing");
            Err(VideoCompressionError::NoCompressSession)
        }),
        Err(e) => Err(e),
    };

    // Workers are torn down before their outputs are removed
    drop(pipeline);
    match result {
        Ok(()) => Ok(artifact),
        Err(e) => {
            warn!(
                kind = %ErrorKind(&e),
                video = %artifact.video_path.display(),
                "Removing outputs of failed compression"
            );
            artifact.cleanup();
            Err(e)
        }
    }
}
