// SPDX-License-Identifier: MPL-2.0

//! Single-frame video compression pipeline
//!
//! This module turns captured frames into a finalized video container:
//! - Encoder session configured for HDR-capable compression
//! - Container writer with bounded backpressure
//! - Serial worker queues for compression and writing
//! - A state machine reporting one completion per run

pub mod muxer;
pub mod pipeline;
pub mod queue;
pub mod settings;

pub use muxer::{ContainerWriter, GstMuxerBackend, MuxSink, MuxerBackend, TrackConfig, WriterStatus};
pub use pipeline::{
    CompletionHandler, CompressionPipeline, PipelineBackends, PipelineState,
    compress_single_frame, compress_single_frame_with,
};
pub use settings::CompressionSettings;
