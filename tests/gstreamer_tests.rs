// SPDX-License-Identifier: MPL-2.0

//! End-to-end runs through the GStreamer encoder and muxer
//!
//! These need the base, good and ugly plugin sets (videoconvert, qtmux,
//! qtdemux, h264parse/h265parse) plus an H.264 or HEVC encoder. Run them
//! with `cargo test -- --ignored`.

use gstreamer as gst;
use gstreamer::prelude::*;
use hlgcam::media::formats::{CodecProfile, TransferProfile};
use hlgcam::media::{CaptureFrame, PixelBuffer, PixelFormat};
use hlgcam::pipelines::video::{
    CompressionPipeline, CompressionSettings, PipelineBackends, compress_single_frame_with,
};
use hlgcam::storage::OutputArtifact;
use std::path::Path;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// Horizontal ramp so the encoder has something to do
fn gradient_frame() -> CaptureFrame {
    let mut data = Vec::with_capacity(PixelFormat::Rgba8.frame_size(WIDTH, HEIGHT));
    for _ in 0..HEIGHT {
        for x in 0..WIDTH {
            let v = (x * 255 / (WIDTH - 1)) as u8;
            data.extend_from_slice(&[v, v, v, 0xff]);
        }
    }
    let pixels = PixelBuffer::new(WIDTH, HEIGHT, PixelFormat::Rgba8, data).unwrap();
    CaptureFrame::new(pixels, gst::ClockTime::ZERO)
}

fn pipeline_in(dir: &Path) -> CompressionPipeline {
    CompressionPipeline::new(PipelineBackends::gstreamer()).with_artifact(OutputArtifact::new(
        dir.join("frame.mov"),
        dir.join("frame.jpg"),
    ))
}

/// Duration of a QuickTime file as reported by the demuxer
fn container_duration(path: &Path) -> gst::ClockTime {
    let description = format!("filesrc location=\"{}\" ! qtdemux ! fakesink", path.display());
    let pipeline = gst::parse::launch(&description)
        .unwrap()
        .downcast::<gst::Pipeline>()
        .unwrap();
    pipeline.set_state(gst::State::Paused).unwrap();

    let bus = pipeline.bus().unwrap();
    let msg = bus
        .timed_pop_filtered(
            gst::ClockTime::from_seconds(10),
            &[gst::MessageType::AsyncDone, gst::MessageType::Error],
        )
        .expect("demuxer did not preroll");
    if let gst::MessageView::Error(err) = msg.view() {
        panic!("reading {} failed: {}", path.display(), err.error());
    }

    let duration = pipeline.query_duration::<gst::ClockTime>();
    pipeline.set_state(gst::State::Null).unwrap();
    duration.expect("container reports no duration")
}

fn assert_about_one_second(duration: gst::ClockTime) {
    let ms = duration.mseconds();
    assert!(
        (900..=1100).contains(&ms),
        "expected a container of about 1 s, got {}",
        duration
    );
}

#[tokio::test]
#[ignore = "requires GStreamer plugins"]
async fn test_sdr_h264_single_frame_file() {
    gst::init().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let settings = CompressionSettings {
        codec_profile: CodecProfile::Avc,
        transfer_profile: TransferProfile::Sdr,
        save_still_image: false,
        ..Default::default()
    };

    let artifact = compress_single_frame_with(pipeline_in(dir.path()), gradient_frame(), settings)
        .await
        .unwrap();

    let size = std::fs::metadata(&artifact.video_path).unwrap().len();
    assert!(size > 0, "empty container");
    assert!(!artifact.still_path.exists());
    assert_about_one_second(container_duration(&artifact.video_path));
}

#[tokio::test]
#[ignore = "requires GStreamer plugins"]
async fn test_hlg_single_frame_file_with_still() {
    gst::init().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let artifact = compress_single_frame_with(
        pipeline_in(dir.path()),
        gradient_frame(),
        CompressionSettings::default(),
    )
    .await
    .unwrap();

    let size = std::fs::metadata(&artifact.video_path).unwrap().len();
    assert!(size > 0, "empty container");
    assert_about_one_second(container_duration(&artifact.video_path));

    let still = image::open(&artifact.still_path).unwrap();
    assert_eq!((still.width(), still.height()), (WIDTH, HEIGHT));
}
