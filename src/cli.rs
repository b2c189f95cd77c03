// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Compressing an image file into a one-frame HDR video
//! - Listing the detected video encoders

use clap::{Args, ValueEnum};
use gstreamer as gst;
use hlgcam::Config;
use hlgcam::media::encoders::detection::{EncoderCapabilities, detect_video_encoders};
use hlgcam::media::encoders::{GstEncoderCapabilities, log_available_encoders};
use hlgcam::media::formats::{CodecProfile, ContainerFormat, TransferProfile, VideoCodec};
use hlgcam::media::{CaptureFrame, ImageOrientation, PixelBuffer, VideoOrientation};
use hlgcam::pipelines::video::{CompressionSettings, PipelineBackends, compress_single_frame};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ProfileArg {
    Sdr,
    Hlg,
    Pq,
}

impl From<ProfileArg> for TransferProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Sdr => TransferProfile::Sdr,
            ProfileArg::Hlg => TransferProfile::Hlg,
            ProfileArg::Pq => TransferProfile::Pq,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CodecArg {
    Hevc10,
    Hevc8,
    Avc,
}

impl From<CodecArg> for CodecProfile {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Hevc10 => CodecProfile::Hevc10Bit,
            CodecArg::Hevc8 => CodecProfile::Hevc8Bit,
            CodecArg::Avc => CodecProfile::Avc,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ContainerArg {
    Mov,
    Mp4,
}

impl From<ContainerArg> for ContainerFormat {
    fn from(arg: ContainerArg) -> Self {
        match arg {
            ContainerArg::Mov => ContainerFormat::QuickTime,
            ContainerArg::Mp4 => ContainerFormat::Mp4,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum VideoOrientationArg {
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

impl From<VideoOrientationArg> for VideoOrientation {
    fn from(arg: VideoOrientationArg) -> Self {
        match arg {
            VideoOrientationArg::Portrait => VideoOrientation::Portrait,
            VideoOrientationArg::PortraitUpsideDown => VideoOrientation::PortraitUpsideDown,
            VideoOrientationArg::LandscapeLeft => VideoOrientation::LandscapeLeft,
            VideoOrientationArg::LandscapeRight => VideoOrientation::LandscapeRight,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ImageOrientationArg {
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl From<ImageOrientationArg> for ImageOrientation {
    fn from(arg: ImageOrientationArg) -> Self {
        match arg {
            ImageOrientationArg::Up => ImageOrientation::Up,
            ImageOrientationArg::Down => ImageOrientation::Down,
            ImageOrientationArg::Left => ImageOrientation::Left,
            ImageOrientationArg::Right => ImageOrientation::Right,
            ImageOrientationArg::UpMirrored => ImageOrientation::UpMirrored,
            ImageOrientationArg::DownMirrored => ImageOrientation::DownMirrored,
            ImageOrientationArg::LeftMirrored => ImageOrientation::LeftMirrored,
            ImageOrientationArg::RightMirrored => ImageOrientation::RightMirrored,
        }
    }
}

/// Options of the `compress` command; unset flags keep the configured value
#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Image file to compress (PNG, TIFF, JPEG, ...)
    pub input: PathBuf,

    /// Transfer function of the output
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    /// Codec and bit depth
    #[arg(long, value_enum)]
    pub codec: Option<CodecArg>,

    /// Quality between 0.0 and 1.0
    #[arg(short, long)]
    pub quality: Option<f32>,

    /// Device orientation written to the video track
    #[arg(long, value_enum)]
    pub orientation: Option<VideoOrientationArg>,

    /// Orientation applied to the still image
    #[arg(long, value_enum)]
    pub image_orientation: Option<ImageOrientationArg>,

    /// Skip the still image
    #[arg(long)]
    pub no_still: bool,

    /// Container format
    #[arg(long, value_enum)]
    pub container: Option<ContainerArg>,

    /// Output directory (default: configured, else ~/Videos/hlgcam)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Leave the outputs at their temporary paths
    #[arg(long)]
    pub keep_temp: bool,
}

impl CompressArgs {
    fn apply(&self, mut settings: CompressionSettings) -> CompressionSettings {
        if let Some(profile) = self.profile {
            settings.transfer_profile = profile.into();
        }
        if let Some(codec) = self.codec {
            settings.codec_profile = codec.into();
        }
        if let Some(quality) = self.quality {
            settings.quality = quality;
        }
        if let Some(orientation) = self.orientation {
            settings.video_orientation = orientation.into();
        }
        if let Some(orientation) = self.image_orientation {
            settings.image_orientation = orientation.into();
        }
        if let Some(container) = self.container {
            settings.container = container.into();
        }
        if self.no_still {
            settings.save_still_image = false;
        }
        settings
    }
}

/// Compress one image file into a video container
pub fn compress(args: CompressArgs) -> Result<(), Box<dyn std::error::Error>> {
    gst::init()?;

    let config = Config::load()?;
    let settings = args.apply(config.compression.clone());
    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir());

    let image = image::open(&args.input)
        .map_err(|e| format!("Failed to open {}: {}", args.input.display(), e))?;
    let pixels = PixelBuffer::from_image(&image)?;
    println!(
        "Input: {} ({}x{}, {:?})",
        args.input.display(),
        pixels.width(),
        pixels.height(),
        pixels.format()
    );
    println!(
        "Output: {:?} {:?} in {}",
        settings.codec_profile,
        settings.transfer_profile,
        settings.container.extension()
    );

    if settings.transfer_profile.is_hdr() && !pixels.format().is_high_bit_depth() {
        println!(
            "Note: 8-bit input is remapped to {:?}; it gains no highlight detail",
            settings.transfer_profile
        );
    }

    let frame = CaptureFrame::new(pixels, gst::ClockTime::ZERO);
    let started = Instant::now();

    let rt = tokio::runtime::Runtime::new()?;
    let artifact = rt.block_on(compress_single_frame(
        frame,
        settings,
        PipelineBackends::gstreamer(),
    ))?;
    println!("Compressed in {:.2?}", started.elapsed());

    if args.keep_temp {
        println!("Video saved: {}", artifact.video_path.display());
        if artifact.still_path.exists() {
            println!("Still saved: {}", artifact.still_path.display());
        }
        return Ok(());
    }

    let committed = match artifact.commit_to(&output_dir) {
        Ok(committed) => committed,
        Err(e) => {
            artifact.cleanup();
            return Err(e.into());
        }
    };
    println!("Video saved: {}", committed.video_path.display());
    if let Some(still) = committed.still_path {
        println!("Still saved: {}", still.display());
    }
    Ok(())
}

/// Print the effective configuration, writing it out when asked
pub fn config(write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);

    if write {
        let path = config.save()?;
        println!("Configuration written to {}", path.display());
    } else if let Some(path) = Config::path() {
        println!("Configuration file: {}", path.display());
    }
    Ok(())
}

/// Print the detected encoders and the hardware answer per codec
pub fn list_encoders() -> Result<(), Box<dyn std::error::Error>> {
    gst::init()?;
    log_available_encoders();

    let encoders = detect_video_encoders();
    if encoders.is_empty() {
        println!("No video encoders found.");
    } else {
        println!("Available encoders:");
        println!();
        for encoder in &encoders {
            println!(
                "  {:<14} {:<6} {}",
                encoder.element_name,
                encoder.codec.to_string(),
                encoder.display_name
            );
        }
    }

    println!();
    let capabilities = GstEncoderCapabilities;
    for codec in [VideoCodec::Hevc, VideoCodec::H264] {
        let hardware = if capabilities.has_hardware_encoder(codec) {
            "yes"
        } else {
            "no"
        };
        println!("  Hardware {}: {}", codec, hardware);
    }
    Ok(())
}
