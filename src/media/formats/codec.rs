// SPDX-License-Identifier: GPL-3.0-only

//! Codec, profile and container metadata

use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested codec profile for a compression session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodecProfile {
    /// HEVC Main10 (preferred for HDR)
    #[default]
    Hevc10Bit,
    /// HEVC Main
    Hevc8Bit,
    /// H.264 High, always available
    Avc,
}

impl CodecProfile {
    /// Codec this profile asks for before capability fallback
    pub fn preferred_codec(&self) -> VideoCodec {
        match self {
            CodecProfile::Hevc10Bit | CodecProfile::Hevc8Bit => VideoCodec::Hevc,
            CodecProfile::Avc => VideoCodec::H264,
        }
    }
}

/// Video codec types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoCodec {
    /// HEVC/H.265 codec (good compression, HDR capable)
    Hevc,
    /// H.264 codec (universally supported)
    H264,
}

impl VideoCodec {
    /// Get the parser element name used in front of a muxer
    pub fn parser_name(&self) -> &'static str {
        match self {
            VideoCodec::Hevc => "h265parse",
            VideoCodec::H264 => "h264parse",
        }
    }

    /// Get the GStreamer caps media type of the compressed stream
    pub fn caps_name(&self) -> &'static str {
        match self {
            VideoCodec::Hevc => "video/x-h265",
            VideoCodec::H264 => "video/x-h264",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoCodec::Hevc => write!(f, "HEVC"),
            VideoCodec::H264 => write!(f, "H.264"),
        }
    }
}

/// Codec profile/level pair set on the compression session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileLevel {
    /// HEVC Main10, level chosen by the encoder
    HevcMain10Auto,
    /// HEVC Main, level chosen by the encoder
    HevcMainAuto,
    /// H.264 High, level chosen by the encoder
    H264HighAuto,
}

impl ProfileLevel {
    /// Codec this profile belongs to
    pub fn codec(&self) -> VideoCodec {
        match self {
            ProfileLevel::HevcMain10Auto | ProfileLevel::HevcMainAuto => VideoCodec::Hevc,
            ProfileLevel::H264HighAuto => VideoCodec::H264,
        }
    }

    /// Profile name as used in compressed caps
    pub fn caps_profile(&self) -> &'static str {
        match self {
            ProfileLevel::HevcMain10Auto => "main-10",
            ProfileLevel::HevcMainAuto => "main",
            ProfileLevel::H264HighAuto => "high",
        }
    }

    /// Whether the encoder input must carry 10-bit samples
    pub fn is_10bit(&self) -> bool {
        matches!(self, ProfileLevel::HevcMain10Auto)
    }
}

/// Container formats for the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// QuickTime movie (carries HDR track metadata best)
    #[default]
    QuickTime,
    /// MP4 container (good compatibility)
    Mp4,
}

impl ContainerFormat {
    /// Get file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::QuickTime => "mov",
            ContainerFormat::Mp4 => "mp4",
        }
    }

    /// Get muxer element name
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::QuickTime => "qtmux",
            ContainerFormat::Mp4 => "mp4mux",
        }
    }
}
