// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Compression quality presets
///
/// These presets map to the 0.0-1.0 quality factor handed to the encoder.
/// An explicit quality factor always takes precedence over a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityPreset {
    /// Small files, visible compression artifacts
    Low,
    /// Balanced quality and file size
    Medium,
    /// Near-transparent quality for still-derived clips (default)
    #[default]
    High,
}

impl QualityPreset {
    /// Get all preset variants for iteration
    pub const ALL: [QualityPreset; 3] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    /// Quality factor in the 0.0-1.0 range
    pub fn quality_factor(&self) -> f32 {
        match self {
            QualityPreset::Low => 0.5,
            QualityPreset::Medium => 0.75,
            QualityPreset::High => 0.9,
        }
    }
}

/// Map a 0.0-1.0 quality factor onto a 0-51 quantizer (lower is better)
///
/// Used by encoders that expose a constant quantizer instead of a
/// quality property.
pub fn quality_to_quantizer(quality: f32) -> u32 {
    let quality = quality.clamp(0.0, 1.0);
    (51.0 - quality * 51.0).round() as u32
}

/// Still image side channel constants
pub mod still {
    /// Fixed JPEG quality factor for the side still image
    pub const QUALITY: f32 = 0.85;

    /// JPEG quality on the 1-100 scale used by the encoder
    pub fn jpeg_quality() -> u8 {
        (QUALITY * 100.0).round() as u8
    }

    /// File extension of the side still image
    pub const EXTENSION: &str = "jpg";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Synthesized duration of a single-frame session in milliseconds
    pub const SINGLE_FRAME_DURATION_MS: u64 = 1_000;

    /// Longest accepted single-frame duration, one hour
    pub const MAX_SINGLE_FRAME_DURATION_MS: u64 = 3_600_000;

    /// Upper bound on waiting for the muxer to accept more data
    ///
    /// A wedged muxer is treated as a hard failure of the append.
    pub const APPEND_READY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Poll interval while waiting for muxer readiness
    pub const APPEND_POLL_INTERVAL: Duration = Duration::from_millis(2);

    /// Maximum time an encoder flush may take before it is reported failed
    pub const FLUSH_TIMEOUT_SECS: u64 = 30;

    /// Maximum time container finalization may take
    pub const FINALIZE_TIMEOUT_SECS: u64 = 30;
}

/// Worker queue labels
pub mod queues {
    /// Thread name of the compression worker
    pub const COMPRESSION: &str = "hlgcam-compression";

    /// Thread name of the writing worker
    pub const WRITING: &str = "hlgcam-writing";
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Byte budget of the muxer input queue before it reports backpressure
    pub const MUX_QUEUE_MAX_BYTES: u64 = 64 * 1024 * 1024;

    /// Byte budget of the encoder input queue
    pub const ENCODER_QUEUE_MAX_BYTES: u64 = 256 * 1024 * 1024;
}

/// Output file naming
pub mod files {
    /// Prefix of committed video files
    pub const VIDEO_PREFIX: &str = "VID";

    /// Prefix of committed still images
    pub const IMAGE_PREFIX: &str = "IMG";

    /// Directory name under the user's video directory
    pub const OUTPUT_DIR_NAME: &str = "hlgcam";
}
