// SPDX-License-Identifier: MPL-2.0

//! Per-session compression settings

use crate::constants::{QualityPreset, timing};
use crate::media::formats::{CodecProfile, ContainerFormat, TransferProfile};
use crate::media::orientation::{ImageOrientation, Transform, VideoOrientation};
use gstreamer as gst;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration of one compression session
///
/// Read once at prepare time; changing a value afterwards has no effect on
/// a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    pub codec_profile: CodecProfile,
    pub transfer_profile: TransferProfile,
    /// Quality factor in 0.0..=1.0
    pub quality: f32,
    /// The session carries exactly one logical frame
    pub expecting_single_frame: bool,
    /// Frame duration written for single-frame sessions
    pub single_frame_duration_ms: u64,
    /// Also write the frame as a JPEG
    pub save_still_image: bool,
    pub image_orientation: ImageOrientation,
    pub video_orientation: VideoOrientation,
    /// Takes precedence over `video_orientation` when set
    pub video_transform: Option<Transform>,
    pub container: ContainerFormat,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            codec_profile: CodecProfile::default(),
            transfer_profile: TransferProfile::default(),
            quality: QualityPreset::default().quality_factor(),
            expecting_single_frame: true,
            single_frame_duration_ms: timing::SINGLE_FRAME_DURATION_MS,
            save_still_image: true,
            image_orientation: ImageOrientation::default(),
            video_orientation: VideoOrientation::default(),
            video_transform: None,
            container: ContainerFormat::default(),
        }
    }
}

impl CompressionSettings {
    /// Clamp out-of-range values, warning about each one
    pub fn validated(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.quality) || self.quality.is_nan() {
            let clamped = if self.quality.is_nan() {
                QualityPreset::default().quality_factor()
            } else {
                self.quality.clamp(0.0, 1.0)
            };
            warn!(
                requested = self.quality,
                used = clamped,
                "Quality out of range, clamping"
            );
            self.quality = clamped;
        }
        if self.single_frame_duration_ms == 0 {
            warn!(
                used = timing::SINGLE_FRAME_DURATION_MS,
                "Single frame duration of zero, using default"
            );
            self.single_frame_duration_ms = timing::SINGLE_FRAME_DURATION_MS;
        } else if self.single_frame_duration_ms > timing::MAX_SINGLE_FRAME_DURATION_MS {
            warn!(
                requested = self.single_frame_duration_ms,
                used = timing::MAX_SINGLE_FRAME_DURATION_MS,
                "Single frame duration too long, clamping"
            );
            self.single_frame_duration_ms = timing::MAX_SINGLE_FRAME_DURATION_MS;
        }
        self
    }

    /// Duration synthesized for single-frame sessions
    ///
    /// Bounded even on settings that skipped [`Self::validated`].
    pub fn single_frame_duration(&self) -> gst::ClockTime {
        gst::ClockTime::from_mseconds(
            self.single_frame_duration_ms
                .min(timing::MAX_SINGLE_FRAME_DURATION_MS),
        )
    }

    /// Transform written to the video track
    pub fn track_transform(&self) -> Transform {
        self.video_transform
            .unwrap_or_else(|| self.video_orientation.transform())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CompressionSettings::default();
        assert_eq!(settings.codec_profile, CodecProfile::Hevc10Bit);
        assert_eq!(settings.transfer_profile, TransferProfile::Hlg);
        assert!(settings.expecting_single_frame);
        assert_eq!(settings.single_frame_duration(), gst::ClockTime::from_seconds(1));
        assert_eq!(settings.container, ContainerFormat::QuickTime);
    }

    #[test]
    fn test_quality_is_clamped() {
        let settings = CompressionSettings {
            quality: 1.7,
            ..Default::default()
        }
        .validated();
        assert_eq!(settings.quality, 1.0);

        let settings = CompressionSettings {
            quality: -0.2,
            ..Default::default()
        }
        .validated();
        assert_eq!(settings.quality, 0.0);
    }

    #[test]
    fn test_zero_duration_restored() {
        let settings = CompressionSettings {
            single_frame_duration_ms: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(settings.single_frame_duration_ms, timing::SINGLE_FRAME_DURATION_MS);
    }

    #[test]
    fn test_huge_duration_clamped() {
        let raw = CompressionSettings {
            single_frame_duration_ms: 20_000_000_000_000,
            ..Default::default()
        };
        // Out of ClockTime range in nanoseconds; must not panic
        assert_eq!(
            raw.single_frame_duration(),
            gst::ClockTime::from_mseconds(timing::MAX_SINGLE_FRAME_DURATION_MS)
        );

        let settings = raw.validated();
        assert_eq!(
            settings.single_frame_duration_ms,
            timing::MAX_SINGLE_FRAME_DURATION_MS
        );

        let settings = CompressionSettings {
            single_frame_duration_ms: u64::MAX,
            ..Default::default()
        }
        .validated();
        assert_eq!(
            settings.single_frame_duration_ms,
            timing::MAX_SINGLE_FRAME_DURATION_MS
        );
    }

    #[test]
    fn test_transform_override_wins() {
        let custom = Transform::rotation(0.25);
        let settings = CompressionSettings {
            video_orientation: VideoOrientation::Portrait,
            video_transform: Some(custom),
            ..Default::default()
        };
        assert_eq!(settings.track_transform(), custom);

        let settings = CompressionSettings {
            video_orientation: VideoOrientation::LandscapeRight,
            ..Default::default()
        };
        assert_eq!(settings.track_transform(), Transform::IDENTITY);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: CompressionSettings =
            serde_json::from_str(r#"{"transfer_profile":"Pq","quality":0.5}"#).unwrap();
        assert_eq!(settings.transfer_profile, TransferProfile::Pq);
        assert_eq!(settings.quality, 0.5);
        assert_eq!(settings.codec_profile, CodecProfile::Hevc10Bit);
    }
}
