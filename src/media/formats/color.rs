// SPDX-License-Identifier: MPL-2.0

//! Colour description for wide-colour and HDR encoding
//!
//! A [`TransferProfile`] selects the three colour properties written into
//! the compressed stream (primaries, transfer function, YCbCr matrix) plus
//! the full-range flag:
//!
//! | Profile | Primaries | Transfer        | Matrix  | Full range |
//! |---------|-----------|-----------------|---------|------------|
//! | SDR     | BT.709    | BT.709          | BT.709  | unset      |
//! | HLG     | BT.2020   | BT.2100 HLG     | BT.2020 | false      |
//! | PQ      | BT.2020   | SMPTE ST 2084   | BT.2020 | false      |

use gstreamer_video as gst_video;
use serde::{Deserialize, Serialize};

/// Transfer-function profile requested for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransferProfile {
    /// Standard dynamic range, BT.709
    Sdr,
    /// Hybrid log-gamma, BT.2100
    #[default]
    Hlg,
    /// Perceptual quantizer, SMPTE ST 2084
    Pq,
}

/// Colour primaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorPrimaries {
    Bt709,
    Bt2020,
}

/// Transfer function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferFunction {
    Bt709,
    /// ITU-R BT.2100 hybrid log-gamma
    Hlg,
    /// SMPTE ST 2084 perceptual quantizer
    Pq,
}

/// YCbCr conversion matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum YCbCrMatrix {
    Bt709,
    Bt2020,
}

/// Complete colour description of an encoded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorDescription {
    pub primaries: ColorPrimaries,
    pub transfer: TransferFunction,
    pub matrix: YCbCrMatrix,
    /// `None` leaves the encoder default in place
    pub full_range: Option<bool>,
}

impl TransferProfile {
    /// Colour properties for this profile
    pub fn color_description(&self) -> ColorDescription {
        match self {
            TransferProfile::Sdr => ColorDescription {
                primaries: ColorPrimaries::Bt709,
                transfer: TransferFunction::Bt709,
                matrix: YCbCrMatrix::Bt709,
                full_range: None,
            },
            TransferProfile::Hlg => ColorDescription {
                primaries: ColorPrimaries::Bt2020,
                transfer: TransferFunction::Hlg,
                matrix: YCbCrMatrix::Bt2020,
                full_range: Some(false),
            },
            TransferProfile::Pq => ColorDescription {
                primaries: ColorPrimaries::Bt2020,
                transfer: TransferFunction::Pq,
                matrix: YCbCrMatrix::Bt2020,
                full_range: Some(false),
            },
        }
    }

    /// Whether the profile carries high dynamic range content
    pub fn is_hdr(&self) -> bool {
        self.color_description().is_hdr()
    }
}

impl ColorDescription {
    pub fn is_hdr(&self) -> bool {
        matches!(self.transfer, TransferFunction::Hlg | TransferFunction::Pq)
    }

    /// GStreamer colorimetry string (`range:matrix:transfer:primaries`)
    ///
    /// Numeric codes follow `GstVideoColorRange`, `GstVideoColorMatrix`,
    /// `GstVideoTransferFunction` and `GstVideoColorPrimaries`.
    pub fn colorimetry_string(&self) -> String {
        let range = match self.full_range {
            Some(true) => 1,
            Some(false) => 2,
            None => 0,
        };
        let matrix = match self.matrix {
            YCbCrMatrix::Bt709 => 3,
            YCbCrMatrix::Bt2020 => 6,
        };
        let transfer = match self.transfer {
            TransferFunction::Bt709 => 5,
            TransferFunction::Pq => 14,
            TransferFunction::Hlg => 15,
        };
        let primaries = match self.primaries {
            ColorPrimaries::Bt709 => 1,
            ColorPrimaries::Bt2020 => 7,
        };
        format!("{}:{}:{}:{}", range, matrix, transfer, primaries)
    }

    /// Parse the description into a GStreamer colorimetry value
    pub fn gst_colorimetry(&self) -> Result<gst_video::VideoColorimetry, String> {
        let text = self.colorimetry_string();
        text.parse::<gst_video::VideoColorimetry>()
            .map_err(|e| format!("Invalid colorimetry {}: {}", text, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdr_uses_bt709() {
        let desc = TransferProfile::Sdr.color_description();
        assert_eq!(desc.primaries, ColorPrimaries::Bt709);
        assert_eq!(desc.transfer, TransferFunction::Bt709);
        assert_eq!(desc.matrix, YCbCrMatrix::Bt709);
        assert_eq!(desc.full_range, None);
        assert!(!TransferProfile::Sdr.is_hdr());
    }

    #[test]
    fn test_hdr_profiles_use_bt2020_limited_range() {
        let hlg = TransferProfile::Hlg.color_description();
        assert_eq!(hlg.primaries, ColorPrimaries::Bt2020);
        assert_eq!(hlg.transfer, TransferFunction::Hlg);
        assert_eq!(hlg.matrix, YCbCrMatrix::Bt2020);
        assert_eq!(hlg.full_range, Some(false));

        let pq = TransferProfile::Pq.color_description();
        assert_eq!(pq.primaries, ColorPrimaries::Bt2020);
        assert_eq!(pq.transfer, TransferFunction::Pq);
        assert_eq!(pq.full_range, Some(false));
        assert!(TransferProfile::Hlg.is_hdr());
        assert!(pq.is_hdr());
    }

    #[test]
    fn test_colorimetry_strings() {
        assert_eq!(
            TransferProfile::Hlg.color_description().colorimetry_string(),
            "2:6:15:7"
        );
        assert_eq!(
            TransferProfile::Pq.color_description().colorimetry_string(),
            "2:6:14:7"
        );
        assert_eq!(
            TransferProfile::Sdr.color_description().colorimetry_string(),
            "0:3:5:1"
        );
    }
}
