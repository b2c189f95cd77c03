// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use hlgcam::constants::{QualityPreset, quality_to_quantizer, still, timing};

#[test]
fn test_quality_preset_values() {
    // Test that all presets exist (Low, Medium, High)
    assert_eq!(QualityPreset::ALL.len(), 3);
}

#[test]
fn test_quality_preset_ordering() {
    // Presets are ordered from lowest to highest quality
    let mut prev = 0.0f32;
    for preset in QualityPreset::ALL {
        let quality = preset.quality_factor();
        assert!(quality > prev, "Presets should be ordered from lowest to highest");
        assert!(quality <= 1.0);
        prev = quality;
    }
}

#[test]
fn test_quantizer_falls_with_quality() {
    assert!(quality_to_quantizer(0.9) < quality_to_quantizer(0.5));
    assert!(quality_to_quantizer(1.0) <= quality_to_quantizer(0.0));
}

#[test]
fn test_quality_preset_display_names() {
    for preset in QualityPreset::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_still_and_timing_constants() {
    assert_eq!(still::jpeg_quality(), 85);
    assert_eq!(timing::SINGLE_FRAME_DURATION_MS, 1000);
    assert!(timing::APPEND_POLL_INTERVAL < timing::APPEND_READY_TIMEOUT);
}
