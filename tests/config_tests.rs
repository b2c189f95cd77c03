// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use hlgcam::Config;
use hlgcam::media::formats::{CodecProfile, ContainerFormat, TransferProfile};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.compression.transfer_profile, TransferProfile::Hlg);
    assert_eq!(config.compression.codec_profile, CodecProfile::Hevc10Bit);
    assert_eq!(config.compression.container, ContainerFormat::QuickTime);
    assert!(
        config.compression.save_still_image,
        "Still image should be written by default"
    );
    assert!(config.output_dir.is_none());
}

#[test]
fn test_config_partial_file() {
    // Fields missing from the file keep their defaults
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "compression": { "transfer_profile": "Pq", "quality": 0.5 } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.compression.transfer_profile, TransferProfile::Pq);
    assert_eq!(config.compression.quality, 0.5);
    assert!(config.compression.expecting_single_frame);
    assert_eq!(config.compression.single_frame_duration_ms, 1000);
}

#[test]
fn test_output_dir_default() {
    let config = Config::default();
    assert!(config.output_dir().ends_with("hlgcam"));
}
