// SPDX-License-Identifier: GPL-3.0-only

//! Still image encoding
//!
//! Renders one locked capture buffer as an oriented JPEG next to the video.
//! Runs synchronously on the compression queue while the frame's pixels are
//! locked, so it never copies more than the RGB conversion needs.

use crate::constants::still;
use crate::errors::PhotoError;
use crate::media::formats::conversions::to_rgb_image;
use crate::media::frame::PixelBufferGuard;
use crate::media::orientation::ImageOrientation;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Encoded image data ready for saving
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG renderer for the still image side channel
#[derive(Debug, Clone)]
pub struct StillImageEncoder {
    destination: PathBuf,
    orientation: ImageOrientation,
    quality: u8,
}

impl StillImageEncoder {
    /// Create an encoder writing to `destination` at the fixed still quality
    pub fn new(destination: impl Into<PathBuf>, orientation: ImageOrientation) -> Self {
        Self {
            destination: destination.into(),
            orientation,
            quality: still::jpeg_quality(),
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Convert and orient locked pixels
    pub fn render(&self, pixels: &PixelBufferGuard<'_>) -> Result<RgbImage, PhotoError> {
        let rgb = to_rgb_image(pixels, pixels.width(), pixels.height(), pixels.format())
            .ok_or_else(|| {
                PhotoError::UnsupportedFormat(format!(
                    "{:?} {}x{} buffer too short",
                    pixels.format(),
                    pixels.width(),
                    pixels.height()
                ))
            })?;
        Ok(self.orientation.apply(rgb))
    }

    /// Encode image as JPEG
    pub fn encode(&self, image: RgbImage) -> Result<EncodedImage, PhotoError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, self.quality);

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PhotoError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        debug!(size = buffer.len(), "Encoding complete");
        Ok(EncodedImage {
            data: buffer,
            width: image.width(),
            height: image.height(),
        })
    }

    /// Render, encode and write the still image
    pub fn write(&self, pixels: &PixelBufferGuard<'_>) -> Result<PathBuf, PhotoError> {
        let encoded = self.encode(self.render(pixels)?)?;

        std::fs::write(&self.destination, &encoded.data)
            .map_err(|e| PhotoError::SaveFailed(format!("{}: {}", self.destination.display(), e)))?;

        info!(
            path = %self.destination.display(),
            width = encoded.width,
            height = encoded.height,
            orientation = ?self.orientation,
            "Still image saved"
        );
        Ok(self.destination.clone())
    }

    /// Write the still image, logging instead of failing
    ///
    /// The still image is a side product; its failure never affects the
    /// video.
    pub fn write_logged(&self, pixels: &PixelBufferGuard<'_>) -> bool {
        match self.write(pixels) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, path = %self.destination.display(), "Still image not written");
                false
            }
        }
    }
}
