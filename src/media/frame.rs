// SPDX-License-Identifier: GPL-3.0-only

//! Capture frames and lockable pixel buffers

use crate::errors::VideoCompressionError;
use gstreamer as gst;
use std::ops::Deref;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Pixel format of a capture buffer
///
/// All formats are stored tightly packed (no row padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 8 bits per channel (4 bytes per pixel)
    Rgba8,
    /// RGBA - 16 bits per channel, little endian (8 bytes per pixel)
    Rgba16Le,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    Nv12,
    /// P010 - Semi-planar 4:2:0, 10 bits in the high bits of 16-bit words
    P010,
}

impl PixelFormat {
    /// Size in bytes of one frame of this format
    pub fn frame_size(&self, width: u32, height: u32) -> usize {
        let (w, h) = (width as usize, height as usize);
        let chroma = w.div_ceil(2) * 2 * h.div_ceil(2);
        match self {
            Self::Rgba8 => w * h * 4,
            Self::Rgba16Le => w * h * 8,
            Self::Nv12 => w * h + chroma,
            Self::P010 => (w * h + chroma) * 2,
        }
    }

    /// Whether samples carry more than 8 bits per component
    pub fn is_high_bit_depth(&self) -> bool {
        matches!(self, Self::Rgba16Le | Self::P010)
    }

    /// Convert to a GStreamer video/x-raw format string.
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::Rgba8 => "RGBA",
            Self::Rgba16Le => "RGBA64_LE",
            Self::Nv12 => "NV12",
            Self::P010 => "P010_10LE",
        }
    }
}

/// How a pixel buffer is locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared access, pixels are only read
    ReadOnly,
    /// Exclusive access
    ReadWrite,
}

/// Pixel data with a known layout, guarded by a read-write lock
///
/// Capture sources may reuse a buffer as soon as they hand it over, so every
/// consumer accesses the pixels through a scoped [`PixelBufferGuard`].
#[derive(Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: RwLock<Vec<u8>>,
}

impl PixelBuffer {
    /// Wrap pixel data, checking its size against the layout
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, String> {
        if width == 0 || height == 0 {
            return Err(format!("Invalid dimensions {}x{}", width, height));
        }
        let expected = format.frame_size(width, height);
        if data.len() != expected {
            return Err(format!(
                "{:?} {}x{} needs {} bytes, got {}",
                format,
                width,
                height,
                expected,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            format,
            data: RwLock::new(data),
        })
    }

    /// Convert a decoded image, keeping 16-bit precision when the source has it
    pub fn from_image(image: &image::DynamicImage) -> Result<Self, String> {
        use image::DynamicImage;

        match image {
            DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb32F(_)
            | DynamicImage::ImageRgba32F(_) => {
                let rgba = image.to_rgba16();
                let (width, height) = rgba.dimensions();
                let data = rgba
                    .into_raw()
                    .into_iter()
                    .flat_map(|v| v.to_le_bytes())
                    .collect();
                Self::new(width, height, PixelFormat::Rgba16Le, data)
            }
            _ => {
                let rgba = image.to_rgba8();
                let (width, height) = rgba.dimensions();
                Self::new(width, height, PixelFormat::Rgba8, rgba.into_raw())
            }
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Lock the pixels for the lifetime of the returned guard
    ///
    /// A poisoned lock means a previous holder panicked mid-write; the pixel
    /// data can no longer be trusted and is reported as missing.
    pub fn lock(&self, mode: LockMode) -> Result<PixelBufferGuard<'_>, VideoCompressionError> {
        let access = match mode {
            LockMode::ReadOnly => self
                .data
                .read()
                .map(Access::Shared)
                .map_err(|_| VideoCompressionError::ImageMissing)?,
            LockMode::ReadWrite => self
                .data
                .write()
                .map(Access::Exclusive)
                .map_err(|_| VideoCompressionError::ImageMissing)?,
        };
        Ok(PixelBufferGuard {
            buffer: self,
            access,
        })
    }
}

enum Access<'a> {
    Shared(RwLockReadGuard<'a, Vec<u8>>),
    Exclusive(RwLockWriteGuard<'a, Vec<u8>>),
}

/// Scoped access to a locked [`PixelBuffer`], released on drop
pub struct PixelBufferGuard<'a> {
    buffer: &'a PixelBuffer,
    access: Access<'a>,
}

impl PixelBufferGuard<'_> {
    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    pub fn format(&self) -> PixelFormat {
        self.buffer.format
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self.access, Access::Exclusive(_))
    }
}

impl Deref for PixelBufferGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.access {
            Access::Shared(data) => data.as_slice(),
            Access::Exclusive(data) => data.as_slice(),
        }
    }
}

/// A single frame delivered by a capture source
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    /// Decoded image, `None` when the source delivered no pixels
    pub image: Option<Arc<PixelBuffer>>,
    /// Presentation timestamp
    pub pts: gst::ClockTime,
    /// Real frame duration, when the source knows it
    pub duration: Option<gst::ClockTime>,
}

impl CaptureFrame {
    pub fn new(image: PixelBuffer, pts: gst::ClockTime) -> Self {
        Self {
            image: Some(Arc::new(image)),
            pts,
            duration: None,
        }
    }

    /// A frame that carries timing but no pixels
    pub fn without_image(pts: gst::ClockTime) -> Self {
        Self {
            image: None,
            pts,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: gst::ClockTime) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Width and height of the image, if any
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| (img.width(), img.height()))
    }
}
