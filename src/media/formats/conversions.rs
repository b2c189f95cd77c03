// SPDX-License-Identifier: MPL-2.0

//! Format conversion utilities
//!
//! CPU conversions from capture pixel formats to 8-bit RGB, used by the
//! still image side channel.

use crate::media::frame::PixelFormat;
use image::RgbImage;

/// Convert tightly packed pixel data to an 8-bit RGB image
///
/// Returns `None` when the data is shorter than the layout requires.
pub fn to_rgb_image(data: &[u8], width: u32, height: u32, format: PixelFormat) -> Option<RgbImage> {
    if data.len() < format.frame_size(width, height) {
        return None;
    }

    let rgb = match format {
        PixelFormat::Rgba8 => rgba8_to_rgb(data),
        PixelFormat::Rgba16Le => rgba16_to_rgb(data),
        PixelFormat::Nv12 => nv12_to_rgb(data, width, height),
        PixelFormat::P010 => p010_to_rgb(data, width, height),
    };

    RgbImage::from_raw(width, height, rgb)
}

fn rgba8_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect()
}

fn rgba16_to_rgb(data: &[u8]) -> Vec<u8> {
    // Keep the high byte of each little-endian 16-bit component
    data.chunks_exact(8)
        .flat_map(|px| [px[1], px[3], px[5]])
        .collect()
}

/// Full-range YCbCr coefficients (Kr, Kb) for a matrix
#[derive(Clone, Copy)]
struct Matrix {
    kr: f32,
    kb: f32,
}

const BT709: Matrix = Matrix {
    kr: 0.2126,
    kb: 0.0722,
};

const BT2020: Matrix = Matrix {
    kr: 0.2627,
    kb: 0.0593,
};

fn ycbcr_to_rgb(y: f32, cb: f32, cr: f32, m: Matrix) -> [u8; 3] {
    let kg = 1.0 - m.kr - m.kb;
    let r = y + 2.0 * (1.0 - m.kr) * cr;
    let b = y + 2.0 * (1.0 - m.kb) * cb;
    let g = (y - m.kr * r - m.kb * b) / kg;
    [
        (r * 255.0).clamp(0.0, 255.0) as u8,
        (g * 255.0).clamp(0.0, 255.0) as u8,
        (b * 255.0).clamp(0.0, 255.0) as u8,
    ]
}

/// Convert NV12 (BT.709) to packed RGB
pub fn nv12_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let chroma_stride = w.div_ceil(2) * 2;
    let (luma, chroma) = data.split_at(w * h);
    let mut rgb = Vec::with_capacity(w * h * 3);

    for row in 0..h {
        for col in 0..w {
            let y = luma[row * w + col] as f32 / 255.0;
            let uv = (row / 2) * chroma_stride + (col / 2) * 2;
            let cb = chroma[uv] as f32 / 255.0 - 0.5;
            let cr = chroma[uv + 1] as f32 / 255.0 - 0.5;
            rgb.extend_from_slice(&ycbcr_to_rgb(y, cb, cr, BT709));
        }
    }

    rgb
}

/// Convert P010 (BT.2020) to packed RGB
///
/// The transfer curve is left untouched, so HLG/PQ content looks flat
/// when viewed as SDR.
pub fn p010_to_rgb(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let sample = |bytes: &[u8], index: usize| -> f32 {
        let word = u16::from_le_bytes([bytes[index * 2], bytes[index * 2 + 1]]);
        (word >> 6) as f32 / 1023.0
    };
    let chroma_stride = w.div_ceil(2) * 2;
    let (luma, chroma) = data.split_at(w * h * 2);
    let mut rgb = Vec::with_capacity(w * h * 3);

    for row in 0..h {
        for col in 0..w {
            let y = sample(luma, row * w + col);
            let uv = (row / 2) * chroma_stride + (col / 2) * 2;
            let cb = sample(chroma, uv) - 0.5;
            let cr = sample(chroma, uv + 1) - 0.5;
            rgb.extend_from_slice(&ycbcr_to_rgb(y, cb, cr, BT2020));
        }
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_drops_alpha() {
        let img = to_rgb_image(&[10, 20, 30, 255, 40, 50, 60, 0], 2, 1, PixelFormat::Rgba8).unwrap();
        assert_eq!(img.as_raw(), &vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_rgba16_keeps_high_byte() {
        let px: Vec<u8> = [0xff00u16, 0x8000, 0x0100, 0xffff]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let img = to_rgb_image(&px, 1, 1, PixelFormat::Rgba16Le).unwrap();
        assert_eq!(img.as_raw(), &vec![0xff, 0x80, 0x01]);
    }

    #[test]
    fn test_nv12_grey_stays_grey() {
        // 2x2 luma of mid grey, neutral chroma
        let data = vec![128, 128, 128, 128, 128, 128];
        let img = to_rgb_image(&data, 2, 2, PixelFormat::Nv12).unwrap();
        for px in img.pixels() {
            assert!(px.0.iter().all(|c| (*c as i32 - 128).abs() <= 1));
        }
    }

    #[test]
    fn test_p010_white() {
        let white = (1023u16 << 6).to_le_bytes();
        let neutral = (512u16 << 6).to_le_bytes();
        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&white);
        }
        data.extend_from_slice(&neutral);
        data.extend_from_slice(&neutral);
        let img = to_rgb_image(&data, 2, 2, PixelFormat::P010).unwrap();
        for px in img.pixels() {
            assert!(px.0.iter().all(|c| *c >= 254));
        }
    }

    #[test]
    fn test_short_data_rejected() {
        assert!(to_rgb_image(&[0; 3], 1, 1, PixelFormat::Rgba8).is_none());
    }
}
