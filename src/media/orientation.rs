// SPDX-License-Identifier: GPL-3.0-only

//! Video and still image orientation
//!
//! Video orientation is stored as a 2D affine transform on the video track;
//! still images have their orientation applied to the pixels before encoding.

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

/// Device orientation at capture time, as seen by the video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VideoOrientation {
    Portrait,
    PortraitUpsideDown,
    #[default]
    LandscapeLeft,
    LandscapeRight,
}

impl VideoOrientation {
    /// Track transform for this orientation
    pub fn transform(&self) -> Transform {
        match self {
            VideoOrientation::Portrait => Transform::rotation(FRAC_PI_2),
            VideoOrientation::PortraitUpsideDown => Transform::rotation(-FRAC_PI_2),
            VideoOrientation::LandscapeLeft => Transform::rotation(PI),
            VideoOrientation::LandscapeRight => Transform::IDENTITY,
        }
    }
}

/// 2D affine transform `[a b 0; c d 0; tx ty 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Rotation by `angle` radians
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Rotation angle in whole degrees, normalized to 0..360
    pub fn rotation_degrees(&self) -> u32 {
        let degrees = self.b.atan2(self.a).to_degrees().round() as i64;
        degrees.rem_euclid(360) as u32
    }

    /// Value of the `image-orientation` tag understood by the muxers
    ///
    /// Only quarter turns can be expressed; anything else maps to the
    /// nearest quarter turn.
    pub fn orientation_tag(&self) -> &'static str {
        let quarter = ((self.rotation_degrees() + 45) / 90) % 4;
        match quarter {
            1 => "rotate-90",
            2 => "rotate-180",
            3 => "rotate-270",
            _ => "rotate-0",
        }
    }

    /// Component-wise comparison with a tolerance
    pub fn approx_eq(&self, other: &Transform) -> bool {
        const EPS: f64 = 1e-9;
        (self.a - other.a).abs() < EPS
            && (self.b - other.b).abs() < EPS
            && (self.c - other.c).abs() < EPS
            && (self.d - other.d).abs() < EPS
            && (self.tx - other.tx).abs() < EPS
            && (self.ty - other.ty).abs() < EPS
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Orientation of the still image relative to its pixel data
///
/// Names describe where the top of the intended image lies in the stored
/// pixels, with the mirrored variants flipped horizontally first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageOrientation {
    #[default]
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

impl ImageOrientation {
    /// Clockwise rotation in degrees needed to display the pixels upright
    pub fn display_rotation(&self) -> u32 {
        match self {
            ImageOrientation::Up | ImageOrientation::UpMirrored => 0,
            ImageOrientation::Right | ImageOrientation::RightMirrored => 90,
            ImageOrientation::Down | ImageOrientation::DownMirrored => 180,
            ImageOrientation::Left | ImageOrientation::LeftMirrored => 270,
        }
    }

    pub fn is_mirrored(&self) -> bool {
        matches!(
            self,
            ImageOrientation::UpMirrored
                | ImageOrientation::DownMirrored
                | ImageOrientation::LeftMirrored
                | ImageOrientation::RightMirrored
        )
    }

    /// Bake the orientation into the pixels
    pub fn apply(&self, image: image::RgbImage) -> image::RgbImage {
        use image::imageops;

        let image = if self.is_mirrored() {
            imageops::flip_horizontal(&image)
        } else {
            image
        };

        match self.display_rotation() {
            90 => imageops::rotate90(&image),
            180 => imageops::rotate180(&image),
            270 => imageops::rotate270(&image),
            _ => image,
        }
    }
}
