//! Colour space conversions for 8-bit, 3-channel images.
//!
//! Output ranges follow the usual 8-bit conventions of computer vision
//! libraries: hue is halved to fit `0..180`, and Lab lightness is scaled to
//! `0..=255` with `a` and `b` offset by 128.

use super::{Image, ImageError, Result};
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Channel order of a 3-channel image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelOrder {
    #[default]
    Rgb,
    Bgr,
}

// sRGB (D65) to XYZ
const RGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412_453, 0.357_580, 0.180_423],
    [0.212_671, 0.715_160, 0.072_169],
    [0.019_334, 0.119_193, 0.950_227],
];
const WHITE_X: f64 = 0.950_456;
const WHITE_Z: f64 = 1.088_754;
const LAB_EPSILON: f64 = 0.008_856;

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > LAB_EPSILON {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

fn gray([r, g, b]: [u8; 3]) -> u8 {
    to_u8(0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b))
}

fn hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let (r, g, b) = (f64::from(r), f64::from(g), f64::from(b));
    let v = r.max(g).max(b);
    let diff = v - r.min(g).min(b);
    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }
    [to_u8(h / 2.0) % 180, to_u8(s), to_u8(v)]
}

fn lab(rgb: [u8; 3]) -> [u8; 3] {
    let linear = rgb.map(|c| srgb_to_linear(f64::from(c) / 255.0));
    let [x, y, z] = RGB_TO_XYZ.map(|row| row.iter().zip(&linear).map(|(m, c)| m * c).sum::<f64>());
    let (fx, fy, fz) = (lab_f(x / WHITE_X), lab_f(y), lab_f(z / WHITE_Z));
    let l = if y > LAB_EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    [
        to_u8(l * 255.0 / 100.0),
        to_u8(500.0 * (fx - fy) + 128.0),
        to_u8(200.0 * (fy - fz) + 128.0),
    ]
}

impl Image<u8> {
    fn require_three_channels(&self) -> Result<()> {
        if self.channels() == 3 {
            Ok(())
        } else {
            Err(ImageError::ChannelMismatch {
                expected: 3,
                got: self.channels(),
            })
        }
    }

    fn map_rgb<const N: usize>(&self, f: impl Fn([u8; 3]) -> [u8; N]) -> Result<Image<u8>> {
        self.require_three_channels()?;
        let (h, w, _) = self.data.dim();
        let mut out = Array3::<u8>::zeros((h, w, N));
        for y in 0..h {
            for x in 0..w {
                let px = [
                    self.data[[y, x, 0]],
                    self.data[[y, x, 1]],
                    self.data[[y, x, 2]],
                ];
                for (c, v) in f(px).into_iter().enumerate() {
                    out[[y, x, c]] = v;
                }
            }
        }
        Ok(Image { data: out })
    }

    /// Swap the first and third channel (RGB <-> BGR).
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless the image has 3 channels.
    pub fn swap_red_blue(&self) -> Result<Image<u8>> {
        self.map_rgb(|[r, g, b]| [b, g, r])
    }

    /// Luma of an RGB image, `0.299 R + 0.587 G + 0.114 B`.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless the image has 3 channels.
    pub fn to_gray(&self) -> Result<Image<u8>> {
        self.map_rgb(|px| [gray(px)])
    }

    /// HSV of an RGB image with hue in `0..180`.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless the image has 3 channels.
    pub fn to_hsv(&self) -> Result<Image<u8>> {
        self.map_rgb(hsv)
    }

    /// CIE Lab (D65) of an RGB image, 8-bit scaled.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless the image has 3 channels.
    pub fn to_lab(&self) -> Result<Image<u8>> {
        self.map_rgb(lab)
    }

    /// The image in RGB, HSV, Lab and gray, plus every single channel of the
    /// three colour spaces, labelled `"RGB"`, `"RGB ch0"`, ... `"gray"`.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless the image has 3 channels.
    pub fn basic_transforms(&self, order: PixelOrder) -> Result<Vec<(String, Image<u8>)>> {
        let rgb = match order {
            PixelOrder::Rgb => {
                self.require_three_channels()?;
                self.clone()
            }
            PixelOrder::Bgr => self.swap_red_blue()?,
        };
        let hsv = rgb.to_hsv()?;
        let lab = rgb.to_lab()?;
        let gray = rgb.to_gray()?;

        let mut out = Vec::with_capacity(13);
        for (name, img) in [("RGB", rgb), ("HSV", hsv), ("LAB", lab)] {
            for c in 0..3 {
                let single = img.channel(c)?.to_owned();
                out.push((format!("{name} ch{c}"), Image::from_gray(single)));
            }
            out.insert(out.len() - 3, (name.to_string(), img));
        }
        out.push(("gray".to_string(), gray));
        Ok(out)
    }
}
