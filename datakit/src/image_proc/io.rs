//! Conversion between [`Image`] and the `image` crate, file I/O and
//! resampling.
//!
//! - **ndarray**: `[row, col, channel]` with `(height, width, channels)` dims
//! - **image crate**: `(x, y)` with `(width, height)` dims
//!
//! Both store pixels row-major with interleaved channels, so the raw buffer
//! is shared as is.

use super::{Image, ImageError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, GrayImage, RgbImage, RgbaImage};
use log::debug;
use ndarray::Array3;
use std::path::Path;

/// Convert a decoded image into an [`Image`]: one channel for grayscale
/// sources, three for colour sources (alpha is dropped).
///
/// # Errors
/// [`ImageError::Shape`] if the decoded buffer does not match its
/// dimensions.
pub fn from_dynamic(img: &DynamicImage) -> Result<Image<u8>> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (raw, channels) = if img.color().has_color() {
        (img.to_rgb8().into_raw(), 3)
    } else {
        (img.to_luma8().into_raw(), 1)
    };
    let data = Array3::from_shape_vec((height, width, channels), raw)?;
    Ok(Image::from_array(data))
}

/// Convert an [`Image`] with 1, 3 or 4 channels into a `DynamicImage`.
///
/// # Errors
/// [`ImageError::ChannelMismatch`] for other channel counts.
#[allow(clippy::cast_possible_truncation)]
pub fn to_dynamic(img: &Image<u8>) -> Result<DynamicImage> {
    let (width, height) = (img.width(), img.height());
    let raw: Vec<u8> = img.as_array().iter().copied().collect();
    let (w, h) = (width as u32, height as u32);
    let too_small = || ImageError::RawBuffer { width, height };
    let dynamic = match img.channels() {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, raw).ok_or_else(too_small)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(too_small)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(too_small)?),
        got => return Err(ImageError::ChannelMismatch { expected: 3, got }),
    };
    Ok(dynamic)
}

/// Read an image file.
///
/// # Errors
/// [`ImageError::Codec`] when the file cannot be opened or decoded.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Image<u8>> {
    let decoded = image::open(path.as_ref())?;
    debug!(
        "loaded {} ({}x{}, {:?})",
        path.as_ref().display(),
        decoded.width(),
        decoded.height(),
        decoded.color()
    );
    from_dynamic(&decoded)
}

/// Write an image file, the format follows the extension.
///
/// # Errors
/// [`ImageError::Codec`] on encoding or I/O failure.
pub fn save<P: AsRef<Path>>(img: &Image<u8>, path: P) -> Result<()> {
    to_dynamic(img)?.save(path.as_ref())?;
    Ok(())
}

/// Resample to exactly `rows x cols`.
///
/// # Errors
/// [`ImageError::Empty`] when either target dimension is zero.
#[allow(clippy::cast_possible_truncation)]
pub fn resize(img: &Image<u8>, rows: usize, cols: usize) -> Result<Image<u8>> {
    if rows == 0 || cols == 0 {
        return Err(ImageError::Empty);
    }
    let resized = to_dynamic(img)?.resize_exact(cols as u32, rows as u32, FilterType::Triangle);
    from_dynamic(&resized)
}

/// Scale both sides by `percent` (100 keeps the size).
///
/// # Errors
/// [`ImageError::Empty`] when the result would have a zero side.
pub fn rescale(img: &Image<u8>, percent: u32) -> Result<Image<u8>> {
    let scale = |side: usize| side * percent as usize / 100;
    resize(img, scale(img.height()), scale(img.width()))
}

/// Scale so that the longer side measures about `max_pixels`.
///
/// # Errors
/// [`ImageError::Empty`] for an empty image or a zero result.
#[allow(clippy::cast_possible_truncation)]
pub fn rescale_to_max_pixel(img: &Image<u8>, max_pixels: usize) -> Result<Image<u8>> {
    let longest = img.height().max(img.width());
    if longest == 0 {
        return Err(ImageError::Empty);
    }
    rescale(img, (100 * max_pixels / longest) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn gray_roundtrip_keeps_layout() {
        let gray = Image::from_gray(Array2::from_shape_fn((3, 5), |(y, x)| (y * 10 + x) as u8));
        let dynamic = to_dynamic(&gray).unwrap();
        assert_eq!((dynamic.width(), dynamic.height()), (5, 3));
        assert_eq!(dynamic.to_luma8().get_pixel(4, 2).0, [24]);
        assert_eq!(from_dynamic(&dynamic).unwrap(), gray);
    }

    #[test]
    fn rgba_sources_drop_alpha() {
        let rgba = RgbaImage::from_pixel(2, 1, image::Rgba([1, 2, 3, 4]));
        let img = from_dynamic(&DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(img.channels(), 3);
        assert_eq!(img.pixel(0, 1).to_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn two_channel_images_cannot_be_encoded() {
        let img = Image::from_array(Array3::<u8>::zeros((2, 2, 2)));
        assert!(matches!(
            to_dynamic(&img),
            Err(ImageError::ChannelMismatch { got: 2, .. })
        ));
    }

    #[test]
    fn save_then_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.png");
        let img = Image::from_array(Array3::from_shape_fn((4, 6, 3), |(y, x, c)| {
            (y * 40 + x * 5 + c) as u8
        }));
        save(&img, &path).unwrap();
        assert_eq!(load(&path).unwrap(), img);
    }

    #[test]
    fn rescale_sizes() {
        let img = Image::from_array(Array3::from_elem((10, 20, 3), 7_u8));
        let half = rescale(&img, 50).unwrap();
        assert_eq!((half.height(), half.width(), half.channels()), (5, 10, 3));
        let capped = rescale_to_max_pixel(&img, 8).unwrap();
        assert_eq!((capped.height(), capped.width()), (4, 8));
        assert!(rescale(&img, 0).is_err());
        let exact = resize(&img, 3, 3).unwrap();
        assert_eq!(exact.pixel(1, 1).to_vec(), vec![7, 7, 7]);
    }
}
