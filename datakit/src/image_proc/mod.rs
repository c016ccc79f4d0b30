//! Multi-channel raster images backed by `ndarray`.
//!
//! Every [`Image`] is stored as `rows x cols x channels`, grayscale images
//! simply carry a single channel. Operations that depend on the pixel layout
//! check [`Image::channels`] up front instead of guessing from the shape.
//!
//! # Coordinate System
//!
//! - **ndarray**: `[row, col, channel]` = `[y, x, c]`
//! - **`BoundingBox`**: `(x, y)` corners, `br` exclusive when cropping

pub mod color;
pub mod io;

pub use color::PixelOrder;

use crate::bbox::{boxes_from_intervals, BoundingBox, Point};
use crate::intervals::{find_intervals, IntervalError};
use log::debug;
use ndarray::{s, Array2, Array3, ArrayView1, ArrayView2, Axis};
use num_traits::ToPrimitive;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Errors raised by image helpers.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("not valid top-left/bottom-right coordinates, tl must be lower than br, got {0}")]
    InvalidCrop(BoundingBox),

    #[error("{bbox} exceeds image of {width}x{height}")]
    OutOfBounds {
        bbox: BoundingBox,
        width: usize,
        height: usize,
    },

    #[error("expected {expected} channel values, got {got}")]
    ChannelMismatch { expected: usize, got: usize },

    #[error("channel {channel} out of range for an image with {channels} channels")]
    NoSuchChannel { channel: usize, channels: usize },

    #[error("grid needs at least one row and one column, got {rows}x{cols}")]
    EmptyGrid { rows: usize, cols: usize },

    #[error("image would have zero size")]
    Empty,

    #[error("raw buffer does not fit a {width}x{height} image")]
    RawBuffer { width: usize, height: usize },

    #[error(transparent)]
    Intervals(#[from] IntervalError),

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("codec error: {0}")]
    Codec(#[from] image::ImageError),
}

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, ImageError>;

/// Raster image, `rows x cols x channels`.
#[derive(Clone, Debug, PartialEq)]
pub struct Image<T> {
    data: Array3<T>,
}

/// One cell of [`Image::split_grid`].
#[derive(Clone, Debug, PartialEq)]
pub struct GridCell<T> {
    /// Grid row, from the top.
    pub row: usize,
    /// Grid column, from the left.
    pub col: usize,
    /// Pixels of the cell.
    pub image: Image<T>,
}

impl<T> GridCell<T> {
    /// `"row-col"`, e.g. `"0-1"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}-{}", self.row, self.col)
    }
}

/// Row and column means of an image, one column per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Projection {
    /// Mean of each row, shape `(height, channels)`.
    pub rows: Array2<f64>,
    /// Mean of each column, shape `(width, channels)`.
    pub cols: Array2<f64>,
}

impl Projection {
    /// Row projection of one channel.
    #[must_use]
    pub fn rows_channel(&self, channel: usize) -> Option<ArrayView1<'_, f64>> {
        (channel < self.rows.ncols()).then(|| self.rows.column(channel))
    }

    /// Column projection of one channel.
    #[must_use]
    pub fn cols_channel(&self, channel: usize) -> Option<ArrayView1<'_, f64>> {
        (channel < self.cols.ncols()).then(|| self.cols.column(channel))
    }
}

impl<T> Image<T> {
    /// Wrap a `rows x cols x channels` array.
    pub fn from_array(data: Array3<T>) -> Self {
        Self { data }
    }

    /// Single-channel image from a `rows x cols` array.
    pub fn from_gray(gray: Array2<T>) -> Self {
        Self {
            data: gray.insert_axis(Axis(2)),
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.data.dim().2
    }

    /// Whether the image has a single channel.
    #[must_use]
    pub fn is_gray(&self) -> bool {
        self.channels() == 1
    }

    /// The underlying `rows x cols x channels` array.
    #[must_use]
    pub fn as_array(&self) -> &Array3<T> {
        &self.data
    }

    /// Unwrap into the underlying array.
    #[must_use]
    pub fn into_array(self) -> Array3<T> {
        self.data
    }

    /// View of a single channel.
    ///
    /// # Errors
    /// [`ImageError::NoSuchChannel`] when `channel` is out of range.
    pub fn channel(&self, channel: usize) -> Result<ArrayView2<'_, T>> {
        if channel >= self.channels() {
            return Err(ImageError::NoSuchChannel {
                channel,
                channels: self.channels(),
            });
        }
        Ok(self.data.index_axis(Axis(2), channel))
    }

    /// Channel values of the pixel at row `y`, column `x`.
    #[must_use]
    pub fn pixel(&self, y: usize, x: usize) -> ArrayView1<'_, T> {
        self.data.slice(s![y, x, ..])
    }
}

impl<T: Clone> Image<T> {
    /// Crop rows `tl.y..br.y` and columns `tl.x..br.x`.
    ///
    /// # Errors
    /// [`ImageError::InvalidCrop`] unless `tl < br` on both axes,
    /// [`ImageError::OutOfBounds`] when `br` lies outside the image.
    pub fn crop(&self, bbox: &BoundingBox) -> Result<Self> {
        if !bbox.is_ordered() {
            return Err(ImageError::InvalidCrop(*bbox));
        }
        if bbox.br.x > self.width() || bbox.br.y > self.height() {
            return Err(ImageError::OutOfBounds {
                bbox: *bbox,
                width: self.width(),
                height: self.height(),
            });
        }
        let view = self
            .data
            .slice(s![bbox.tl.y..bbox.br.y, bbox.tl.x..bbox.br.x, ..]);
        Ok(Self {
            data: view.to_owned(),
        })
    }

    /// Split into `nrows x ncols` cells of (nearly) equal size, row by row.
    ///
    /// # Errors
    /// [`ImageError::EmptyGrid`] when either count is zero.
    pub fn split_grid(&self, nrows: usize, ncols: usize) -> Result<Vec<GridCell<T>>> {
        if nrows == 0 || ncols == 0 {
            return Err(ImageError::EmptyGrid {
                rows: nrows,
                cols: ncols,
            });
        }
        let (h, w) = (self.height(), self.width());
        let mut cells = Vec::with_capacity(nrows * ncols);
        for row in 0..nrows {
            for col in 0..ncols {
                let view = self.data.slice(s![
                    row * h / nrows..(row + 1) * h / nrows,
                    col * w / ncols..(col + 1) * w / ncols,
                    ..
                ]);
                cells.push(GridCell {
                    row,
                    col,
                    image: Self {
                        data: view.to_owned(),
                    },
                });
            }
        }
        debug!("split {w}x{h} image into {nrows}x{ncols} cells");
        Ok(cells)
    }
}

impl<T: Clone + PartialEq> Image<T> {
    fn match_mask(&self, matching: &[T]) -> Result<Array2<bool>> {
        if matching.len() != self.channels() {
            return Err(ImageError::ChannelMismatch {
                expected: self.channels(),
                got: matching.len(),
            });
        }
        Ok(Array2::from_shape_fn(
            (self.height(), self.width()),
            |(y, x)| self.pixel(y, x).iter().eq(matching.iter()),
        ))
    }

    /// Replace every pixel equal to `matching` with `on_match`, keeping the
    /// others.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless both slices have one value per
    /// channel.
    pub fn replace(&self, matching: &[T], on_match: &[T]) -> Result<Self> {
        let mask = self.match_mask(matching)?;
        if on_match.len() != self.channels() {
            return Err(ImageError::ChannelMismatch {
                expected: self.channels(),
                got: on_match.len(),
            });
        }
        let data = Array3::from_shape_fn(self.data.dim(), |(y, x, c)| {
            if mask[[y, x]] {
                on_match[c].clone()
            } else {
                self.data[[y, x, c]].clone()
            }
        });
        Ok(Self { data })
    }

    /// Map pixels equal to `matching` to `on_match` and every other pixel to
    /// `otherwise`. The output has `on_match.len()` channels.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] when `matching` does not have one value
    /// per channel, or `on_match` and `otherwise` differ in length.
    pub fn substitute<U: Clone>(
        &self,
        matching: &[T],
        on_match: &[U],
        otherwise: &[U],
    ) -> Result<Image<U>> {
        let mask = self.match_mask(matching)?;
        if on_match.len() != otherwise.len() {
            return Err(ImageError::ChannelMismatch {
                expected: on_match.len(),
                got: otherwise.len(),
            });
        }
        if on_match.is_empty() {
            return Err(ImageError::Empty);
        }
        let data = Array3::from_shape_fn(
            (self.height(), self.width(), on_match.len()),
            |(y, x, c)| {
                if mask[[y, x]] {
                    on_match[c].clone()
                } else {
                    otherwise[c].clone()
                }
            },
        );
        Ok(Image { data })
    }
}

impl<T: Copy + PartialOrd> Image<T> {
    /// White (255) where every channel lies inside its inclusive range,
    /// black elsewhere. The output keeps the channel count.
    ///
    /// # Errors
    /// [`ImageError::ChannelMismatch`] unless there is one range per channel.
    pub fn filter_channels(&self, ranges: &[RangeInclusive<T>]) -> Result<Image<u8>> {
        if ranges.len() != self.channels() {
            return Err(ImageError::ChannelMismatch {
                expected: self.channels(),
                got: ranges.len(),
            });
        }
        let mask = Array2::from_shape_fn((self.height(), self.width()), |(y, x)| {
            self.pixel(y, x)
                .iter()
                .zip(ranges)
                .all(|(v, range)| range.contains(v))
        });
        let data = Array3::from_shape_fn(self.data.dim(), |(y, x, _)| {
            if mask[[y, x]] {
                255
            } else {
                0
            }
        });
        Ok(Image { data })
    }
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0_usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

fn first_last_hit(projection: &Array2<f64>, discard: f64) -> Option<(usize, usize)> {
    let mut hits = projection
        .outer_iter()
        .enumerate()
        .filter(|(_, line)| line.iter().any(|&v| v != discard))
        .map(|(i, _)| i);
    let first = hits.next()?;
    Some((first, hits.last().unwrap_or(first)))
}

impl<T: Copy + ToPrimitive> Image<T> {
    /// Mean of every row and every column, per channel, ignoring NaN
    /// samples. A line without any valid sample projects to NaN.
    #[must_use]
    pub fn projection(&self) -> Projection {
        let to_f64 = |v: &T| v.to_f64().unwrap_or(f64::NAN);
        let (h, w, c) = self.data.dim();
        let rows = Array2::from_shape_fn((h, c), |(y, ch)| {
            nan_mean(self.data.slice(s![y, .., ch]).iter().map(to_f64))
        });
        let cols = Array2::from_shape_fn((w, c), |(x, ch)| {
            nan_mean(self.data.slice(s![.., x, ch]).iter().map(to_f64))
        });
        Projection { rows, cols }
    }

    /// Tightest box around the projection samples that differ from
    /// `discard` on any channel.
    ///
    /// An axis without any such sample keeps the widest bounds, `0` and the
    /// image size. Found bounds are the first and last foreground index.
    #[must_use]
    pub fn projection_bbox(&self, discard: f64) -> BoundingBox {
        let projection = self.projection();
        let (left, right) =
            first_last_hit(&projection.cols, discard).unwrap_or((0, self.width()));
        let (top, bottom) =
            first_last_hit(&projection.rows, discard).unwrap_or((0, self.height()));
        BoundingBox {
            tl: Point::new(left, top),
            br: Point::new(right, bottom),
        }
    }

    /// Boxes formed by the foreground intervals of the first channel's row
    /// and column projections, capped at `max_h` row intervals and `max_v`
    /// column intervals.
    ///
    /// # Errors
    /// [`ImageError::NoSuchChannel`] for an image without channels.
    /// Propagates [`IntervalError`] for images narrower or shorter than two
    /// pixels, or zero caps.
    pub fn projection_boxes(
        &self,
        discard: f64,
        max_h: usize,
        max_v: usize,
    ) -> Result<Vec<BoundingBox>> {
        let no_channel = || ImageError::NoSuchChannel {
            channel: 0,
            channels: self.channels(),
        };
        let projection = self.projection();
        let rows = projection.rows_channel(0).ok_or_else(no_channel)?.to_vec();
        let cols = projection.cols_channel(0).ok_or_else(no_channel)?.to_vec();
        let h_intervals = find_intervals(&rows, discard, max_h)?;
        let v_intervals = find_intervals(&cols, discard, max_v)?;
        debug!(
            "projection intervals: {} rows x {} cols",
            h_intervals.len(),
            v_intervals.len()
        );
        Ok(boxes_from_intervals(&h_intervals, &v_intervals))
    }
}

/// Lay `images` out on a grid with `ncols` columns, every cell sized to the
/// largest image. Grayscale images are widened to the common channel count.
///
/// # Errors
/// [`ImageError::Empty`] for no images or zero columns,
/// [`ImageError::ChannelMismatch`] when colour images disagree on channels.
pub fn tile(images: &[Image<u8>], ncols: usize) -> Result<Image<u8>> {
    if images.is_empty() || ncols == 0 {
        return Err(ImageError::Empty);
    }
    let channels = images.iter().map(Image::channels).max().unwrap_or(1);
    if let Some(odd) = images
        .iter()
        .find(|img| img.channels() != 1 && img.channels() != channels)
    {
        return Err(ImageError::ChannelMismatch {
            expected: channels,
            got: odd.channels(),
        });
    }
    let cell_h = images.iter().map(Image::height).max().unwrap_or(0);
    let cell_w = images.iter().map(Image::width).max().unwrap_or(0);
    let nrows = images.len().div_ceil(ncols);
    let mut out = Array3::<u8>::zeros((nrows * cell_h, ncols * cell_w, channels));
    for (i, img) in images.iter().enumerate() {
        let (y0, x0) = ((i / ncols) * cell_h, (i % ncols) * cell_w);
        let mut target = out.slice_mut(s![
            y0..y0 + img.height(),
            x0..x0 + img.width(),
            ..
        ]);
        if img.channels() == channels {
            target.assign(&img.data);
        } else {
            // gray cell in a colour mosaic
            let dim = target.dim();
            target.assign(&img.data.broadcast(dim).ok_or(ImageError::Empty)?);
        }
    }
    Ok(Image { data: out })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::boxes_image;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr2, Array};

    fn ramp(h: usize, w: usize, c: usize) -> Image<u16> {
        let n = h * w * c;
        let data = Array::from_iter(0..n as u16).into_shape((h, w, c)).unwrap();
        Image::from_array(data)
    }

    #[test]
    fn gray_images_have_one_channel() {
        let img = Image::from_gray(arr2(&[[1_u8, 2], [3, 4]]));
        assert!(img.is_gray());
        assert_eq!((img.height(), img.width(), img.channels()), (2, 2, 1));
        assert_eq!(img.channel(0).unwrap()[[1, 0]], 3);
        assert!(matches!(
            img.channel(1),
            Err(ImageError::NoSuchChannel { channel: 1, channels: 1 })
        ));
    }

    #[test]
    fn crop_excludes_bottom_right() {
        let img = ramp(6, 8, 3);
        let cropped = img.crop(&BoundingBox::new((2, 1), (5, 4))).unwrap();
        assert_eq!((cropped.height(), cropped.width(), cropped.channels()), (3, 3, 3));
        assert_eq!(cropped.pixel(0, 0), img.pixel(1, 2));
        assert_eq!(cropped.pixel(2, 2), img.pixel(3, 4));
    }

    #[test]
    fn crop_validates_corners() {
        let img = ramp(4, 4, 1);
        assert!(matches!(
            img.crop(&BoundingBox::new((2, 0), (2, 3))),
            Err(ImageError::InvalidCrop(_))
        ));
        assert!(matches!(
            img.crop(&BoundingBox::new((0, 0), (5, 3))),
            Err(ImageError::OutOfBounds { width: 4, height: 4, .. })
        ));
    }

    #[test]
    fn grid_cells_cover_the_image() {
        let img = ramp(5, 7, 1);
        let cells = img.split_grid(2, 3).unwrap();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[0].label(), "0-0");
        assert_eq!(cells[5].label(), "1-2");
        let area: usize = cells.iter().map(|c| c.image.height() * c.image.width()).sum();
        assert_eq!(area, 35);
        assert_eq!(cells[4].image.pixel(0, 0), img.pixel(2, 2));
        assert!(img.split_grid(0, 2).is_err());
    }

    #[test]
    fn projection_means_rows_and_columns() {
        let img = Image::from_gray(arr2(&[[0.0, 2.0, 4.0], [6.0, f64::NAN, 10.0]]));
        let p = img.projection();
        assert_eq!(p.rows.dim(), (2, 1));
        assert_eq!(p.cols.dim(), (3, 1));
        assert_abs_diff_eq!(p.rows[[0, 0]], 2.0);
        assert_abs_diff_eq!(p.rows[[1, 0]], 8.0);
        assert_abs_diff_eq!(p.cols[[1, 0]], 2.0);
        assert!(p.rows_channel(1).is_none());

        let all_nan = Image::from_gray(arr2(&[[f64::NAN], [f64::NAN]]));
        assert!(all_nan.projection().cols[[0, 0]].is_nan());
    }

    #[test]
    fn projection_bbox_finds_foreground() {
        let img = boxes_image(20, 30, 3, &[BoundingBox::new((4, 6), (10, 12))], 200);
        assert_eq!(img.projection_bbox(0.0), BoundingBox::new((4, 6), (10, 12)));

        let blank = boxes_image(20, 30, 1, &[], 200);
        assert_eq!(blank.projection_bbox(0.0), BoundingBox::new((0, 0), (30, 20)));
    }

    #[test]
    fn projection_boxes_pairs_row_and_column_runs() {
        let boxes = [
            BoundingBox::new((3, 2), (6, 5)),
            BoundingBox::new((12, 2), (15, 5)),
            BoundingBox::new((3, 10), (6, 14)),
            BoundingBox::new((12, 10), (15, 14)),
        ];
        let img = boxes_image(18, 20, 1, &boxes, 255);
        let found = img.projection_boxes(0.0, 5, 5).unwrap();
        assert_eq!(found, boxes.to_vec());

        let merged = img.projection_boxes(0.0, 1, 5).unwrap();
        assert_eq!(
            merged,
            vec![BoundingBox::new((3, 2), (6, 14)), BoundingBox::new((12, 2), (15, 14))]
        );
    }

    #[test]
    fn projection_boxes_need_a_channel() {
        let img = Image::from_array(Array3::<u8>::zeros((4, 4, 0)));
        assert!(matches!(
            img.projection_boxes(0.0, 1, 1),
            Err(ImageError::NoSuchChannel { channel: 0, channels: 0 })
        ));
        let tiny = Image::from_gray(arr2(&[[1_u8]]));
        assert!(matches!(
            tiny.projection_boxes(0.0, 1, 1),
            Err(ImageError::Intervals(IntervalError::TooShort { len: 1 }))
        ));
    }

    #[test]
    fn filter_channels_masks_all_channels() {
        let data = Array3::from_shape_vec(
            (1, 3, 3),
            vec![10_u8, 200, 30, 10, 20, 30, 255, 255, 255],
        )
        .unwrap();
        let img = Image::from_array(data);
        let out = img.filter_channels(&[0..=50, 0..=100, 0..=255]).unwrap();
        assert_eq!(out.pixel(0, 0).to_vec(), vec![0, 0, 0]);
        assert_eq!(out.pixel(0, 1).to_vec(), vec![255, 255, 255]);
        assert_eq!(out.pixel(0, 2).to_vec(), vec![0, 0, 0]);
        assert!(matches!(
            img.filter_channels(&[0..=1]),
            Err(ImageError::ChannelMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn substitute_and_replace() {
        let data = Array3::from_shape_vec(
            (1, 2, 3),
            vec![255_u8, 255, 255, 1, 2, 3],
        )
        .unwrap();
        let img = Image::from_array(data);

        let binary = img.substitute(&[255, 255, 255], &[1_u8], &[0]).unwrap();
        assert!(binary.is_gray());
        assert_eq!(binary.as_array().iter().copied().collect::<Vec<_>>(), vec![1, 0]);

        let replaced = img.replace(&[1, 2, 3], &[9, 9, 9]).unwrap();
        assert_eq!(replaced.pixel(0, 0).to_vec(), vec![255, 255, 255]);
        assert_eq!(replaced.pixel(0, 1).to_vec(), vec![9, 9, 9]);

        assert!(img.substitute(&[255], &[1_u8], &[0]).is_err());
        assert!(img.substitute(&[255, 255, 255], &[1_u8, 1], &[0]).is_err());
        assert!(img.replace(&[1, 2, 3], &[9]).is_err());
    }

    #[test]
    fn tile_places_cells_row_by_row() {
        let a = Image::from_array(Array3::from_elem((2, 2, 3), 10_u8));
        let b = Image::from_gray(Array2::from_elem((1, 3), 20_u8));
        let c = Image::from_array(Array3::from_elem((2, 1, 3), 30_u8));
        let mosaic = tile(&[a, b, c], 2).unwrap();
        assert_eq!((mosaic.height(), mosaic.width(), mosaic.channels()), (4, 6, 3));
        assert_eq!(mosaic.pixel(0, 0).to_vec(), vec![10, 10, 10]);
        assert_eq!(mosaic.pixel(0, 5).to_vec(), vec![20, 20, 20]);
        assert_eq!(mosaic.pixel(1, 5).to_vec(), vec![0, 0, 0]);
        assert_eq!(mosaic.pixel(3, 0).to_vec(), vec![30, 30, 30]);
        assert!(tile(&[], 2).is_err());
    }
}
