//! Top-left / bottom-right boxes built from projection intervals.

use crate::intervals::Interval;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel coordinate, `x` along columns and `y` along rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Column.
    pub x: usize,
    /// Row.
    pub y: usize,
}

impl Point {
    /// Point at column `x`, row `y`.
    #[must_use]
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Point {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

/// Rectangle given by its top-left and bottom-right corners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top-left corner.
    pub tl: Point,
    /// Bottom-right corner.
    pub br: Point,
}

impl BoundingBox {
    /// Box from its top-left and bottom-right corners.
    #[must_use]
    pub fn new(tl: impl Into<Point>, br: impl Into<Point>) -> Self {
        Self {
            tl: tl.into(),
            br: br.into(),
        }
    }

    /// Whether `tl` lies strictly above and left of `br`.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.tl.x < self.br.x && self.tl.y < self.br.y
    }

    /// `br.x - tl.x`, zero for unordered boxes.
    #[must_use]
    pub fn width(&self) -> usize {
        self.br.x.saturating_sub(self.tl.x)
    }

    /// `br.y - tl.y`, zero for unordered boxes.
    #[must_use]
    pub fn height(&self) -> usize {
        self.br.y.saturating_sub(self.tl.y)
    }

    /// Smallest integer box enclosing all `points` (`[x, y]`): corners are
    /// floored/ceiled and negative coordinates clamp to zero.
    ///
    /// Returns `None` for an empty slice or non-finite coordinates.
    ///
    /// # Example
    /// ```rust
    /// use datakit::bbox::BoundingBox;
    ///
    /// let b = BoundingBox::from_points(&[[10.2, 4.9], [3.7, 8.1]]).unwrap();
    /// assert_eq!(b, BoundingBox::new((3, 4), (11, 9)));
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        if points.is_empty() || points.iter().flatten().any(|v| !v.is_finite()) {
            return None;
        }
        let fold = |axis: usize, init: f64, pick: fn(f64, f64) -> f64| {
            points.iter().map(|p| p[axis]).fold(init, pick)
        };
        let to_index = |v: f64| v.max(0.0) as usize;
        Some(Self {
            tl: Point::new(
                to_index(fold(0, f64::INFINITY, f64::min).floor()),
                to_index(fold(1, f64::INFINITY, f64::min).floor()),
            ),
            br: Point::new(
                to_index(fold(0, f64::NEG_INFINITY, f64::max).ceil()),
                to_index(fold(1, f64::NEG_INFINITY, f64::max).ceil()),
            ),
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tl: ({}, {}), br: ({}, {})",
            self.tl.x, self.tl.y, self.br.x, self.br.y
        )
    }
}

/// Pair every row-projection interval with every column-projection interval.
///
/// `h_intervals` come from the horizontal projection (one value per row) and
/// set the `y` bounds; `v_intervals` come from the vertical projection (one
/// value per column) and set the `x` bounds. Boxes are emitted row interval
/// by row interval, so the result has `h_intervals.len() * v_intervals.len()`
/// entries.
///
/// # Example
/// ```rust
/// use datakit::bbox::{boxes_from_intervals, BoundingBox};
/// use datakit::intervals::Interval;
///
/// let boxes = boxes_from_intervals(
///     &[Interval::new(0, 2)],
///     &[Interval::new(1, 4), Interval::new(6, 8)],
/// );
/// assert_eq!(
///     boxes,
///     vec![
///         BoundingBox::new((1, 0), (4, 2)),
///         BoundingBox::new((6, 0), (8, 2)),
///     ]
/// );
/// ```
#[must_use]
pub fn boxes_from_intervals(h_intervals: &[Interval], v_intervals: &[Interval]) -> Vec<BoundingBox> {
    h_intervals
        .iter()
        .flat_map(|h| {
            v_intervals.iter().map(move |v| BoundingBox {
                tl: Point::new(v.start, h.start),
                br: Point::new(v.stop, h.stop),
            })
        })
        .collect()
}
