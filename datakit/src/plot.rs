//! PNG plots of sequences and image projections.
//!
//! Plots are drawn with the plotters bitmap backend and carry no text, so
//! no font stack is needed.

use std::path::Path;

use plotters::prelude::*;
use thiserror::Error;

use crate::image_proc::Projection;
use crate::intervals::Interval;

/// Errors that can occur while plotting.
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("nothing to plot: no finite samples")]
    Empty,

    #[error("plotting error: {0}")]
    Drawing(String),
}

/// Result type for plotting operations.
pub type Result<T> = std::result::Result<T, PlotError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 1280;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 720;

/// One colour per channel, cycled beyond three.
const CHANNEL_COLORS: &[RGBColor] = &[
    RGBColor(228, 26, 28),  // red
    RGBColor(77, 175, 74),  // green
    RGBColor(55, 126, 184), // blue
    RGBColor(152, 78, 163), // purple
];

const SEQUENCE_COLOR: RGBColor = RGBColor(55, 126, 184);
const INTERVAL_COLOR: RGBColor = RGBColor(255, 127, 0);

fn drawing<E: std::fmt::Display>(e: E) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Finite min/max of `values`, widened when flat.
fn value_bounds<'a>(values: impl IntoIterator<Item = &'a f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        return None;
    }
    if (hi - lo).abs() < f64::EPSILON {
        return Some((lo - 1.0, hi + 1.0));
    }
    let pad = (hi - lo) * 0.05;
    Some((lo - pad, hi + pad))
}

/// Plot `values` against their index with `intervals` shaded behind.
///
/// # Errors
/// [`PlotError::Empty`] without finite samples, [`PlotError::Drawing`] on
/// backend failure.
#[allow(clippy::cast_precision_loss)]
pub fn plot_sequence(output_path: &Path, values: &[f64], intervals: &[Interval]) -> Result<()> {
    let (y_min, y_max) = value_bounds(values).ok_or(PlotError::Empty)?;
    let x_max = values.len().saturating_sub(1).max(1) as f64;

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(-0.5..x_max + 0.5, y_min..y_max)
        .map_err(drawing)?;

    chart
        .draw_series(intervals.iter().map(|iv| {
            Rectangle::new(
                [
                    (iv.start as f64 - 0.5, y_min),
                    (iv.stop as f64 + 0.5, y_max),
                ],
                INTERVAL_COLOR.mix(0.3).filled(),
            )
        }))
        .map_err(drawing)?;

    chart
        .draw_series(LineSeries::new(
            values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_finite())
                .map(|(i, &v)| (i as f64, v)),
            &SEQUENCE_COLOR,
        ))
        .map_err(drawing)?;

    root.present().map_err(drawing)?;
    Ok(())
}

/// Plot the row projection (left, first row at the top) next to the column
/// projection (right), one line per channel.
///
/// # Errors
/// [`PlotError::Empty`] without finite samples, [`PlotError::Drawing`] on
/// backend failure.
#[allow(clippy::cast_precision_loss)]
pub fn plot_projection(output_path: &Path, projection: &Projection) -> Result<()> {
    let (row_lo, row_hi) = value_bounds(projection.rows.iter()).ok_or(PlotError::Empty)?;
    let (col_lo, col_hi) = value_bounds(projection.cols.iter()).ok_or(PlotError::Empty)?;
    let height = projection.rows.nrows();
    let width = projection.cols.nrows();

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT))
        .into_drawing_area();
    root.fill(&WHITE).map_err(drawing)?;
    let (left, right) = root.split_horizontally(DEFAULT_WIDTH / 3);

    let mut rows_chart = ChartBuilder::on(&left)
        .margin(10)
        .build_cartesian_2d(row_lo..row_hi, -0.5..height as f64 - 0.5)
        .map_err(drawing)?;
    let mut cols_chart = ChartBuilder::on(&right)
        .margin(10)
        .build_cartesian_2d(-0.5..width as f64 - 0.5, col_lo..col_hi)
        .map_err(drawing)?;

    for (channel, color) in (0..projection.rows.ncols()).zip(CHANNEL_COLORS.iter().cycle()) {
        let rows = projection.rows.column(channel);
        rows_chart
            .draw_series(LineSeries::new(
                rows.iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_finite())
                    // flip so that row 0 sits at the top
                    .map(|(y, &v)| (v, (height - 1 - y) as f64)),
                color,
            ))
            .map_err(drawing)?;

        let cols = projection.cols.column(channel);
        cols_chart
            .draw_series(LineSeries::new(
                cols.iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(x, &v)| (x as f64, v)),
                color,
            ))
            .map_err(drawing)?;
    }

    root.present().map_err(drawing)?;
    Ok(())
}
