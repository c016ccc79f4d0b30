//! This library provides helpers for inspecting recorded data such as
//!  * Foreground interval extraction with closest-gap capping as `find_intervals`
//!  * Bounding boxes from row/column projection intervals as `boxes_from_intervals`
//!  * Image crops, grids, colour transforms and projections in `image_proc`
//!  * Time tables and action indicators in `timestamps`
//!  * Renaming of recordings after a CSV log in `renamer`
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]

pub mod generators;

pub mod intervals;
pub use intervals::{
    cap_start_stop, find_intervals, Interval, IntervalError, IntervalExtractor,
};

mod traits;
pub use self::traits::*;

pub mod bbox;
pub use bbox::{boxes_from_intervals, BoundingBox, Point};

pub mod image_proc;
pub use image_proc::{Image, ImageError};

pub mod plot;
pub mod timestamps;
pub mod renamer;
pub mod config;
pub use config::Config;

pub mod cli;
pub mod utils;
