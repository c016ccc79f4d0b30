//! Foreground run detection in 1-D sequences.
//!
//! A run is a maximal stretch of samples that differ from a *discard* value
//! (background). Runs are reported as inclusive `(start, stop)` index pairs
//! and can be capped to a maximum count by repeatedly merging the two
//! neighbouring runs that are closest to each other.
//!
//! # Example
//! ```rust
//! use datakit::intervals::{find_intervals, Interval};
//!
//! let seq = [0, 0, 5, 5, 0, 0, 7, 7, 7, 0, 0];
//! let runs = find_intervals(&seq, 0, 100).unwrap();
//! assert_eq!(runs, vec![Interval::new(2, 3), Interval::new(6, 8)]);
//!
//! let merged = find_intervals(&seq, 0, 1).unwrap();
//! assert_eq!(merged, vec![Interval::new(2, 8)]);
//! ```

mod capping;
pub use capping::{GapQueue, LinearScan};

use crate::traits::IntervalCapper;
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of runs kept when no explicit cap is given.
pub const DEFAULT_MAX_INTERVALS: usize = 100;

/// Errors raised while extracting runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("sequence needs at least 2 samples, got {len}")]
    TooShort { len: usize },

    #[error("max_intervals must be positive")]
    ZeroMaxIntervals,

    #[error("start and stop should be of the same length, got {starts} and {stops}")]
    Validation { starts: usize, stops: usize },

    #[error("interval {index} is not ordered: start {start}, stop {stop}, previous stop {previous:?}")]
    Unordered {
        index: usize,
        start: usize,
        stop: usize,
        previous: Option<usize>,
    },
}

/// Result type for run extraction.
pub type Result<T> = std::result::Result<T, IntervalError>;

/// Inclusive index range of a run.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Interval {
    /// First index of the run.
    pub start: usize,
    /// Last index of the run (inclusive).
    pub stop: usize,
}

impl Interval {
    /// Create a new interval. `start` must not exceed `stop`.
    #[must_use]
    pub fn new(start: usize, stop: usize) -> Self {
        debug_assert!(start <= stop, "interval start {start} after stop {stop}");
        Self { start, stop }
    }

    /// Number of samples covered.
    #[allow(clippy::len_without_is_empty)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stop - self.start + 1
    }

    /// Whether `index` lies inside the interval.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.stop).contains(&index)
    }

    /// Distance from this interval's stop to the start of `next`.
    #[must_use]
    pub fn gap_to(&self, next: &Interval) -> usize {
        next.start.saturating_sub(self.stop)
    }
}

impl From<(usize, usize)> for Interval {
    fn from((start, stop): (usize, usize)) -> Self {
        Self::new(start, stop)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start, self.stop)
    }
}

/// Extracts runs of non-discard samples and caps their number.
///
/// The capping strategy is pluggable through [`IntervalCapper`]; the default
/// [`GapQueue`] and the reference [`LinearScan`] produce identical output.
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalExtractor<T, C = GapQueue> {
    discard: T,
    max_intervals: usize,
    capper: C,
}

impl<T: PartialEq> IntervalExtractor<T, GapQueue> {
    /// Create an extractor treating `discard` as background, keeping at most
    /// [`DEFAULT_MAX_INTERVALS`] runs.
    pub fn new(discard: T) -> Self {
        Self {
            discard,
            max_intervals: DEFAULT_MAX_INTERVALS,
            capper: GapQueue,
        }
    }
}

impl<T: PartialEq, C: IntervalCapper> IntervalExtractor<T, C> {
    /// Replace the capping strategy.
    pub fn with_capper<D: IntervalCapper>(self, capper: D) -> IntervalExtractor<T, D> {
        IntervalExtractor {
            discard: self.discard,
            max_intervals: self.max_intervals,
            capper,
        }
    }

    /// Set the maximum number of runs returned by [`extract`](Self::extract).
    #[must_use]
    pub fn with_max_intervals(mut self, max_intervals: usize) -> Self {
        self.max_intervals = max_intervals;
        self
    }

    /// The background value.
    pub fn discard(&self) -> &T {
        &self.discard
    }

    /// The configured cap.
    pub fn max_intervals(&self) -> usize {
        self.max_intervals
    }

    /// Detect runs without capping them.
    ///
    /// Only interior positions are scanned for transitions; a run that is
    /// still open at either end of the sequence is closed against index `0`
    /// or `len - 1`. A sequence with no transitions at all yields a single
    /// run spanning it.
    ///
    /// # Errors
    /// [`IntervalError::TooShort`] when `sequence` has fewer than 2 samples.
    pub fn runs(&self, sequence: &[T]) -> Result<Vec<Interval>> {
        if sequence.len() < 2 {
            return Err(IntervalError::TooShort {
                len: sequence.len(),
            });
        }
        let (mut starts, mut stops) = scan_transitions(sequence, &self.discard);
        repair_boundaries(&mut starts, &mut stops, sequence.len() - 1);
        pair_up(&starts, &stops)
    }

    /// Detect runs and merge the closest ones until at most
    /// `max_intervals` remain.
    ///
    /// # Errors
    /// [`IntervalError::TooShort`] for sequences shorter than 2 samples,
    /// [`IntervalError::ZeroMaxIntervals`] when the cap is zero.
    pub fn extract(&self, sequence: &[T]) -> Result<Vec<Interval>> {
        if self.max_intervals == 0 {
            return Err(IntervalError::ZeroMaxIntervals);
        }
        let mut runs = self.runs(sequence)?;
        let natural = runs.len();
        self.capper.cap(&mut runs, self.max_intervals);
        trace!(
            "{}: {} runs detected, {} kept (max {})",
            self.capper.name(),
            natural,
            runs.len(),
            self.max_intervals
        );
        Ok(runs)
    }
}

/// Find the runs of `sequence` that differ from `discard`, merging the
/// closest neighbours until at most `max_intervals` remain.
///
/// # Errors
/// See [`IntervalExtractor::extract`].
pub fn find_intervals<T: PartialEq>(
    sequence: &[T],
    discard: T,
    max_intervals: usize,
) -> Result<Vec<Interval>> {
    IntervalExtractor::new(discard)
        .with_max_intervals(max_intervals)
        .extract(sequence)
}

/// Pair start and stop indices into intervals and cap them to
/// `max_intervals`.
///
/// # Errors
/// [`IntervalError::Validation`] when the two lists differ in length,
/// [`IntervalError::Unordered`] when a stop precedes its start or a run does
/// not begin after the previous one ends,
/// [`IntervalError::ZeroMaxIntervals`] when the cap is zero.
pub fn cap_start_stop(
    starts: &[usize],
    stops: &[usize],
    max_intervals: usize,
) -> Result<Vec<Interval>> {
    let mut runs = pair_up(starts, stops)?;
    if max_intervals == 0 {
        return Err(IntervalError::ZeroMaxIntervals);
    }
    GapQueue.cap(&mut runs, max_intervals);
    Ok(runs)
}

fn scan_transitions<T: PartialEq>(sequence: &[T], discard: &T) -> (Vec<usize>, Vec<usize>) {
    let mut starts = Vec::new();
    let mut stops = Vec::new();
    for (i, w) in sequence.windows(3).enumerate() {
        let mid = i + 1;
        if w[0] == *discard && w[1] != *discard {
            starts.push(mid);
        }
        if w[1] != *discard && w[2] == *discard {
            stops.push(mid);
        }
    }
    (starts, stops)
}

fn repair_boundaries(starts: &mut Vec<usize>, stops: &mut Vec<usize>, last: usize) {
    match (starts.first().copied(), stops.first().copied()) {
        (Some(first_start), Some(first_stop)) => {
            // run already open at index 0
            if first_start > first_stop {
                starts.insert(0, 0);
            }
            // run still open at the end; the front insertion above leaves
            // the last start untouched
            if starts.last() > stops.last() {
                stops.push(last);
            }
        }
        _ => {
            if starts.is_empty() {
                starts.insert(0, 0);
            }
            if stops.is_empty() {
                stops.push(last);
            }
        }
    }
}

fn pair_up(starts: &[usize], stops: &[usize]) -> Result<Vec<Interval>> {
    if starts.len() != stops.len() {
        return Err(IntervalError::Validation {
            starts: starts.len(),
            stops: stops.len(),
        });
    }
    let mut previous: Option<usize> = None;
    let mut runs = Vec::with_capacity(starts.len());
    for (index, (&start, &stop)) in starts.iter().zip(stops).enumerate() {
        if start > stop || previous.is_some_and(|p| p >= start) {
            return Err(IntervalError::Unordered {
                index,
                start,
                stop,
                previous,
            });
        }
        runs.push(Interval { start, stop });
        previous = Some(stop);
    }
    Ok(runs)
}
