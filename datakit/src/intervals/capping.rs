//! Strategies for merging runs down to a maximum count.

use super::Interval;
use crate::traits::IntervalCapper;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Recompute the smallest gap after every merge.
///
/// Quadratic in the number of runs; kept as the reference behaviour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinearScan;

impl IntervalCapper for LinearScan {
    fn cap(&self, runs: &mut Vec<Interval>, max_intervals: usize) {
        while runs.len() > max_intervals.max(1) {
            // min_by_key keeps the first of equal minima
            let Some(k) = runs
                .windows(2)
                .map(|w| w[0].gap_to(&w[1]))
                .enumerate()
                .min_by_key(|&(_, gap)| gap)
                .map(|(k, _)| k)
            else {
                break;
            };
            let absorbed = runs.remove(k + 1);
            runs[k].stop = absorbed.stop;
        }
    }

    fn name(&self) -> &'static str {
        "linear-scan"
    }
}

/// Pop gaps from a min-heap keyed by `(width, position)`.
///
/// Merging two runs never changes the width of any other gap, so the gaps
/// that disappear are exactly the `len - max` smallest, taken in position
/// order on ties. Each gap is identified by the index of the run to its right.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GapQueue;

impl IntervalCapper for GapQueue {
    fn cap(&self, runs: &mut Vec<Interval>, max_intervals: usize) {
        let excess = runs.len().saturating_sub(max_intervals.max(1));
        if excess == 0 {
            return;
        }

        let mut queue: BinaryHeap<Reverse<(usize, usize)>> = runs
            .windows(2)
            .enumerate()
            .map(|(k, w)| Reverse((w[0].gap_to(&w[1]), k + 1)))
            .collect();

        let mut absorbed = vec![false; runs.len()];
        for _ in 0..excess {
            if let Some(Reverse((_, right))) = queue.pop() {
                absorbed[right] = true;
            }
        }

        let mut merged: Vec<Interval> = Vec::with_capacity(runs.len() - excess);
        for (run, &gone) in runs.iter().zip(&absorbed) {
            match merged.last_mut() {
                Some(last) if gone => last.stop = run.stop,
                _ => merged.push(*run),
            }
        }
        *runs = merged;
    }

    fn name(&self) -> &'static str {
        "gap-queue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators;
    use crate::intervals::IntervalExtractor;
    use rand::{rngs::SmallRng, Rng, SeedableRng};

    fn runs(bounds: &[(usize, usize)]) -> Vec<Interval> {
        bounds.iter().copied().map(Interval::from).collect()
    }

    #[test]
    fn nothing_to_do_under_the_cap() {
        let original = runs(&[(0, 1), (5, 6)]);
        for capper in [&LinearScan as &dyn IntervalCapper, &GapQueue] {
            let mut r = original.clone();
            capper.cap(&mut r, 2);
            assert_eq!(r, original, "{}", capper.name());
        }
    }

    #[test]
    fn equal_gaps_merge_from_the_left() {
        let original = runs(&[(0, 0), (2, 2), (4, 4), (6, 6)]);
        for capper in [&LinearScan as &dyn IntervalCapper, &GapQueue] {
            let mut r = original.clone();
            capper.cap(&mut r, 3);
            assert_eq!(r, runs(&[(0, 2), (4, 4), (6, 6)]), "{}", capper.name());
            capper.cap(&mut r, 2);
            assert_eq!(r, runs(&[(0, 4), (6, 6)]), "{}", capper.name());
        }
    }

    #[test]
    fn cap_of_one_spans_everything() {
        let original = runs(&[(3, 4), (10, 12), (13, 20), (40, 41)]);
        for capper in [&LinearScan as &dyn IntervalCapper, &GapQueue] {
            let mut r = original.clone();
            capper.cap(&mut r, 1);
            assert_eq!(r, runs(&[(3, 41)]), "{}", capper.name());
        }
    }

    #[test]
    fn strategies_agree_on_random_sequences() {
        let mut rng = SmallRng::seed_from_u64(0xABCD);
        for _ in 0..300 {
            let len = rng.gen_range(2..400);
            let p_switch = rng.gen_range(0.05..0.6);
            let seq = generators::random_runs(&mut rng, len, p_switch);
            let max = rng.gen_range(1..12);
            let linear = IntervalExtractor::new(0_u8)
                .with_capper(LinearScan)
                .with_max_intervals(max)
                .extract(&seq)
                .unwrap();
            let queue = IntervalExtractor::new(0_u8)
                .with_max_intervals(max)
                .extract(&seq)
                .unwrap();
            assert_eq!(linear, queue);
        }
    }
}
