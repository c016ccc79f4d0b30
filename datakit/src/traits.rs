use crate::intervals::Interval;

/// Trait for strategies that reduce a run list to a maximum count by merging
/// the two adjacent runs separated by the smallest gap.
///
/// Implementors must merge in the same order as a leftmost-argmin scan over
/// the gaps: smallest gap first, ties resolved towards the lowest index.
pub trait IntervalCapper {
    /// Merge runs in place until at most `max_intervals` remain.
    ///
    /// `runs` is sorted by start and non-overlapping. `max_intervals` is
    /// assumed to be positive.
    fn cap(&self, runs: &mut Vec<Interval>, max_intervals: usize);
    /// Short name used in logs and benchmark labels.
    fn name(&self) -> &'static str;
}
