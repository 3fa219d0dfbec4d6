use super::NUM_HIST_BINS;
use super::error::StatsResult;
use super::int_histogram::IntHistogram;
use crate::execution::PredicateOp;

/// Histogram over a string column.
///
/// Strings are folded to integers (the first four bytes packed big-endian,
/// shifted into the non-negative `i32` range) and the counts kept in a
/// fixed 100-bin integer histogram. The fold preserves prefix order, so
/// range predicates behave sensibly.
pub struct StringHistogram {
    hist: IntHistogram,
}

fn fold(s: &str) -> i32 {
    let bytes = s.as_bytes();
    let mut packed: u32 = 0;
    for i in 0..4 {
        packed = (packed << 8) | bytes.get(i).copied().unwrap_or(0) as u32;
    }
    (packed >> 1) as i32
}

impl StringHistogram {
    pub fn new() -> Self {
        Self {
            hist: IntHistogram::new(NUM_HIST_BINS, 0, i32::MAX),
        }
    }

    pub fn add_value(&mut self, value: &str) -> StatsResult<()> {
        self.hist.add_value(fold(value))
    }

    pub fn estimate_selectivity(&self, op: PredicateOp, value: &str) -> f64 {
        self.hist.estimate_selectivity(op, fold(value))
    }

    pub fn total(&self) -> usize {
        self.hist.total()
    }
}

impl Default for StringHistogram {
    fn default() -> Self {
        Self::new()
    }
}
