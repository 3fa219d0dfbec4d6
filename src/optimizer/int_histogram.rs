use std::fmt;

use super::error::{StatsError, StatsResult};
use crate::execution::PredicateOp;

/// Equi-width histogram over a fixed integer range.
///
/// Only per-bucket counts are stored, so space and update time are constant
/// in the number of values seen. Selectivity estimates treat values as
/// uniformly distributed within their bucket.
pub struct IntHistogram {
    buckets: Vec<usize>,
    min: i32,
    max: i32,
    width: i64,
    total: usize,
}

impl IntHistogram {
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let span = max as i64 - min as i64 + 1;
        let buckets_i64 = buckets as i64;
        let width = ((span + buckets_i64 - 1) / buckets_i64).max(1);
        Self {
            buckets: vec![0; buckets],
            min,
            max,
            width,
            total: 0,
        }
    }

    fn index_of(&self, value: i32) -> usize {
        let idx = (value as i64 - self.min as i64) / self.width;
        idx.clamp(0, self.buckets.len() as i64 - 1) as usize
    }

    /// Left edge of the bucket holding `value`
    fn left_edge(&self, idx: usize) -> i64 {
        self.min as i64 + idx as i64 * self.width
    }

    pub fn add_value(&mut self, value: i32) -> StatsResult<()> {
        if value < self.min || value > self.max {
            return Err(StatsError::OutOfRange {
                value,
                min: self.min,
                max: self.max,
            });
        }
        let idx = self.index_of(value);
        self.buckets[idx] += 1;
        self.total += 1;
        Ok(())
    }

    /// Estimated fraction of recorded values satisfying `op value`, in
    /// `[0, 1]`
    pub fn estimate_selectivity(&self, op: PredicateOp, value: i32) -> f64 {
        let selectivity = match op {
            PredicateOp::Equals => self.eq_selectivity(value),
            PredicateOp::NotEquals => 1.0 - self.eq_selectivity(value),
            PredicateOp::GreaterThan => self.gt_selectivity(value),
            PredicateOp::LessThan => self.lt_selectivity(value),
            PredicateOp::GreaterThanOrEq => self.gt_selectivity(value) + self.eq_selectivity(value),
            PredicateOp::LessThanOrEq => self.lt_selectivity(value) + self.eq_selectivity(value),
        };
        selectivity.clamp(0.0, 1.0)
    }

    fn eq_selectivity(&self, value: i32) -> f64 {
        if value < self.min || value > self.max || self.total == 0 {
            return 0.0;
        }
        let idx = self.index_of(value);
        (self.buckets[idx] as f64 / self.width as f64) / self.total as f64
    }

    fn gt_selectivity(&self, value: i32) -> f64 {
        if value < self.min {
            return 1.0;
        }
        if value > self.max || self.total == 0 {
            return 0.0;
        }
        let idx = self.index_of(value);
        let n = self.total as f64;
        let right_edge = self.left_edge(idx) + self.width;
        let partial = (right_edge - value as i64) as f64 / self.width as f64;
        let mut selectivity = self.buckets[idx] as f64 / n * partial;
        for &count in &self.buckets[idx + 1..] {
            selectivity += count as f64 / n;
        }
        selectivity
    }

    fn lt_selectivity(&self, value: i32) -> f64 {
        if value < self.min {
            return 0.0;
        }
        if value > self.max {
            return 1.0;
        }
        if self.total == 0 {
            return 0.0;
        }
        let idx = self.index_of(value);
        let n = self.total as f64;
        let partial = (value as i64 - self.left_edge(idx)) as f64 / self.width as f64;
        let mut selectivity = self.buckets[idx] as f64 / n * partial;
        for &count in &self.buckets[..idx] {
            selectivity += count as f64 / n;
        }
        selectivity
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

impl fmt::Display for IntHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "min={} max={} width={} total={}",
            self.min, self.max, self.width, self.total
        )?;
        for (idx, count) in self.buckets.iter().enumerate() {
            writeln!(
                f,
                "[{}, {}) {}",
                self.left_edge(idx),
                self.left_edge(idx) + self.width,
                count
            )?;
        }
        Ok(())
    }
}
