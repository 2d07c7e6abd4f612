//! Sparse latency histogram and its reduction to summary statistics.

use serde::{Deserialize, Serialize};

/// `min` reported for a histogram that never saw a sample.
pub const NO_SAMPLES_MIN: u64 = u64::MAX;

/// Summary statistics of one histogram.
///
/// With `samples == 0` every derived field is 0 and `min` is
/// [`NO_SAMPLES_MIN`]; check `samples` before reading anything else.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReducedStats {
    pub samples: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub mode: u64,
    pub median: f64,
    pub range: u64,
    pub mad: f64,
    pub variance: f64,
    pub stddev: f64,
}

impl ReducedStats {
    fn empty() -> Self {
        Self {
            samples: 0,
            min: NO_SAMPLES_MIN,
            max: 0,
            mean: 0.0,
            mode: 0,
            median: 0.0,
            range: 0,
            mad: 0.0,
            variance: 0.0,
            stddev: 0.0,
        }
    }
}

/// Bucket index -> count, plus running total, min and max.
///
/// Storage is dense, indexed by bucket, and grows to the highest index
/// seen. An index that was never written is distinguishable from one
/// written with a zero count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHistogram {
    buckets: Vec<Option<u64>>,
    total: u64,
    min: u64,
    max: u64,
}

impl Default for SampleHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleHistogram {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Histogram pre-sized for indices below `ceiling`.
    pub fn with_capacity(ceiling: usize) -> Self {
        Self {
            buckets: Vec::with_capacity(ceiling),
            total: 0,
            min: NO_SAMPLES_MIN,
            max: 0,
        }
    }

    /// Record a single observation of `value`.
    pub fn add_sample(&mut self, value: usize) {
        self.add_bucket(value, 1);
    }

    /// Add `count` observations at `index`.
    ///
    /// The bucket entry is created even for `count == 0`, but min and max
    /// only move for non-zero counts.
    pub fn add_bucket(&mut self, index: usize, count: u64) {
        if index >= self.buckets.len() {
            self.buckets.resize(index + 1, None);
        }
        let slot = &mut self.buckets[index];
        *slot = Some(slot.unwrap_or(0) + count);

        if count != 0 {
            let index = index as u64;
            self.min = self.min.min(index);
            self.max = self.max.max(index);
        }
        self.total += count;
    }

    /// Fold every bucket of `other` into this histogram.
    pub fn merge(&mut self, other: &SampleHistogram) {
        for (index, count) in other.buckets() {
            self.add_bucket(index, count);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    /// Count at `index`, `None` if never written.
    pub fn count(&self, index: usize) -> Option<u64> {
        self.buckets.get(index).copied().flatten()
    }

    /// Written buckets in ascending index order, zero counts included.
    pub fn buckets(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(index, count)| count.map(|c| (index, c)))
    }

    /// Number of distinct indices written.
    pub fn len(&self) -> usize {
        self.buckets.iter().filter(|c| c.is_some()).count()
    }

    /// True when no sample has been recorded.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn populated(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.buckets()
            .filter(|&(_, count)| count != 0)
            .map(|(index, count)| (index as u64, count))
    }

    /// Reduce to summary statistics. Pure; calling it twice gives the same
    /// result.
    pub fn reduce(&self) -> ReducedStats {
        let total = self.total;
        if total == 0 {
            return ReducedStats::empty();
        }

        let weighted: u128 = self
            .populated()
            .map(|(index, count)| index as u128 * count as u128)
            .sum();
        let mean = weighted as f64 / total as f64;

        let mut mode = 0;
        let mut mode_count = 0;
        for (index, count) in self.populated() {
            if count > mode_count {
                mode = index;
                mode_count = count;
            }
        }

        let median = self.median();

        let mut abs_dev = 0.0;
        let mut sq_dev = 0.0;
        for (index, count) in self.populated() {
            let delta = index as f64 - mean;
            abs_dev += delta.abs() * count as f64;
            sq_dev += delta * delta * count as f64;
        }
        let mad = abs_dev / total as f64;
        let variance = if total > 1 {
            sq_dev / (total - 1) as f64
        } else {
            0.0
        };

        ReducedStats {
            samples: total,
            min: self.min,
            max: self.max,
            mean,
            mode,
            median,
            range: self.max - self.min,
            mad,
            variance,
            stddev: variance.sqrt(),
        }
    }

    /// Median over the populated buckets.
    ///
    /// The median bucket is the first whose cumulative count reaches
    /// `ceil(total / 2)`. For an even total that lands exactly on a bucket
    /// boundary the two middle samples sit in different buckets, so the
    /// result is the midpoint of this index and the next populated one.
    fn median(&self) -> f64 {
        let total = self.total;
        let target = total.div_ceil(2);
        let mut cumulative = 0;
        let mut populated = self.populated();

        while let Some((index, count)) = populated.next() {
            cumulative += count;
            if cumulative < target {
                continue;
            }
            if total % 2 == 0 && cumulative == target {
                if let Some((next, _)) = populated.next() {
                    return (index + next) as f64 / 2.0;
                }
            }
            return index as f64;
        }
        0.0
    }
}
