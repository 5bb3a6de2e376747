//! An online latency histogram with logarithmic buckets.

use std::fmt;

/// Steps within one decade of bucket limits.
const STEPS: [f64; 16] = [
    10.0, 12.0, 14.0, 16.0, 18.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 60.0, 70.0, 80.0, 90.0,
];

/// Number of decades covered by [`STEPS`], starting at 10.
const DECADES: usize = 11;

const NUM_BUCKETS: usize = 9 + STEPS.len() * DECADES + 2;

/// Upper (inclusive) limit of every bucket.
///
/// `1..=9`, then the steps of every decade up to `9e11`, then `1e12`, then an overflow bucket.
static BUCKET_LIMITS: [f64; NUM_BUCKETS] = bucket_limits();

/// Width of the bar rendered for a bucket holding all samples.
const BAR_WIDTH: f64 = 20.0;

const fn bucket_limits() -> [f64; NUM_BUCKETS] {
    let mut limits = [0.0; NUM_BUCKETS];
    let mut i = 0;
    while i < 9 {
        limits[i] = (i + 1) as f64;
        i += 1;
    }

    let mut scale = 1.0;
    let mut decade = 0;
    while decade < DECADES {
        let mut step = 0;
        while step < STEPS.len() {
            limits[i] = STEPS[step] * scale;
            i += 1;
            step += 1;
        }
        scale *= 10.0;
        decade += 1;
    }

    limits[i] = 1e12;
    limits[i + 1] = f64::INFINITY;
    limits
}

/// Collects latency samples and summarizes their distribution.
///
/// Samples are microseconds. Besides the bucket counts, the histogram keeps exact count, sum,
/// sum of squares, minimum and maximum, so mean and standard deviation do not suffer from
/// bucketing. Percentiles are estimated from the buckets.
#[derive(Clone, Debug)]
pub struct Histogram {
    min: f64,
    max: f64,
    count: u64,
    sum: f64,
    sum_squares: f64,
    buckets: [u64; NUM_BUCKETS],
}

impl Histogram {
    /// Creates an empty histogram.
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: 0.0,
            count: 0,
            sum: 0.0,
            sum_squares: 0.0,
            buckets: [0; NUM_BUCKETS],
        }
    }

    /// Discards all samples.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Records one sample.
    pub fn add(&mut self, value: f64) {
        let bucket = BUCKET_LIMITS
            .partition_point(|&limit| limit < value)
            .min(NUM_BUCKETS - 1);
        self.buckets[bucket] += 1;

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.sum += value;
        self.sum_squares += value * value;
    }

    /// Adds all samples of `other` to this histogram.
    pub fn merge(&mut self, other: &Histogram) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
        self.sum += other.sum;
        self.sum_squares += other.sum_squares;
        for (bucket, count) in self.buckets.iter_mut().zip(other.buckets) {
            *bucket += count;
        }
    }

    /// Number of recorded samples.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Smallest recorded sample, in microseconds.
    pub fn min(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.min }
    }

    /// Largest recorded sample.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Mean of all samples, `0` when empty.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Population standard deviation of the samples.
    pub fn standard_deviation(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.average();
        let variance = self.sum_squares / self.count as f64 - mean * mean;
        variance.max(0.0).sqrt()
    }

    /// Estimated 50th percentile.
    pub fn median(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Estimates the value below which `p` percent of the samples fall.
    ///
    /// Interpolates linearly within the bucket that crosses the threshold, clamped to the
    /// observed minimum and maximum.
    pub fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }

        let threshold = self.count as f64 * (p / 100.0);
        let mut cumulative = 0.0;
        for (b, &count) in self.buckets.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let left_sum = cumulative;
            cumulative += count as f64;
            if cumulative >= threshold {
                let left = if b == 0 { 0.0 } else { BUCKET_LIMITS[b - 1] };
                let right = BUCKET_LIMITS[b].min(self.max);
                let pos = (threshold - left_sum) / count as f64;
                let value = left + (right - left) * pos;
                return value.clamp(self.min, self.max);
            }
        }

        self.max
    }

    /// Iterates over `(lower, upper, count)` of every non-empty bucket.
    pub fn buckets(&self) -> impl Iterator<Item = (f64, f64, u64)> + '_ {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(b, &count)| {
                let left = if b == 0 { 0.0 } else { BUCKET_LIMITS[b - 1] };
                (left, BUCKET_LIMITS[b], count)
            })
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Count: {}  Average: {:.4}  StdDev: {:.2}",
            self.count,
            self.average(),
            self.standard_deviation()
        )?;
        writeln!(
            f,
            "Min: {:.4}  Median: {:.4}  Max: {:.4}",
            self.min(),
            self.median(),
            self.max()
        )?;
        writeln!(f, "{}", "-".repeat(54))?;

        let total = self.count as f64;
        let mut cumulative = 0;
        for (left, right, count) in self.buckets() {
            cumulative += count;
            let share = count as f64 / total;
            let marks = (BAR_WIDTH * share + 0.5) as usize;
            writeln!(
                f,
                "( {left:7.0}, {right:7.0} ] {count:7} {:7.3}% {:7.3}% {}",
                100.0 * share,
                100.0 * cumulative as f64 / total,
                "#".repeat(marks)
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn limits_increase_from_one_to_a_trillion() {
        assert_eq!(BUCKET_LIMITS[0], 1.0);
        assert!(BUCKET_LIMITS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(BUCKET_LIMITS[NUM_BUCKETS - 2], 1e12);
        assert_eq!(BUCKET_LIMITS[NUM_BUCKETS - 1], f64::INFINITY);
    }

    #[test]
    fn empty_histogram_reports_zero() {
        let histogram = Histogram::new();
        assert_eq!(histogram.count(), 0);
        assert_eq!(histogram.average(), 0.0);
        assert_eq!(histogram.standard_deviation(), 0.0);
        assert_eq!(histogram.min(), 0.0);
        assert_eq!(histogram.max(), 0.0);
        assert_eq!(histogram.median(), 0.0);

        let rendered = histogram.to_string();
        assert!(rendered.starts_with("Count: 0  Average: 0.0000  StdDev: 0.00\n"));
        assert!(!rendered.contains('#'));
    }

    #[test]
    fn clear_resets_everything() {
        let mut histogram = Histogram::new();
        histogram.add(3.0);
        histogram.add(30_000.0);
        histogram.clear();
        histogram.clear();

        assert_eq!(histogram.count(), 0);
        assert_eq!(histogram.buckets().count(), 0);
        assert_eq!(histogram.to_string(), Histogram::new().to_string());
    }

    #[test]
    fn samples_go_to_the_smallest_limit_not_below_them() {
        let mut histogram = Histogram::new();
        histogram.add(10.0);
        histogram.add(10.5);
        histogram.add(0.2);
        histogram.add(5e12);

        let buckets: Vec<_> = histogram.buckets().collect();
        assert_eq!(
            buckets,
            [
                (0.0, 1.0, 1),
                (9.0, 10.0, 1),
                (10.0, 12.0, 1),
                (1e12, f64::INFINITY, 1),
            ]
        );
    }

    #[test]
    fn bucket_counts_add_up() {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut histogram = Histogram::new();
        for _ in 0..10_000 {
            let exponent: f64 = rng.random_range(-1.0..13.0);
            histogram.add(10f64.powf(exponent));
        }

        let total: u64 = histogram.buckets().map(|(_, _, count)| count).sum();
        assert_eq!(total, 10_000);
        assert_eq!(histogram.count(), 10_000);
    }

    #[test]
    fn mean_and_standard_deviation() {
        let mut histogram = Histogram::new();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            histogram.add(value);
        }

        assert_eq!(histogram.average(), 5.0);
        assert!((histogram.standard_deviation() - 2.0).abs() < 1e-9);
        assert_eq!(histogram.min(), 2.0);
        assert_eq!(histogram.max(), 9.0);
    }

    #[test]
    fn constant_samples_have_no_spread() {
        let mut histogram = Histogram::new();
        for _ in 0..1_000 {
            histogram.add(2.0);
        }
        assert_eq!(histogram.standard_deviation(), 0.0);
        assert_eq!(histogram.median(), 2.0);
    }

    #[test]
    fn percentiles_are_bucket_estimates() {
        let mut histogram = Histogram::new();
        for value in 1..=100 {
            histogram.add(value as f64);
        }

        let median = histogram.median();
        assert!((45.0..=55.0).contains(&median), "{median}");
        let p99 = histogram.percentile(99.0);
        assert!((90.0..=100.0).contains(&p99), "{p99}");
        assert_eq!(histogram.percentile(100.0), 100.0);
        assert_eq!(histogram.percentile(0.0), 1.0);
    }

    #[test]
    fn merge_combines_samples() {
        let mut a = Histogram::new();
        let mut b = Histogram::new();
        a.add(1.0);
        a.add(100.0);
        b.add(1_000.0);

        a.merge(&b);
        assert_eq!(a.count(), 3);
        assert_eq!(a.min(), 1.0);
        assert_eq!(a.max(), 1_000.0);
        assert_eq!(a.average(), 367.0);
        assert_eq!(a.buckets().count(), 3);
    }

    #[test]
    fn renders_bucket_lines() {
        let mut histogram = Histogram::new();
        histogram.add(1.0);
        histogram.add(15.0);
        histogram.add(15.5);
        histogram.add(16.0);

        let rendered = histogram.to_string();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Count: 4  Average: 11.8750  StdDev: 6.29");
        assert_eq!(lines[2], "-".repeat(54));
        assert_eq!(
            lines[3],
            "(       0,       1 ]       1  25.000%  25.000% #####"
        );
        assert_eq!(
            lines[4],
            "(      14,      16 ]       3  75.000% 100.000% ###############"
        );
    }
}
