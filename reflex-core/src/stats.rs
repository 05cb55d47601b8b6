//! Summary statistics and the fixed-width latency histogram.
//!
//! Everything here is a pure function of the recorded latencies. The
//! histogram layout never changes: 26 bins of 20 ms starting at 0, 20, ..., 500.

use serde::{Deserialize, Serialize};

pub const BIN_WIDTH_MS: u32 = 20;
pub const HISTOGRAM_MAX_MS: u32 = 500;
pub const BIN_COUNT: usize = (HISTOGRAM_MAX_MS / BIN_WIDTH_MS) as usize + 1;

/// Shape of the curve shown before any trial is recorded.
pub const PLACEHOLDER_MEAN_MS: f64 = 273.0;
pub const PLACEHOLDER_STD_DEV_MS: f64 = 50.0;
pub const PLACEHOLDER_PEAK: f64 = 100.0;

/// Number of recent attempts listed by default.
pub const DEFAULT_RECENT: usize = 5;

/// Arithmetic mean rounded to the nearest millisecond, `0` when empty.
pub fn average(latencies: &[u64]) -> u64 {
    if latencies.is_empty() {
        return 0;
    }
    let sum: u64 = latencies.iter().sum();
    (sum as f64 / latencies.len() as f64).round() as u64
}

/// Fastest recorded latency, `0` when empty.
pub fn best(latencies: &[u64]) -> u64 {
    latencies.iter().copied().min().unwrap_or(0)
}

/// The last `n` latencies, most recent first, paired with 1-based attempt numbers.
pub fn recent(latencies: &[u64], n: usize) -> Vec<RecentAttempt> {
    let total = latencies.len();
    latencies
        .iter()
        .rev()
        .take(n)
        .enumerate()
        .map(|(position, &ms)| RecentAttempt::new(total - position, ms))
        .collect()
}

/// Bins the latencies, or returns the placeholder curve when there are none.
///
/// A latency lands in bin `floor(t / 20) * 20` when that start is at most
/// 500; slower responses are left out of the chart but not out of
/// [`average`] or [`best`].
pub fn histogram(latencies: &[u64]) -> Histogram {
    if latencies.is_empty() {
        return placeholder_curve();
    }

    let mut counts = [0u32; BIN_COUNT];
    for &ms in latencies {
        let start = ms / BIN_WIDTH_MS as u64 * BIN_WIDTH_MS as u64;
        if start <= HISTOGRAM_MAX_MS as u64 {
            counts[(start / BIN_WIDTH_MS as u64) as usize] += 1;
        }
    }

    Histogram {
        bins: bin_starts()
            .zip(counts)
            .map(|(start_ms, count)| HistogramBin {
                start_ms,
                value: count as f64,
            })
            .collect(),
        source: HistogramSource::Recorded,
    }
}

/// Gaussian evaluated at each bin midpoint.
pub fn placeholder_curve() -> Histogram {
    let two_var = 2.0 * PLACEHOLDER_STD_DEV_MS * PLACEHOLDER_STD_DEV_MS;
    Histogram {
        bins: bin_starts()
            .map(|start_ms| {
                let x = start_ms as f64 + BIN_WIDTH_MS as f64 / 2.0;
                let d = x - PLACEHOLDER_MEAN_MS;
                HistogramBin {
                    start_ms,
                    value: PLACEHOLDER_PEAK * (-(d * d) / two_var).exp(),
                }
            })
            .collect(),
        source: HistogramSource::Placeholder,
    }
}

fn bin_starts() -> impl Iterator<Item = u32> {
    (0..=HISTOGRAM_MAX_MS).step_by(BIN_WIDTH_MS as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentAttempt {
    pub attempt: usize,
    pub reaction_time_ms: u64,
}

impl RecentAttempt {
    pub fn new(attempt: usize, reaction_time_ms: u64) -> Self {
        Self {
            attempt,
            reaction_time_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistogramSource {
    /// Synthetic bell curve, no data behind it.
    Placeholder,
    /// Raw per-bin counts.
    Recorded,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start_ms: u32,
    pub value: f64,
}

/// Ordered `(start, value)` pairs, ascending by `start_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub source: HistogramSource,
}

impl Histogram {
    /// Largest bin value, floored at 1 so callers can divide by it.
    pub fn max_value(&self) -> f64 {
        self.bins.iter().map(|b| b.value).fold(1.0, f64::max)
    }

    pub fn total(&self) -> f64 {
        self.bins.iter().map(|b| b.value).sum()
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == HistogramSource::Placeholder
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Read model for the statistics card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub attempts: usize,
    pub average_ms: u64,
    pub best_ms: u64,
    pub recent: Vec<RecentAttempt>,
}

impl SessionSummary {
    pub fn from_latencies(latencies: &[u64], recent_count: usize) -> Self {
        Self {
            attempts: latencies.len(),
            average_ms: average(latencies),
            best_ms: best(latencies),
            recent: recent(latencies, recent_count),
        }
    }
}

impl Default for SessionSummary {
    fn default() -> Self {
        Self::from_latencies(&[], DEFAULT_RECENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rounds_to_nearest() {
        assert_eq!(average(&[]), 0);
        assert_eq!(average(&[300, 200, 250]), 250);
        assert_eq!(average(&[100, 101]), 101);
        assert_eq!(average(&[100, 100, 101]), 100);
        assert_eq!(average(&[0]), 0);
    }

    #[test]
    fn average_matches_definition_on_varied_histories() {
        let histories: [&[u64]; 4] = [&[1], &[199, 201, 350, 412], &[1000, 3], &[7, 7, 8]];
        for h in histories {
            let expected = (h.iter().sum::<u64>() as f64 / h.len() as f64).round() as u64;
            assert_eq!(average(h), expected, "{h:?}");
        }
    }

    #[test]
    fn best_is_minimum() {
        assert_eq!(best(&[]), 0);
        assert_eq!(best(&[300, 200, 250]), 200);
        assert_eq!(best(&[999, 0, 5]), 0);
    }

    #[test]
    fn recent_is_reverse_chronological() {
        let latencies = [300, 200, 250];
        assert_eq!(
            recent(&latencies, 2),
            vec![RecentAttempt::new(3, 250), RecentAttempt::new(2, 200)]
        );
        assert_eq!(recent(&latencies, 10).len(), 3);
        assert_eq!(recent(&latencies, 10)[2], RecentAttempt::new(1, 300));
        assert!(recent(&latencies, 0).is_empty());
    }

    #[test]
    fn layout_has_26_ascending_bins() {
        for h in [histogram(&[]), histogram(&[120, 260])] {
            assert_eq!(h.len(), BIN_COUNT);
            assert_eq!(h.bins[0].start_ms, 0);
            assert_eq!(h.bins[BIN_COUNT - 1].start_ms, 500);
            assert!(h.bins.windows(2).all(|w| w[1].start_ms - w[0].start_ms == 20));
        }
    }

    #[test]
    fn placeholder_is_deterministic_gaussian() {
        let a = histogram(&[]);
        let b = placeholder_curve();
        assert_eq!(a, b);
        assert!(a.is_placeholder());

        // Bin 260 has midpoint 270, three ms from the mean.
        let peak = &a.bins[13];
        assert_eq!(peak.start_ms, 260);
        let expected = 100.0 * (-(9.0_f64) / 5000.0).exp();
        assert!((peak.value - expected).abs() < 1e-9);

        let first = a.bins[0].value;
        let expected_first = 100.0 * (-(263.0_f64 * 263.0) / 5000.0).exp();
        assert!((first - expected_first).abs() < 1e-12);

        let tallest = a
            .bins
            .iter()
            .max_by(|x, y| x.value.total_cmp(&y.value))
            .map(|b| b.start_ms);
        assert_eq!(tallest, Some(260));
    }

    #[test]
    fn recorded_counts_per_bin() {
        let h = histogram(&[0, 19, 20, 255, 259, 499]);
        assert_eq!(h.source, HistogramSource::Recorded);
        assert_eq!(h.bins[0].value, 2.0);
        assert_eq!(h.bins[1].value, 1.0);
        assert_eq!(h.bins[12].value, 2.0);
        assert_eq!(h.bins[24].value, 1.0);
        assert_eq!(h.total(), 6.0);
        assert_eq!(h.max_value(), 2.0);
    }

    #[test]
    fn slow_latencies_drop_out_of_histogram_only() {
        let latencies = [250, 519, 520, 1200];
        let h = histogram(&latencies);
        // 519 still starts the 500 bin; 520 and 1200 are beyond it.
        assert_eq!(h.bins[BIN_COUNT - 1].value, 1.0);
        assert_eq!(h.total(), 2.0);
        assert!(h.total() <= latencies.len() as f64);
        assert_eq!(average(&latencies), 622);
        assert_eq!(best(&latencies), 250);
    }

    #[test]
    fn total_equals_count_when_everything_fits() {
        let latencies = [150, 180, 210, 240, 300, 500];
        assert_eq!(histogram(&latencies).total(), latencies.len() as f64);
    }

    #[test]
    fn max_value_is_floored_at_one() {
        let h = histogram(&[10_000]);
        assert_eq!(h.total(), 0.0);
        assert_eq!(h.max_value(), 1.0);
    }

    #[test]
    fn summary_collects_everything() {
        let summary = SessionSummary::from_latencies(&[300, 200, 250], 5);
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.average_ms, 250);
        assert_eq!(summary.best_ms, 200);
        assert_eq!(summary.recent.first(), Some(&RecentAttempt::new(3, 250)));
        assert_eq!(SessionSummary::default().attempts, 0);
    }
}
