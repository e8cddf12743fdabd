//! Fixed-bin-count frequency tables with a companion stat summary.

use serde::{Deserialize, Serialize};

use crate::stats::{floor_index, mean, median_sorted, sort_ascending};

/// Number of bins used whenever the values are not all equal.
pub const BIN_COUNT: usize = 30;

/// Range below which every value lands in a single bin.
pub const DEGENERATE_RANGE: f64 = 1e-9;

/// One histogram bin covering `[lower, upper)`; the last bin also holds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Summary statistics that accompany each histogram.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistributionStats {
    pub avg: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub p5: f64,
    pub p95: f64,
}

/// Histogram plus stat table for one distribution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
    pub stats: DistributionStats,
}

impl Histogram {
    /// Bin `values` into [`BIN_COUNT`] equal-width bins over `[min, max]`.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sort_ascending(&mut sorted);
        let min = sorted[0];
        let max = sorted[sorted.len() - 1];

        let stats = DistributionStats {
            avg: mean(values),
            median: median_sorted(&sorted),
            min,
            max,
            p5: sorted[floor_index(sorted.len(), 0.05)],
            p95: sorted[floor_index(sorted.len(), 0.95)],
        };

        let range = max - min;
        if range < DEGENERATE_RANGE {
            return Self {
                bins: vec![HistogramBin {
                    lower: min,
                    upper: max,
                    count: values.len(),
                }],
                stats,
            };
        }

        let width = range / BIN_COUNT as f64;
        let mut bins: Vec<HistogramBin> = (0..BIN_COUNT)
            .map(|i| HistogramBin {
                lower: min + i as f64 * width,
                upper: min + (i + 1) as f64 * width,
                count: 0,
            })
            .collect();

        for &v in values {
            let idx = (((v - min) / width).floor() as usize).min(BIN_COUNT - 1);
            bins[idx].count += 1;
        }

        Self { bins, stats }
    }

    pub fn total_count(&self) -> usize {
        self.bins.iter().map(|b| b.count).sum()
    }
}
