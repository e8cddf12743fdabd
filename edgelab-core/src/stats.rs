//! System statistics over R-multiples — pure functions, pool in, scalar out.

use serde::{Deserialize, Serialize};

/// Sample size used for SQN is capped here when the pool comes from raw data.
pub const MAX_SQN_SAMPLE: usize = 100;

/// Profit factor reported when there are winners but no losers.
pub const PROFIT_FACTOR_NO_LOSSES: f64 = 999.0;

/// Aggregate statistics describing a trading system's edge.
///
/// `win_rate` is a fraction on 0–1; every percentage elsewhere in the
/// workspace is on 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub standard_deviation: f64,
    pub sqn: f64,
    pub n: usize,
    pub r_unit_size: Option<f64>,
    pub worst_r: f64,
}

impl SystemMetrics {
    /// Compute metrics for `pool`. `n` is the sample size fed into SQN and is
    /// used as given; callers working from raw data pass a value already run
    /// through [`clamp_sample_size`].
    ///
    /// An empty pool yields all-zero metrics.
    pub fn compute(pool: &[f64], n: usize, r_unit_size: Option<f64>) -> Self {
        if pool.is_empty() {
            return Self {
                r_unit_size,
                ..Self::default()
            };
        }

        let expectancy = mean(pool);
        let standard_deviation = population_std_dev(pool);
        Self {
            win_rate: win_rate(pool),
            profit_factor: profit_factor(pool),
            expectancy,
            standard_deviation,
            sqn: sqn(expectancy, standard_deviation, n),
            n,
            r_unit_size,
            worst_r: pool.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

/// Entry point used by the presentation layer.
pub fn compute_system_metrics(pool: &[f64], n: usize, r_unit_size: Option<f64>) -> SystemMetrics {
    SystemMetrics::compute(pool, n, r_unit_size)
}

pub fn clamp_sample_size(n: usize) -> usize {
    n.min(MAX_SQN_SAMPLE)
}

/// Fraction of strictly positive outcomes.
pub fn win_rate(pool: &[f64]) -> f64 {
    if pool.is_empty() {
        return 0.0;
    }
    let winners = pool.iter().filter(|&&r| r > 0.0).count();
    winners as f64 / pool.len() as f64
}

/// Gross profit / |gross loss|.
///
/// No losses: [`PROFIT_FACTOR_NO_LOSSES`] if anything was won, 0.0 otherwise.
pub fn profit_factor(pool: &[f64]) -> f64 {
    let gross_profit: f64 = pool.iter().filter(|&&r| r > 0.0).sum();
    let gross_loss: f64 = pool.iter().filter(|&&r| r < 0.0).map(|r| r.abs()).sum();

    if gross_loss == 0.0 {
        return if gross_profit > 0.0 {
            PROFIT_FACTOR_NO_LOSSES
        } else {
            0.0
        };
    }
    gross_profit / gross_loss
}

/// SQN = expectancy / std · √n. Zero when the deviation is zero.
pub fn sqn(expectancy: f64, standard_deviation: f64, n: usize) -> f64 {
    if standard_deviation == 0.0 {
        return 0.0;
    }
    (expectancy / standard_deviation) * (n as f64).sqrt()
}

// ─── Shared numeric helpers ─────────────────────────────────────────

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor = len).
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Median of an ascending slice; mean of the middle pair for even lengths.
pub fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Index `floor(len · q)` clamped into the slice.
pub fn floor_index(len: usize, q: f64) -> usize {
    if len == 0 {
        return 0;
    }
    ((len as f64 * q).floor() as usize).min(len - 1)
}

pub fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_pool() -> Vec<f64> {
        vec![-1.0, -1.0, -1.0, -1.0, -1.0, 2.0, 2.0, 2.0]
    }

    #[test]
    fn reference_pool_metrics() {
        let pool = reference_pool();
        let m = SystemMetrics::compute(&pool, pool.len(), None);

        assert!((m.win_rate - 3.0 / 8.0).abs() < 1e-12);
        assert!((m.expectancy - 0.125).abs() < 1e-12);
        assert!((m.profit_factor - 1.2).abs() < 1e-12);

        let var = pool.iter().map(|r| (r - 0.125_f64).powi(2)).sum::<f64>() / 8.0;
        let expected_sqn = (0.125 / var.sqrt()) * 8.0_f64.sqrt();
        assert!((m.sqn - expected_sqn).abs() < 1e-9);
        assert_eq!(m.worst_r, -1.0);
        assert_eq!(m.n, 8);
    }

    #[test]
    fn std_dev_uses_population_divisor() {
        // Population std of [1, 3] is 1.0; the sample std would be √2.
        assert!((population_std_dev(&[1.0, 3.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sqn_uses_supplied_sample_size() {
        let pool = reference_pool();
        let m8 = SystemMetrics::compute(&pool, 8, None);
        let m100 = SystemMetrics::compute(&pool, 100, None);
        let ratio = m100.sqn / m8.sqn;
        assert!((ratio - (100.0_f64 / 8.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn empty_pool_is_all_zero() {
        let m = SystemMetrics::compute(&[], 0, None);
        assert_eq!(m, SystemMetrics::default());
    }

    #[test]
    fn profit_factor_sentinels() {
        assert_eq!(profit_factor(&[1.0, 2.0]), PROFIT_FACTOR_NO_LOSSES);
        assert_eq!(profit_factor(&[0.0, 0.0]), 0.0);
        assert_eq!(profit_factor(&[-1.0, -2.0]), 0.0);
    }

    #[test]
    fn zero_deviation_zero_sqn() {
        let m = SystemMetrics::compute(&[0.5; 10], 10, None);
        assert_eq!(m.standard_deviation, 0.0);
        assert_eq!(m.sqn, 0.0);
        assert_eq!(m.win_rate, 1.0);
    }

    #[test]
    fn zero_outcomes_are_not_wins() {
        assert!((win_rate(&[0.0, 1.0, -1.0, 0.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn r_unit_size_carried_through() {
        let m = SystemMetrics::compute(&[1.0, -1.0], 2, Some(250.0));
        assert_eq!(m.r_unit_size, Some(250.0));
    }

    #[test]
    fn sample_size_clamp() {
        assert_eq!(clamp_sample_size(30), 30);
        assert_eq!(clamp_sample_size(100), 100);
        assert_eq!(clamp_sample_size(5000), 100);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0]), 2.0);
        assert_eq!(median_sorted(&[1.0, 2.0, 3.0, 4.0]), 2.5);
        assert_eq!(median_sorted(&[]), 0.0);
    }

    #[test]
    fn floor_index_clamps() {
        assert_eq!(floor_index(20, 0.95), 19);
        assert_eq!(floor_index(20, 0.05), 1);
        assert_eq!(floor_index(1, 0.95), 0);
        assert_eq!(floor_index(10, 1.0), 9);
    }
}
