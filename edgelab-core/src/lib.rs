//! EdgeLab Core — domain types and pure statistics for R-multiple analysis.
//!
//! This crate contains everything the engines read but never mutate:
//! - R-multiple pools (from values, manual frequency rows, or raw P&L text)
//! - System statistics (win rate, profit factor, expectancy, SQN)
//! - Fixed-bin histograms with stat tables
//! - Correlation levels and the symmetric asset matrix
//! - Injectable pool samplers and the deterministic RNG hierarchy

pub mod domain;
pub mod histogram;
pub mod ingest;
pub mod rng;
pub mod stats;

pub use domain::{CorrelationLevel, CorrelationMatrix, FrequencyRow, MatrixError, PoolError, RPool};
pub use histogram::{DistributionStats, Histogram, HistogramBin, BIN_COUNT};
pub use ingest::{ingest_raw_pnl, parse_tokens, IngestError, RawPnl, MIN_RAW_ENTRIES};
pub use rng::{RngHierarchy, RngSampler, Sampler, ScriptedSampler};
pub use stats::{clamp_sample_size, compute_system_metrics, SystemMetrics, MAX_SQN_SAMPLE};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything handed to worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<RPool>();
        require_sync::<RPool>();
        require_send::<SystemMetrics>();
        require_sync::<SystemMetrics>();
        require_send::<Histogram>();
        require_sync::<Histogram>();
        require_send::<CorrelationMatrix>();
        require_sync::<CorrelationMatrix>();
        require_send::<RngHierarchy>();
        require_sync::<RngHierarchy>();
        require_send::<RawPnl>();
        require_sync::<RawPnl>();
    }

    #[test]
    fn ingested_pool_feeds_statistics() {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(if i % 4 == 0 { "-100\n" } else { "150\n" });
        }
        let raw = ingest_raw_pnl(&text).unwrap();
        let pool = RPool::from_values(raw.pool.clone()).unwrap();
        let metrics = compute_system_metrics(pool.values(), raw.sample_size, Some(raw.r_unit));

        assert_eq!(metrics.n, 40);
        assert_eq!(metrics.r_unit_size, Some(100.0));
        assert_eq!(metrics.worst_r, -1.0);
        assert!((metrics.win_rate - 0.75).abs() < 1e-12);
        // 30 × 1.5 won, 10 × 1.0 lost
        assert!((metrics.profit_factor - 4.5).abs() < 1e-12);
    }
}
