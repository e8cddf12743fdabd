//! Monte Carlo path engine — resample the R-multiple pool thousands of times.
//!
//! Each trial is an independent [`simulate_path`] run. While trials stream in,
//! the engine keeps six extremal records (best/worst final equity,
//! deepest/shallowest drawdown, longest/shortest drawdown duration) together
//! with the full path that produced each one, plus an element-wise running sum
//! used for the average path.
//!
//! Key design choices:
//! - Extremal comparisons are strict, so the first trial to reach a value keeps it.
//! - Trials run on rayon in fixed-size chunks. Every trial owns a sampler
//!   seeded from `(seed, "monte-carlo", trial)`, and chunks merge in trial
//!   order, so the result does not depend on the thread count.
//! - The retained curves are copies of simulated paths, never interpolations.

use std::fmt;
use std::ops::Range;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use edgelab_core::domain::RPool;
use edgelab_core::histogram::Histogram;
use edgelab_core::rng::{RngHierarchy, Sampler};
use edgelab_core::stats::{floor_index, mean, SystemMetrics};

use crate::config::ConfigError;
use crate::path::{simulate_path, PathSummary, SimulatedPath};

/// Stream name used to derive per-trial samplers.
pub const MONTE_CARLO_STREAM: &str = "monte-carlo";

/// Trials per rayon work unit.
const CHUNK_TRIALS: usize = 256;

// ─── Configuration ───────────────────────────────────────────────────

/// Size of a Monte Carlo run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub total_simulations: usize,
    pub trades_per_simulation: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            total_simulations: 10_000,
            trades_per_simulation: 100,
        }
    }
}

impl SimulationConfig {
    pub fn new(total_simulations: usize, trades_per_simulation: usize) -> Self {
        Self {
            total_simulations,
            trades_per_simulation,
        }
    }

    /// Both sizes must be at least 1.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_simulations == 0 {
            return Err(ConfigError::Invalid(
                "total_simulations must be >= 1".into(),
            ));
        }
        if self.trades_per_simulation == 0 {
            return Err(ConfigError::Invalid(
                "trades_per_simulation must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Which of the seven retained curves this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveKind {
    BestFinal,
    WorstFinal,
    DeepestDrawdown,
    ShallowestDrawdown,
    LongestDuration,
    ShortestDuration,
    Average,
}

impl CurveKind {
    /// The six curves picked by an extremal comparison, in report order.
    pub const EXTREMAL: [CurveKind; 6] = [
        CurveKind::BestFinal,
        CurveKind::WorstFinal,
        CurveKind::DeepestDrawdown,
        CurveKind::ShallowestDrawdown,
        CurveKind::LongestDuration,
        CurveKind::ShortestDuration,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CurveKind::BestFinal => "Best Final Result",
            CurveKind::WorstFinal => "Worst Final Result",
            CurveKind::DeepestDrawdown => "Deepest Drawdown",
            CurveKind::ShallowestDrawdown => "Shallowest Drawdown",
            CurveKind::LongestDuration => "Longest Drawdown Duration",
            CurveKind::ShortestDuration => "Shortest Drawdown Duration",
            CurveKind::Average => "Average Path",
        }
    }

    /// The summary scalar an extremal curve is selected on.
    fn metric(self, summary: &PathSummary) -> f64 {
        match self {
            CurveKind::BestFinal | CurveKind::WorstFinal | CurveKind::Average => {
                summary.final_result
            }
            CurveKind::DeepestDrawdown | CurveKind::ShallowestDrawdown => summary.max_drawdown,
            CurveKind::LongestDuration | CurveKind::ShortestDuration => {
                summary.drawdown_duration as f64
            }
        }
    }

    fn prefers_higher(self) -> bool {
        matches!(
            self,
            CurveKind::BestFinal | CurveKind::DeepestDrawdown | CurveKind::LongestDuration
        )
    }
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named equity path kept for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityCurve {
    pub kind: CurveKind,
    /// The scalar that selected this curve (final equity for the average).
    pub value: f64,
    pub path: Vec<f64>,
}

/// Risk figures derived from the whole ensemble.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Percent (0–100) of trials that ended above zero.
    pub probability_of_profit: f64,
    /// Drawdown duration at the 95th percentile, in trades.
    pub p95_drawdown_duration: usize,
    /// mean(final result) / mean(max drawdown); 0 when no trial drew down.
    pub reward_risk_ratio: f64,
}

/// The five output distributions, each binned with its stat table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Distributions {
    pub final_result: Histogram,
    pub max_drawdown: Histogram,
    pub max_profit: Histogram,
    pub max_consecutive_losses: Histogram,
    pub max_consecutive_wins: Histogram,
}

/// Everything a Monte Carlo run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResults {
    pub system_metrics: SystemMetrics,
    pub risk_metrics: RiskMetrics,
    pub config: SimulationConfig,
    pub distributions: Distributions,
    pub pool: Vec<f64>,
    /// Six extremal curves in [`CurveKind::EXTREMAL`] order, then the average.
    pub equity_curves: Vec<EquityCurve>,
}

impl SimulationResults {
    pub fn curve(&self, kind: CurveKind) -> Option<&EquityCurve> {
        self.equity_curves.iter().find(|c| c.kind == kind)
    }

    pub fn average_path(&self) -> &[f64] {
        self.curve(CurveKind::Average)
            .map(|c| c.path.as_slice())
            .unwrap_or(&[])
    }
}

// ─── Extremal tracking ───────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ExtremalRecord {
    kind: CurveKind,
    best: Option<(f64, Vec<f64>)>,
}

impl ExtremalRecord {
    fn new(kind: CurveKind) -> Self {
        Self { kind, best: None }
    }

    fn beats(&self, value: f64) -> bool {
        match &self.best {
            None => true,
            Some((current, _)) if self.kind.prefers_higher() => value > *current,
            Some((current, _)) => value < *current,
        }
    }

    fn offer(&mut self, sim: &SimulatedPath) {
        let value = self.kind.metric(&sim.summary);
        if self.beats(value) {
            self.best = Some((value, sim.path.clone()));
        }
    }

    /// Fold in a record built from later trials.
    fn absorb(&mut self, later: ExtremalRecord) {
        if let Some((value, path)) = later.best {
            if self.beats(value) {
                self.best = Some((value, path));
            }
        }
    }

    fn into_curve(self, trades: usize) -> EquityCurve {
        let (value, path) = self
            .best
            .unwrap_or_else(|| (0.0, vec![0.0; trades + 1]));
        EquityCurve {
            kind: self.kind,
            value,
            path,
        }
    }
}

/// Running state for a contiguous block of trials.
#[derive(Debug, Clone)]
struct TrialAccumulator {
    trades: usize,
    records: Vec<ExtremalRecord>,
    path_sum: Vec<f64>,
    summaries: Vec<PathSummary>,
}

impl TrialAccumulator {
    fn new(trades: usize) -> Self {
        Self {
            trades,
            records: CurveKind::EXTREMAL.iter().map(|&k| ExtremalRecord::new(k)).collect(),
            path_sum: vec![0.0; trades + 1],
            summaries: Vec::new(),
        }
    }

    fn record(&mut self, sim: SimulatedPath) {
        for record in &mut self.records {
            record.offer(&sim);
        }
        for (sum, v) in self.path_sum.iter_mut().zip(&sim.path) {
            *sum += v;
        }
        self.summaries.push(sim.summary);
    }

    /// Append the trials of `later`, which must come after `self` in trial order.
    fn merge(&mut self, later: TrialAccumulator) {
        for (record, other) in self.records.iter_mut().zip(later.records) {
            record.absorb(other);
        }
        for (sum, v) in self.path_sum.iter_mut().zip(&later.path_sum) {
            *sum += v;
        }
        self.summaries.extend(later.summaries);
    }

    fn finish(
        self,
        pool: &[f64],
        metrics: &SystemMetrics,
        config: &SimulationConfig,
    ) -> SimulationResults {
        let trials = self.summaries.len().max(1) as f64;
        let average: Vec<f64> = self.path_sum.iter().map(|s| s / trials).collect();

        let finals: Vec<f64> = self.summaries.iter().map(|s| s.final_result).collect();
        let drawdowns: Vec<f64> = self.summaries.iter().map(|s| s.max_drawdown).collect();
        let profits: Vec<f64> = self.summaries.iter().map(|s| s.max_profit).collect();
        let losses: Vec<f64> = self
            .summaries
            .iter()
            .map(|s| s.max_consecutive_losses as f64)
            .collect();
        let wins: Vec<f64> = self
            .summaries
            .iter()
            .map(|s| s.max_consecutive_wins as f64)
            .collect();

        let risk_metrics = risk_metrics(&self.summaries, &finals, &drawdowns);

        let mut equity_curves: Vec<EquityCurve> = self
            .records
            .into_iter()
            .map(|r| r.into_curve(self.trades))
            .collect();
        equity_curves.push(EquityCurve {
            kind: CurveKind::Average,
            value: average.last().copied().unwrap_or(0.0),
            path: average,
        });

        SimulationResults {
            system_metrics: *metrics,
            risk_metrics,
            config: *config,
            distributions: Distributions {
                final_result: Histogram::from_values(&finals),
                max_drawdown: Histogram::from_values(&drawdowns),
                max_profit: Histogram::from_values(&profits),
                max_consecutive_losses: Histogram::from_values(&losses),
                max_consecutive_wins: Histogram::from_values(&wins),
            },
            pool: pool.to_vec(),
            equity_curves,
        }
    }
}

fn risk_metrics(summaries: &[PathSummary], finals: &[f64], drawdowns: &[f64]) -> RiskMetrics {
    if summaries.is_empty() {
        return RiskMetrics::default();
    }

    let profitable = finals.iter().filter(|&&f| f > 0.0).count();
    let probability_of_profit = profitable as f64 / finals.len() as f64 * 100.0;

    let mut durations: Vec<usize> = summaries.iter().map(|s| s.drawdown_duration).collect();
    durations.sort_unstable();
    let p95_drawdown_duration = durations[floor_index(durations.len(), 0.95)];

    let mean_drawdown = mean(drawdowns);
    let reward_risk_ratio = if mean_drawdown == 0.0 {
        0.0
    } else {
        mean(finals) / mean_drawdown
    };

    RiskMetrics {
        probability_of_profit,
        p95_drawdown_duration,
        reward_risk_ratio,
    }
}

fn chunk_ranges(total: usize) -> Vec<Range<usize>> {
    (0..total)
        .step_by(CHUNK_TRIALS)
        .map(|start| start..(start + CHUNK_TRIALS).min(total))
        .collect()
}

// ─── Entry points ────────────────────────────────────────────────────

/// Run `config.total_simulations` independent trials in parallel.
///
/// A `total_simulations` of zero still runs one trial.
pub fn run_monte_carlo(
    pool: &RPool,
    metrics: &SystemMetrics,
    config: &SimulationConfig,
    seed: u64,
) -> SimulationResults {
    let start = Instant::now();
    let sims = config.total_simulations.max(1);
    let trades = config.trades_per_simulation;
    info!(sims, trades, pool = pool.len(), seed, "monte carlo run started");

    let hierarchy = RngHierarchy::new(seed);
    let partials: Vec<TrialAccumulator> = chunk_ranges(sims)
        .into_par_iter()
        .map(|range| {
            let mut acc = TrialAccumulator::new(trades);
            for trial in range {
                let mut sampler = hierarchy.sampler_for(MONTE_CARLO_STREAM, 0, trial as u64);
                acc.record(simulate_path(pool, trades, &mut sampler));
            }
            acc
        })
        .collect();
    debug!(chunks = partials.len(), "merging trial chunks");

    let merged = partials
        .into_iter()
        .reduce(|mut earlier, later| {
            earlier.merge(later);
            earlier
        })
        .unwrap_or_else(|| TrialAccumulator::new(trades));

    let results = merged.finish(pool.values(), metrics, config);
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        probability_of_profit = results.risk_metrics.probability_of_profit,
        "monte carlo run finished"
    );
    results
}

/// Sequential run drawing every trade from one caller-supplied sampler.
pub fn run_monte_carlo_with_sampler<S: Sampler + ?Sized>(
    pool: &RPool,
    metrics: &SystemMetrics,
    config: &SimulationConfig,
    sampler: &mut S,
) -> SimulationResults {
    let sims = config.total_simulations.max(1);
    let trades = config.trades_per_simulation;
    let mut acc = TrialAccumulator::new(trades);
    for _ in 0..sims {
        acc.record(simulate_path(pool, trades, sampler));
    }
    acc.finish(pool.values(), metrics, config)
}
