//! Single simulated trade sequence.
//!
//! Equity is cumulative R, starting at 0. The path records equity after every
//! trade, so a run of `T` trades yields `T + 1` points with `path[0] == 0`.

use serde::{Deserialize, Serialize};

use edgelab_core::domain::RPool;
use edgelab_core::rng::Sampler;

/// Scalar summary of one simulated path.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PathSummary {
    /// Equity after the last trade.
    pub final_result: f64,
    /// Largest peak-to-trough decline, in R (non-negative).
    pub max_drawdown: f64,
    /// Highest equity ever reached, not net of later declines.
    pub max_profit: f64,
    pub max_consecutive_losses: usize,
    pub max_consecutive_wins: usize,
    /// Longest run of trades without a new equity peak.
    pub drawdown_duration: usize,
}

/// Summary plus the full equity path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPath {
    pub summary: PathSummary,
    pub path: Vec<f64>,
}

/// Run one path of `trades` draws from `pool`.
///
/// A zero outcome is neither a win nor a loss and resets both streak counters.
pub fn simulate_path<S: Sampler + ?Sized>(
    pool: &RPool,
    trades: usize,
    sampler: &mut S,
) -> SimulatedPath {
    let outcomes = pool.values();
    let mut path = Vec::with_capacity(trades + 1);
    path.push(0.0);

    let mut equity = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_drawdown = 0.0_f64;
    let mut since_peak = 0usize;
    let mut drawdown_duration = 0usize;
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut max_wins = 0usize;
    let mut max_losses = 0usize;

    for _ in 0..trades {
        let r = outcomes[sampler.next_index(outcomes.len())];
        equity += r;
        path.push(equity);

        if equity > peak {
            peak = equity;
            since_peak = 0;
        } else {
            since_peak += 1;
            drawdown_duration = drawdown_duration.max(since_peak);
        }
        max_drawdown = max_drawdown.max(peak - equity);

        if r > 0.0 {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else if r < 0.0 {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        } else {
            wins = 0;
            losses = 0;
        }
    }

    SimulatedPath {
        summary: PathSummary {
            final_result: equity,
            max_drawdown,
            max_profit: peak,
            max_consecutive_losses: max_losses,
            max_consecutive_wins: max_wins,
            drawdown_duration,
        },
        path,
    }
}
