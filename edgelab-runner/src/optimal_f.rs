//! Optimal-f sweep — search the per-trade risk fraction under six objectives.
//!
//! For every fraction on the [`RiskGrid`] (0.1% to 30.0% by default) the search
//! runs a batch of bounded-equity trials:
//! - equity starts at 1.0 and is floored at 0 and capped at [`EQUITY_CAP`];
//! - a trial is ruined, and stops trading, the first time equity falls to
//!   `1 + failure/100` or below;
//! - success is judged on final equity of non-ruined trials only.
//!
//! Each swept fraction is folded into six independent [`ObjectiveTracker`]s.
//! The sweep is long and synchronous, so it reports progress every
//! [`CHECKPOINT_INTERVAL`] fractions and yields the thread. [`spawn_optimal_f`]
//! turns those checkpoints into a channel-backed event stream; dropping the
//! stream abandons the run at the next checkpoint.

use std::convert::Infallible;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use edgelab_core::domain::RPool;
use edgelab_core::rng::{RngHierarchy, Sampler};
use edgelab_core::stats::{mean, median_sorted, sort_ascending};

/// Stream name used to derive per-trial samplers.
pub const OPTIMAL_F_STREAM: &str = "optimal-f";

/// Upper bound on trial equity; keeps compounding runs finite.
pub const EQUITY_CAP: f64 = 1e12;

/// Swept fractions between two progress checkpoints.
pub const CHECKPOINT_INTERVAL: usize = 5;

pub const TRADES_PER_SIM_RANGE: (usize, usize) = (100, 1000);
pub const TOTAL_SIMS_RANGE: (usize, usize) = (10_000, 100_000);
pub const FAILURE_THRESHOLD_RANGE: (f64, f64) = (-100.0, 0.0);

// ─── Configuration ───────────────────────────────────────────────────

/// How position size follows equity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskMode {
    /// Risk `f` of current equity on every trade.
    #[default]
    FixedFractional,
    /// Risk `f` of the starting equity on every trade.
    FixedInitial,
}

/// Sweep configuration. Percentages are on a 0–100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimalFConfig {
    /// Final gain (%) a surviving trial needs to count as a success.
    pub success_threshold_pct: f64,
    /// Drawdown from 1.0 (%, negative) that ruins a trial.
    pub failure_threshold_pct: f64,
    pub trades_per_sim: usize,
    pub total_sims: usize,
    pub risk_mode: RiskMode,
}

impl Default for OptimalFConfig {
    fn default() -> Self {
        Self {
            success_threshold_pct: 100.0,
            failure_threshold_pct: -50.0,
            trades_per_sim: 100,
            total_sims: 10_000,
            risk_mode: RiskMode::FixedFractional,
        }
    }
}

/// A config field that was moved into range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClampedField {
    pub field: String,
    pub requested: f64,
    pub applied: f64,
}

impl fmt::Display for ClampedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} adjusted from {} to {}",
            self.field, self.requested, self.applied
        )
    }
}

impl OptimalFConfig {
    /// Clamp every field into its supported range.
    ///
    /// Out-of-range values are corrected, never rejected; the returned list
    /// names each field that changed so the caller can tell the user.
    pub fn clamped(&self) -> (OptimalFConfig, Vec<ClampedField>) {
        let mut changes = Vec::new();

        let success_threshold_pct = clamp_f64(
            "success_threshold_pct",
            self.success_threshold_pct,
            0.0,
            f64::INFINITY,
            &mut changes,
        );
        let failure_threshold_pct = clamp_f64(
            "failure_threshold_pct",
            self.failure_threshold_pct,
            FAILURE_THRESHOLD_RANGE.0,
            FAILURE_THRESHOLD_RANGE.1,
            &mut changes,
        );
        let trades_per_sim = clamp_usize(
            "trades_per_sim",
            self.trades_per_sim,
            TRADES_PER_SIM_RANGE,
            &mut changes,
        );
        let total_sims = clamp_usize("total_sims", self.total_sims, TOTAL_SIMS_RANGE, &mut changes);

        (
            OptimalFConfig {
                success_threshold_pct,
                failure_threshold_pct,
                trades_per_sim,
                total_sims,
                risk_mode: self.risk_mode,
            },
            changes,
        )
    }

    fn ruin_level(&self) -> f64 {
        1.0 + self.failure_threshold_pct / 100.0
    }

    fn success_level(&self) -> f64 {
        1.0 + self.success_threshold_pct / 100.0
    }
}

fn clamp_f64(field: &str, value: f64, lo: f64, hi: f64, changes: &mut Vec<ClampedField>) -> f64 {
    let applied = if value.is_nan() { lo } else { value.clamp(lo, hi) };
    if applied != value || value.is_nan() {
        changes.push(ClampedField {
            field: field.to_string(),
            requested: value,
            applied,
        });
    }
    applied
}

fn clamp_usize(
    field: &str,
    value: usize,
    (lo, hi): (usize, usize),
    changes: &mut Vec<ClampedField>,
) -> usize {
    let applied = value.clamp(lo, hi);
    if applied != value {
        changes.push(ClampedField {
            field: field.to_string(),
            requested: value as f64,
            applied: applied as f64,
        });
    }
    applied
}

/// The swept risk fractions, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskGrid {
    pub start_pct: f64,
    pub step_pct: f64,
    pub steps: usize,
}

impl Default for RiskGrid {
    /// 0.1%, 0.2%, ..., 30.0%.
    fn default() -> Self {
        Self {
            start_pct: 0.1,
            step_pct: 0.1,
            steps: 300,
        }
    }
}

impl RiskGrid {
    /// Risk of step `i` in percent, rounded to kill float drift (0.30000000000000004).
    pub fn risk_pct(&self, i: usize) -> f64 {
        ((self.start_pct + self.step_pct * i as f64) * 1e6).round() / 1e6
    }
}

// ─── Sweep results ───────────────────────────────────────────────────

/// Aggregated trial outcomes for one risk fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepPoint {
    pub risk_pct: f64,
    pub prob_success_pct: f64,
    pub prob_ruin_pct: f64,
    pub avg_gain_pct: f64,
    pub median_gain_pct: f64,
}

/// The six competing objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Objective {
    MaxAverageGain,
    MaxMedianGain,
    MaxProbSuccess,
    /// Ruin below 1%, as close to 1% as possible.
    RuinBelowOnePct,
    /// Smallest non-zero ruin; higher average gain breaks ties.
    MinPositiveRuin,
    MaxSuccessMinusRuin,
}

impl Objective {
    pub const ALL: [Objective; 6] = [
        Objective::MaxAverageGain,
        Objective::MaxMedianGain,
        Objective::MaxProbSuccess,
        Objective::RuinBelowOnePct,
        Objective::MinPositiveRuin,
        Objective::MaxSuccessMinusRuin,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Objective::MaxAverageGain => "Max Average Gain",
            Objective::MaxMedianGain => "Max Median Gain",
            Objective::MaxProbSuccess => "Max Probability of Success",
            Objective::RuinBelowOnePct => "Ruin Just Below 1%",
            Objective::MinPositiveRuin => "Minimum Positive Ruin",
            Objective::MaxSuccessMinusRuin => "Max Success Minus Ruin",
        }
    }

    fn qualifies(self, p: &SweepPoint) -> bool {
        match self {
            Objective::RuinBelowOnePct => p.prob_ruin_pct < 1.0,
            Objective::MinPositiveRuin => p.prob_ruin_pct > 0.0,
            _ => true,
        }
    }

    /// Strict improvement of `candidate` over `incumbent`; equal scores keep
    /// the incumbent.
    fn improves(self, candidate: &SweepPoint, incumbent: &SweepPoint) -> bool {
        match self {
            Objective::MaxAverageGain => candidate.avg_gain_pct > incumbent.avg_gain_pct,
            Objective::MaxMedianGain => candidate.median_gain_pct > incumbent.median_gain_pct,
            Objective::MaxProbSuccess => candidate.prob_success_pct > incumbent.prob_success_pct,
            Objective::RuinBelowOnePct => candidate.prob_ruin_pct > incumbent.prob_ruin_pct,
            Objective::MinPositiveRuin => {
                candidate.prob_ruin_pct < incumbent.prob_ruin_pct
                    || (candidate.prob_ruin_pct == incumbent.prob_ruin_pct
                        && candidate.avg_gain_pct > incumbent.avg_gain_pct)
            }
            Objective::MaxSuccessMinusRuin => {
                candidate.prob_success_pct - candidate.prob_ruin_pct
                    > incumbent.prob_success_pct - incumbent.prob_ruin_pct
            }
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Running "best so far" for one objective.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveTracker {
    objective: Objective,
    best: Option<SweepPoint>,
}

impl ObjectiveTracker {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            best: None,
        }
    }

    pub fn observe(&mut self, point: &SweepPoint) {
        if !self.objective.qualifies(point) {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some(incumbent) => self.objective.improves(point, incumbent),
        };
        if replace {
            self.best = Some(*point);
        }
    }

    pub fn best(&self) -> Option<&SweepPoint> {
        self.best.as_ref()
    }

    pub fn into_row(self) -> OptimalFRow {
        OptimalFRow {
            objective: self.objective,
            approach: self.objective.label().to_string(),
            point: self.best,
        }
    }
}

/// One labelled answer. `point` is `None` when no swept fraction qualified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalFRow {
    pub objective: Objective,
    pub approach: String,
    pub point: Option<SweepPoint>,
}

impl OptimalFRow {
    pub fn is_placeholder(&self) -> bool {
        self.point.is_none()
    }

    pub fn optimal_risk_pct(&self) -> Option<f64> {
        self.point.map(|p| p.risk_pct)
    }
}

/// Final output of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalFReport {
    /// The config actually used, after clamping.
    pub config: OptimalFConfig,
    pub clamped: Vec<ClampedField>,
    /// One row per [`Objective::ALL`] entry, in that order.
    pub rows: Vec<OptimalFRow>,
    /// Every swept fraction, ascending.
    pub chart: Vec<SweepPoint>,
}

impl OptimalFReport {
    pub fn row(&self, objective: Objective) -> Option<&OptimalFRow> {
        self.rows.iter().find(|r| r.objective == objective)
    }
}

/// Events emitted by a spawned sweep.
#[derive(Debug, Clone)]
pub enum OptimalFEvent {
    /// Percent complete, 0–100, non-decreasing.
    Progress(u8),
    Finished(Box<OptimalFReport>),
}

// ─── Trials ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrialOutcome {
    final_equity: f64,
    ruined: bool,
}

fn run_trial<S: Sampler + ?Sized>(
    pool: &[f64],
    fraction: f64,
    config: &OptimalFConfig,
    sampler: &mut S,
) -> TrialOutcome {
    let ruin_level = config.ruin_level();
    let mut equity = 1.0_f64;

    for _ in 0..config.trades_per_sim {
        let r = pool[sampler.next_index(pool.len())];
        let pnl = match config.risk_mode {
            RiskMode::FixedFractional => equity * fraction * r,
            RiskMode::FixedInitial => fraction * r,
        };
        equity = (equity + pnl).clamp(0.0, EQUITY_CAP);
        if equity <= ruin_level {
            return TrialOutcome {
                final_equity: equity,
                ruined: true,
            };
        }
    }

    TrialOutcome {
        final_equity: equity,
        ruined: false,
    }
}

fn aggregate(risk_pct: f64, outcomes: &[TrialOutcome], config: &OptimalFConfig) -> SweepPoint {
    let total = outcomes.len().max(1) as f64;
    let success_level = config.success_level();

    let ruined = outcomes.iter().filter(|o| o.ruined).count();
    let succeeded = outcomes
        .iter()
        .filter(|o| !o.ruined && o.final_equity >= success_level)
        .count();

    let mut gains: Vec<f64> = outcomes
        .iter()
        .map(|o| (o.final_equity - 1.0) * 100.0)
        .collect();
    let avg_gain_pct = mean(&gains);
    sort_ascending(&mut gains);

    SweepPoint {
        risk_pct,
        prob_success_pct: succeeded as f64 / total * 100.0,
        prob_ruin_pct: ruined as f64 / total * 100.0,
        avg_gain_pct,
        median_gain_pct: median_sorted(&gains),
    }
}

// ─── Search ──────────────────────────────────────────────────────────

/// A configured sweep, ready to run synchronously or on a worker thread.
#[derive(Debug, Clone)]
pub struct OptimalFSearch {
    config: OptimalFConfig,
    clamped: Vec<ClampedField>,
    grid: RiskGrid,
    seed: u64,
}

impl OptimalFSearch {
    /// Clamp `config` into range; see [`OptimalFConfig::clamped`].
    pub fn new(config: OptimalFConfig) -> Self {
        let (config, clamped) = config.clamped();
        for change in &clamped {
            warn!(%change, "optimal-f config clamped");
        }
        Self {
            config,
            clamped,
            grid: RiskGrid::default(),
            seed: 42,
        }
    }

    /// Skip clamping so tests can run tiny batches.
    #[cfg(test)]
    fn unclamped(config: OptimalFConfig) -> Self {
        Self {
            config,
            clamped: Vec::new(),
            grid: RiskGrid::default(),
            seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_grid(mut self, grid: RiskGrid) -> Self {
        self.grid = grid;
        self
    }

    pub fn config(&self) -> &OptimalFConfig {
        &self.config
    }

    pub fn clamped_fields(&self) -> &[ClampedField] {
        &self.clamped
    }

    /// Evaluate one fraction over `total_sims` parallel trials.
    fn evaluate(&self, pool: &[f64], hierarchy: &RngHierarchy, step: usize) -> SweepPoint {
        let risk_pct = self.grid.risk_pct(step);
        let fraction = risk_pct / 100.0;
        let outcomes: Vec<TrialOutcome> = (0..self.config.total_sims)
            .into_par_iter()
            .map(|trial| {
                let mut sampler = hierarchy.sampler_for(OPTIMAL_F_STREAM, step as u64, trial as u64);
                run_trial(pool, fraction, &self.config, &mut sampler)
            })
            .collect();
        aggregate(risk_pct, &outcomes, &self.config)
    }

    /// Core loop. Stops with the handler's break value if it breaks.
    fn sweep<B>(
        &self,
        pool: &RPool,
        on_checkpoint: &mut dyn FnMut(u8) -> ControlFlow<B>,
    ) -> ControlFlow<B, OptimalFReport> {
        let start = Instant::now();
        let steps = self.grid.steps;
        info!(
            steps,
            sims = self.config.total_sims,
            trades = self.config.trades_per_sim,
            mode = ?self.config.risk_mode,
            "optimal-f sweep started"
        );

        if let ControlFlow::Break(stop) = on_checkpoint(0) {
            return ControlFlow::Break(stop);
        }

        let hierarchy = RngHierarchy::new(self.seed);
        let mut trackers: Vec<ObjectiveTracker> =
            Objective::ALL.iter().map(|&o| ObjectiveTracker::new(o)).collect();
        let mut chart = Vec::with_capacity(steps);

        for step in 0..steps {
            let point = self.evaluate(pool.values(), &hierarchy, step);
            for tracker in &mut trackers {
                tracker.observe(&point);
            }
            chart.push(point);

            let done = step + 1;
            if done % CHECKPOINT_INTERVAL == 0 && done < steps {
                let pct = (done * 100 / steps) as u8;
                debug!(pct, risk_pct = point.risk_pct, "optimal-f checkpoint");
                if let ControlFlow::Break(stop) = on_checkpoint(pct) {
                    info!(pct, "optimal-f sweep abandoned");
                    return ControlFlow::Break(stop);
                }
                thread::yield_now();
            }
        }
        // The run is complete; a consumer that left at 100% changes nothing.
        let _ = on_checkpoint(100);

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "optimal-f sweep finished"
        );
        ControlFlow::Continue(OptimalFReport {
            config: self.config,
            clamped: self.clamped.clone(),
            rows: trackers.into_iter().map(ObjectiveTracker::into_row).collect(),
            chart,
        })
    }

    /// Run to completion on the calling thread.
    pub fn run(&self, pool: &RPool, progress_cb: Option<&dyn Fn(u8)>) -> OptimalFReport {
        let mut forward = |pct: u8| -> ControlFlow<Infallible> {
            if let Some(cb) = progress_cb {
                cb(pct);
            }
            ControlFlow::Continue(())
        };
        match self.sweep(pool, &mut forward) {
            ControlFlow::Continue(report) => report,
            ControlFlow::Break(never) => match never {},
        }
    }

    /// Run on a named worker thread, streaming events over a channel.
    pub fn spawn(self, pool: RPool) -> std::io::Result<OptimalFStream> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("edgelab-optimal-f".into())
            .spawn(move || {
                let mut send_progress = |pct: u8| {
                    if tx.send(OptimalFEvent::Progress(pct)).is_ok() {
                        ControlFlow::Continue(())
                    } else {
                        ControlFlow::Break(())
                    }
                };
                if let ControlFlow::Continue(report) = self.sweep(&pool, &mut send_progress) {
                    let _ = tx.send(OptimalFEvent::Finished(Box::new(report)));
                }
            })?;
        Ok(OptimalFStream {
            rx,
            handle: Some(handle),
        })
    }
}

/// Consumer side of a spawned sweep.
///
/// Iterating yields progress events and finally the report. Dropping the
/// stream early is the cancellation signal: the worker stops at its next
/// checkpoint.
#[derive(Debug)]
pub struct OptimalFStream {
    rx: Receiver<OptimalFEvent>,
    handle: Option<JoinHandle<()>>,
}

impl OptimalFStream {
    /// Drain progress events, forwarding them to `on_progress`, and return the report.
    pub fn wait(mut self, mut on_progress: impl FnMut(u8)) -> Option<OptimalFReport> {
        let mut report = None;
        for event in self.rx.iter() {
            match event {
                OptimalFEvent::Progress(pct) => on_progress(pct),
                OptimalFEvent::Finished(r) => report = Some(*r),
            }
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("optimal-f worker panicked");
            }
        }
        report
    }
}

impl Iterator for OptimalFStream {
    type Item = OptimalFEvent;

    fn next(&mut self) -> Option<OptimalFEvent> {
        self.rx.recv().ok()
    }
}

// ─── Entry points ────────────────────────────────────────────────────

/// Run the full sweep on the calling thread.
pub fn run_optimal_f(
    pool: &RPool,
    config: OptimalFConfig,
    seed: u64,
    progress_cb: Option<&dyn Fn(u8)>,
) -> OptimalFReport {
    OptimalFSearch::new(config).with_seed(seed).run(pool, progress_cb)
}

/// Start the full sweep on a worker thread and return its event stream.
pub fn spawn_optimal_f(
    pool: RPool,
    config: OptimalFConfig,
    seed: u64,
) -> std::io::Result<OptimalFStream> {
    OptimalFSearch::new(config).with_seed(seed).spawn(pool)
}
