//! Correlated risk allocation — shrink per-asset risk until the portfolio
//! fits both a nominal heat budget and a volatility budget.
//!
//! Every asset starts at the single-asset cap K2. Each iteration measures
//! portfolio risk `√(wᵗΣw)` and nominal sum `Σw` against the heat budget K1
//! and shrinks weights in proportion to their positive marginal contribution
//! `(Σw)ᵢ`. Hedging assets have small or negative marginal contributions, so
//! they absorb little of the pruning pressure.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use edgelab_core::domain::CorrelationMatrix;

pub const MAX_ITERATIONS: usize = 200;
pub const LEARNING_RATE: f64 = 0.1;
pub const STEP_MULTIPLIER: f64 = 5.0;
/// Largest fractional shrink applied to one weight in one iteration.
pub const MAX_STEP_SHRINK: f64 = 0.2;
/// Share of nominal overload applied evenly to every asset.
pub const UNIFORM_PRESSURE: f64 = 0.1;
pub const CONVERGENCE_TOLERANCE: f64 = 1.0001;
pub const MIN_WEIGHT_CHANGE: f64 = 1e-5;
/// Heat budget multiplier when hedges are present and over-allocation is allowed.
pub const HEDGE_HEAT_MULTIPLIER: f64 = 1.25;
pub const FINAL_CLAMP_MARGIN: f64 = 0.999;

const PRUNED_FLOOR: f64 = 0.01;
const SINGLE_CAP_BAND: f64 = 0.05;

/// Errors from the pruning solver.
#[derive(Debug, Error, PartialEq)]
pub enum AllocationError {
    #[error("{names} asset names for a {matrix}x{matrix} correlation matrix")]
    AssetCountMismatch { names: usize, matrix: usize },
}

/// Which constraint shaped an asset's final risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintLabel {
    #[serde(rename = "None")]
    Unconstrained,
    #[serde(rename = "Risk Pruning")]
    RiskPruning,
    #[serde(rename = "Single Cap")]
    SingleCap,
    #[serde(rename = "Risk Alloc.")]
    RiskAllocation,
}

impl ConstraintLabel {
    /// Classify a solved weight against the cap it started from.
    pub fn classify(final_risk: f64, initial_risk: f64) -> Self {
        if final_risk == initial_risk {
            ConstraintLabel::Unconstrained
        } else if final_risk < PRUNED_FLOOR {
            ConstraintLabel::RiskPruning
        } else if (final_risk - initial_risk).abs() < SINGLE_CAP_BAND {
            ConstraintLabel::SingleCap
        } else {
            ConstraintLabel::RiskAllocation
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConstraintLabel::Unconstrained => "None",
            ConstraintLabel::RiskPruning => "Risk Pruning",
            ConstraintLabel::SingleCap => "Single Cap",
            ConstraintLabel::RiskAllocation => "Risk Alloc.",
        }
    }
}

impl fmt::Display for ConstraintLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Solved risk for one asset, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub name: String,
    pub initial_risk: f64,
    pub final_risk: f64,
    pub constraint_label: ConstraintLabel,
}

/// Per-asset rows plus solver diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub allocations: Vec<AssetAllocation>,
    /// Pruning steps applied.
    pub iterations: usize,
    /// Final portfolio within tolerance of the heat budget.
    pub converged: bool,
    /// Heat budget after any hedge inflation.
    pub effective_heat: f64,
    pub portfolio_risk: f64,
    pub nominal_sum: f64,
}

impl AllocationReport {
    pub fn total_final_risk(&self) -> f64 {
        self.allocations.iter().map(|a| a.final_risk).sum()
    }
}

// ─── Linear algebra ──────────────────────────────────────────────────

fn mat_vec(sigma: &[Vec<f64>], w: &[f64]) -> Vec<f64> {
    sigma
        .iter()
        .map(|row| row.iter().zip(w).map(|(c, x)| c * x).sum())
        .collect()
}

fn portfolio_risk(sigma: &[Vec<f64>], w: &[f64]) -> f64 {
    let variance: f64 = mat_vec(sigma, w).iter().zip(w).map(|(m, x)| m * x).sum();
    variance.max(0.0).sqrt()
}

// ─── Solver ──────────────────────────────────────────────────────────

/// Fractional shrink for each weight given the current overloads.
fn prune_ratios(marginal: &[f64], risk_overload: f64, sum_overload: f64) -> Vec<f64> {
    let positive_total: f64 = marginal.iter().filter(|m| **m > 0.0).sum();

    marginal
        .iter()
        .map(|&m| {
            let share = if m > 0.0 && positive_total > 0.0 {
                m / positive_total
            } else {
                0.0
            };
            let mut ratio = 0.0_f64;
            if risk_overload > 1.0 {
                ratio = ratio.max(share * (risk_overload - 1.0));
            }
            if sum_overload > 1.0 {
                let uniform = UNIFORM_PRESSURE * (sum_overload - 1.0);
                let weighted = share * (sum_overload - 1.0);
                ratio = ratio.max(uniform + weighted);
            }
            ratio
        })
        .collect()
}

/// Rescale so the nominal sum sits just inside `heat`.
fn clamp_to_heat(weights: &mut [f64], heat: f64) {
    let sum: f64 = weights.iter().sum();
    if sum > heat {
        let scale = heat / sum * FINAL_CLAMP_MARGIN;
        for w in weights.iter_mut() {
            *w *= scale;
        }
    }
}

/// Solve per-asset risk for `asset_names` under `matrix`.
///
/// `max_single_risk` (K2) and `total_heat` (K1) are percentages. When
/// `allow_over_allocation` is set and any pair hedges, K1 is inflated by
/// [`HEDGE_HEAT_MULTIPLIER`].
pub fn prune_risk_allocation(
    asset_names: &[String],
    matrix: &CorrelationMatrix,
    max_single_risk: f64,
    total_heat: f64,
    allow_over_allocation: bool,
) -> Result<AllocationReport, AllocationError> {
    let n = matrix.size();
    if asset_names.len() != n {
        return Err(AllocationError::AssetCountMismatch {
            names: asset_names.len(),
            matrix: n,
        });
    }

    let heat = if allow_over_allocation && matrix.has_hedge() {
        total_heat * HEDGE_HEAT_MULTIPLIER
    } else {
        total_heat
    };
    let sigma = matrix.coefficients();
    let mut weights = vec![max_single_risk; n];
    let mut max_change = f64::INFINITY;
    let mut iterations = 0;

    info!(assets = n, max_single_risk, heat, "risk pruning started");

    while iterations < MAX_ITERATIONS {
        let risk_overload = portfolio_risk(&sigma, &weights) / heat;
        let sum_overload = weights.iter().sum::<f64>() / heat;
        if risk_overload.max(sum_overload) <= CONVERGENCE_TOLERANCE || max_change < MIN_WEIGHT_CHANGE
        {
            break;
        }

        let marginal = mat_vec(&sigma, &weights);
        let ratios = prune_ratios(&marginal, risk_overload, sum_overload);

        max_change = 0.0;
        for (w, ratio) in weights.iter_mut().zip(&ratios) {
            let shrink = (ratio * LEARNING_RATE * STEP_MULTIPLIER).min(MAX_STEP_SHRINK);
            let next = *w * (1.0 - shrink);
            max_change = max_change.max((next - *w).abs());
            *w = next;
        }
        iterations += 1;
        debug!(iterations, risk_overload, sum_overload, max_change, "pruning step");
    }

    clamp_to_heat(&mut weights, heat);

    let risk = portfolio_risk(&sigma, &weights);
    let nominal_sum: f64 = weights.iter().sum();
    let converged = (risk / heat).max(nominal_sum / heat) <= CONVERGENCE_TOLERANCE;
    info!(iterations, converged, risk, nominal_sum, "risk pruning finished");

    let allocations = asset_names
        .iter()
        .zip(&weights)
        .map(|(name, &w)| {
            let final_risk = w.max(0.0);
            AssetAllocation {
                name: name.clone(),
                initial_risk: max_single_risk,
                final_risk,
                constraint_label: ConstraintLabel::classify(final_risk, max_single_risk),
            }
        })
        .collect();

    Ok(AllocationReport {
        allocations,
        iterations,
        converged,
        effective_heat: heat,
        portfolio_risk: risk,
        nominal_sum,
    })
}
