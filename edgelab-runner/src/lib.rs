//! EdgeLab Runner — the expensive engines built on `edgelab-core`.
//!
//! This crate provides:
//! - Single-path simulation over an R-multiple pool
//! - Monte Carlo engine with extremal and average equity curves
//! - Optimal-f sweep with a cooperative progress stream
//! - Correlated risk allocation (iterative pruning)
//! - TOML analysis configuration

pub mod allocation;
pub mod config;
pub mod monte_carlo;
pub mod optimal_f;
pub mod path;

pub use allocation::{
    prune_risk_allocation, AllocationError, AllocationReport, AssetAllocation, ConstraintLabel,
};
pub use config::{AllocationConfig, AnalysisConfig, ConfigError, CorrelationPair};
pub use monte_carlo::{
    run_monte_carlo, run_monte_carlo_with_sampler, CurveKind, Distributions, EquityCurve,
    RiskMetrics, SimulationConfig, SimulationResults,
};
pub use optimal_f::{
    run_optimal_f, spawn_optimal_f, ClampedField, Objective, OptimalFConfig, OptimalFEvent,
    OptimalFReport, OptimalFRow, OptimalFSearch, OptimalFStream, RiskGrid, RiskMode, SweepPoint,
};
pub use path::{simulate_path, PathSummary, SimulatedPath};
