//! TOML analysis configuration.
//!
//! One document drives every command: a master seed plus optional
//! `[monte_carlo]`, `[optimal_f]` and `[allocation]` sections.
//!
//! ```toml
//! seed = 7
//!
//! [monte_carlo]
//! total_simulations = 5000
//! trades_per_simulation = 200
//!
//! [allocation]
//! assets = ["ES", "NQ", "GC"]
//! max_single_risk = 2.0
//! total_heat = 5.0
//! default_level = "weak"
//!
//! [[allocation.pairs]]
//! a = "ES"
//! b = "NQ"
//! level = "strong"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::domain::{CorrelationLevel, CorrelationMatrix, MatrixError};

use crate::monte_carlo::SimulationConfig;
use crate::optimal_f::OptimalFConfig;

/// Default master seed when the document does not name one.
pub const DEFAULT_SEED: u64 = 42;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("correlation matrix: {0}")]
    Matrix(#[from] MatrixError),
}

/// Top-level analysis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub monte_carlo: Option<SimulationConfig>,
    #[serde(default)]
    pub optimal_f: Option<OptimalFConfig>,
    #[serde(default)]
    pub allocation: Option<AllocationConfig>,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            monte_carlo: None,
            optimal_f: None,
            allocation: None,
        }
    }
}

impl AnalysisConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        if let Some(mc) = &config.monte_carlo {
            mc.validate()?;
        }
        if let Some(alloc) = &config.allocation {
            alloc.validate()?;
        }
        Ok(config)
    }
}

/// One explicitly configured asset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationPair {
    pub a: String,
    pub b: String,
    pub level: CorrelationLevel,
}

/// Portfolio to prune. Pairs not listed fall back to `default_level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationConfig {
    pub assets: Vec<String>,
    /// Per-asset cap K2, in percent.
    pub max_single_risk: f64,
    /// Total heat budget K1, in percent.
    pub total_heat: f64,
    #[serde(default)]
    pub allow_over_allocation: bool,
    #[serde(default = "default_level")]
    pub default_level: CorrelationLevel,
    #[serde(default)]
    pub pairs: Vec<CorrelationPair>,
}

fn default_level() -> CorrelationLevel {
    CorrelationLevel::Weak
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_single_risk.is_finite() && self.max_single_risk > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_single_risk must be positive, got {}",
                self.max_single_risk
            )));
        }
        if !(self.total_heat.is_finite() && self.total_heat > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "total_heat must be positive, got {}",
                self.total_heat
            )));
        }
        for (i, name) in self.assets.iter().enumerate() {
            if self.assets[..i].contains(name) {
                return Err(ConfigError::Invalid(format!("duplicate asset '{name}'")));
            }
        }
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, ConfigError> {
        self.assets
            .iter()
            .position(|a| a == name)
            .ok_or_else(|| ConfigError::Invalid(format!("pair names unknown asset '{name}'")))
    }

    /// Build the correlation matrix from the default level and listed pairs.
    ///
    /// Later pairs override earlier ones.
    pub fn build_matrix(&self) -> Result<CorrelationMatrix, ConfigError> {
        let mut matrix = CorrelationMatrix::uniform(self.assets.len(), self.default_level)?;
        for pair in &self.pairs {
            let i = self.index_of(&pair.a)?;
            let j = self.index_of(&pair.b)?;
            matrix.set(i, j, pair.level)?;
        }
        Ok(matrix)
    }
}
