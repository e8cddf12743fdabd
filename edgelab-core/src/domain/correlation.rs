//! Categorical correlation levels and the symmetric asset matrix.
//!
//! Users describe pairwise relationships with one of five levels; the solver
//! only ever sees the coefficient looked up from [`LEVEL_COEFFICIENTS`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest supported portfolio.
pub const MIN_ASSETS: usize = 2;
/// Largest supported portfolio.
pub const MAX_ASSETS: usize = 10;

/// Pairwise return relationship between two assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationLevel {
    Strong,
    Medium,
    Weak,
    PartialHedge,
    StrongHedge,
}

/// Coefficient lookup table, one entry per level.
pub const LEVEL_COEFFICIENTS: [(CorrelationLevel, f64); 5] = [
    (CorrelationLevel::Strong, 0.9),
    (CorrelationLevel::Medium, 0.5),
    (CorrelationLevel::Weak, 0.1),
    (CorrelationLevel::PartialHedge, -0.5),
    (CorrelationLevel::StrongHedge, -0.8),
];

impl CorrelationLevel {
    pub const ALL: [CorrelationLevel; 5] = [
        CorrelationLevel::Strong,
        CorrelationLevel::Medium,
        CorrelationLevel::Weak,
        CorrelationLevel::PartialHedge,
        CorrelationLevel::StrongHedge,
    ];

    pub fn coefficient(self) -> f64 {
        LEVEL_COEFFICIENTS
            .iter()
            .find(|(level, _)| *level == self)
            .map(|(_, c)| *c)
            .unwrap_or(0.0)
    }

    /// Negative-correlation levels.
    pub fn is_hedge(self) -> bool {
        matches!(
            self,
            CorrelationLevel::PartialHedge | CorrelationLevel::StrongHedge
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            CorrelationLevel::Strong => "Strong",
            CorrelationLevel::Medium => "Medium",
            CorrelationLevel::Weak => "Weak",
            CorrelationLevel::PartialHedge => "Partial Hedge",
            CorrelationLevel::StrongHedge => "Strong Hedge",
        }
    }
}

impl fmt::Display for CorrelationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors raised while building a correlation matrix.
#[derive(Debug, Error, PartialEq)]
pub enum MatrixError {
    #[error("asset count {n} outside supported range 2..=10")]
    SizeOutOfRange { n: usize },

    #[error("row {row} has the wrong number of entries")]
    NotSquare { row: usize },

    #[error("matrix is not symmetric at ({i}, {j})")]
    Asymmetric { i: usize, j: usize },

    #[error("the diagonal is fixed at 1.0 and cannot be assigned a level")]
    DiagonalNotAllowed,

    #[error("asset index {index} out of range for {n} assets")]
    IndexOutOfRange { index: usize, n: usize },
}

/// Symmetric N×N matrix of correlation levels with a fixed unit diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    n: usize,
    /// Row-major levels. Diagonal slots are never read.
    levels: Vec<CorrelationLevel>,
}

impl CorrelationMatrix {
    /// Matrix where every pair shares `default_level`.
    pub fn uniform(n: usize, default_level: CorrelationLevel) -> Result<Self, MatrixError> {
        if !(MIN_ASSETS..=MAX_ASSETS).contains(&n) {
            return Err(MatrixError::SizeOutOfRange { n });
        }
        Ok(Self {
            n,
            levels: vec![default_level; n * n],
        })
    }

    /// Build from full rows. Diagonal entries are ignored; off-diagonal
    /// entries must mirror each other.
    pub fn from_rows(rows: &[Vec<CorrelationLevel>]) -> Result<Self, MatrixError> {
        let n = rows.len();
        let mut matrix = Self::uniform(n, CorrelationLevel::Weak)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(MatrixError::NotSquare { row: i });
            }
        }
        for i in 0..n {
            for j in (i + 1)..n {
                if rows[i][j] != rows[j][i] {
                    return Err(MatrixError::Asymmetric { i, j });
                }
                matrix.set(i, j, rows[i][j])?;
            }
        }
        Ok(matrix)
    }

    /// Assign the level of pair (i, j); the mirror entry follows.
    pub fn set(&mut self, i: usize, j: usize, level: CorrelationLevel) -> Result<(), MatrixError> {
        for index in [i, j] {
            if index >= self.n {
                return Err(MatrixError::IndexOutOfRange { index, n: self.n });
            }
        }
        if i == j {
            return Err(MatrixError::DiagonalNotAllowed);
        }
        self.levels[i * self.n + j] = level;
        self.levels[j * self.n + i] = level;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Level of an off-diagonal pair, `None` on the diagonal.
    pub fn level(&self, i: usize, j: usize) -> Option<CorrelationLevel> {
        (i != j).then(|| self.levels[i * self.n + j])
    }

    pub fn coefficient(&self, i: usize, j: usize) -> f64 {
        match self.level(i, j) {
            Some(level) => level.coefficient(),
            None => 1.0,
        }
    }

    /// Dense coefficient matrix Σ.
    pub fn coefficients(&self) -> Vec<Vec<f64>> {
        (0..self.n)
            .map(|i| (0..self.n).map(|j| self.coefficient(i, j)).collect())
            .collect()
    }

    /// True if any pair is a hedge relationship.
    pub fn has_hedge(&self) -> bool {
        (0..self.n).any(|i| ((i + 1)..self.n).any(|j| self.levels[i * self.n + j].is_hedge()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_table_values() {
        assert_eq!(CorrelationLevel::Strong.coefficient(), 0.9);
        assert_eq!(CorrelationLevel::Medium.coefficient(), 0.5);
        assert_eq!(CorrelationLevel::Weak.coefficient(), 0.1);
        assert_eq!(CorrelationLevel::PartialHedge.coefficient(), -0.5);
        assert_eq!(CorrelationLevel::StrongHedge.coefficient(), -0.8);
    }

    #[test]
    fn every_level_has_a_table_entry() {
        for level in CorrelationLevel::ALL {
            assert!(LEVEL_COEFFICIENTS.iter().any(|(l, _)| *l == level));
        }
    }

    #[test]
    fn size_bounds_enforced() {
        assert_eq!(
            CorrelationMatrix::uniform(1, CorrelationLevel::Weak),
            Err(MatrixError::SizeOutOfRange { n: 1 })
        );
        assert_eq!(
            CorrelationMatrix::uniform(11, CorrelationLevel::Weak),
            Err(MatrixError::SizeOutOfRange { n: 11 })
        );
        assert!(CorrelationMatrix::uniform(10, CorrelationLevel::Weak).is_ok());
    }

    #[test]
    fn set_is_symmetric_and_diagonal_fixed() {
        let mut m = CorrelationMatrix::uniform(3, CorrelationLevel::Weak).unwrap();
        m.set(0, 2, CorrelationLevel::StrongHedge).unwrap();
        assert_eq!(m.coefficient(2, 0), -0.8);
        assert_eq!(m.coefficient(1, 1), 1.0);
        assert_eq!(m.set(1, 1, CorrelationLevel::Strong), Err(MatrixError::DiagonalNotAllowed));
        assert!(m.has_hedge());
    }

    #[test]
    fn from_rows_rejects_asymmetry() {
        use CorrelationLevel::*;
        let rows = vec![
            vec![Strong, Medium],
            vec![Weak, Strong],
        ];
        assert_eq!(
            CorrelationMatrix::from_rows(&rows),
            Err(MatrixError::Asymmetric { i: 0, j: 1 })
        );
    }

    #[test]
    fn from_rows_rejects_ragged() {
        use CorrelationLevel::*;
        let rows = vec![vec![Strong, Medium], vec![Medium]];
        assert_eq!(
            CorrelationMatrix::from_rows(&rows),
            Err(MatrixError::NotSquare { row: 1 })
        );
    }

    #[test]
    fn no_hedge_when_all_positive() {
        let m = CorrelationMatrix::uniform(4, CorrelationLevel::Medium).unwrap();
        assert!(!m.has_hedge());
        let sigma = m.coefficients();
        assert_eq!(sigma[0][0], 1.0);
        assert_eq!(sigma[0][3], 0.5);
    }

    #[test]
    fn level_serializes_snake_case() {
        let json = serde_json::to_string(&CorrelationLevel::PartialHedge).unwrap();
        assert_eq!(json, "\"partial_hedge\"");
    }
}
