//! Raw P&L ingestion: free text in, R-multiple pool out.
//!
//! Tokens are separated by newlines, commas or semicolons. A token must be a
//! complete numeric literal ("12x" and "$12" are dropped, not truncated).
//! Invalid tokens are skipped silently; only the counts below are errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::clamp_sample_size;

/// Minimum number of valid P&L entries.
pub const MIN_RAW_ENTRIES: usize = 30;

/// Errors from raw P&L ingestion.
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("insufficient data: {valid} valid entries < minimum 30")]
    InsufficientData { valid: usize },

    #[error("no losing trades: cannot derive a risk unit")]
    NoLossReference,

    #[error("derived risk unit is zero")]
    ZeroRiskUnit,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPnl {
    /// Every valid token divided by `r_unit`, in input order.
    pub pool: Vec<f64>,
    /// Mean absolute loss.
    pub r_unit: f64,
    pub valid_count: usize,
    /// `valid_count` clamped for SQN.
    pub sample_size: usize,
}

/// Split `text` and keep every token that parses as a finite number.
pub fn parse_tokens(text: &str) -> Vec<f64> {
    text.split(['\n', ',', ';'])
        .filter_map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Convert raw P&L text into an R-multiple pool.
///
/// The risk unit is the mean absolute value of the losing entries; every
/// entry (winners included) is divided by it.
pub fn ingest_raw_pnl(text: &str) -> Result<RawPnl, IngestError> {
    let tokens = parse_tokens(text);
    let valid = tokens.len();
    if valid < MIN_RAW_ENTRIES {
        return Err(IngestError::InsufficientData { valid });
    }

    let losses: Vec<f64> = tokens.iter().filter(|&&v| v < 0.0).map(|v| v.abs()).collect();
    if losses.is_empty() {
        return Err(IngestError::NoLossReference);
    }

    let r_unit = losses.iter().sum::<f64>() / losses.len() as f64;
    if r_unit == 0.0 {
        return Err(IngestError::ZeroRiskUnit);
    }

    Ok(RawPnl {
        pool: tokens.iter().map(|v| v / r_unit).collect(),
        r_unit,
        valid_count: valid,
        sample_size: clamp_sample_size(valid),
    })
}
