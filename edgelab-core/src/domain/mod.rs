//! Domain types shared by every engine.

pub mod correlation;
pub mod pool;

pub use correlation::{
    CorrelationLevel, CorrelationMatrix, MatrixError, LEVEL_COEFFICIENTS, MAX_ASSETS, MIN_ASSETS,
};
pub use pool::{FrequencyRow, PoolError, RPool};
