//! Unified error types for the edgeplan workspace
//!
//! This module provides a common error type [`PlanError`] that can represent
//! failures from any stage of the pipeline. Crate-local errors are converted
//! to `PlanError` at API boundaries so callers handle one type.
//!
//! # Example
//!
//! ```ignore
//! use edgeplan_core::{PlanError, PlanResult};
//!
//! fn run(dir: &str) -> PlanResult<()> {
//!     let inputs = load_inputs(dir)?;
//!     plan(&inputs)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all planner operations.
///
/// The variants follow the failure classes of the pipeline: file access,
/// malformed input, bad configuration, structural validation, demand that
/// cannot be placed, and internal consistency faults.
#[derive(Error, Debug)]
pub enum PlanError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input file
    #[error("Parse error: {0}")]
    Parse(String),

    /// Missing or out-of-range configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Structural validation errors (topology, solution shape)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Demand that no reachable server can carry
    #[error("Infeasible demand: {0}")]
    Infeasible(String),

    /// Internal consistency check failed; never silently recovered
    #[error("Invariant violation: {0}")]
    Invariant(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PlanError.
pub type PlanResult<T> = Result<T, PlanError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for PlanError {
    fn from(err: anyhow::Error) -> Self {
        PlanError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for PlanError {
    fn from(s: String) -> Self {
        PlanError::Other(s)
    }
}

impl From<&str> for PlanError {
    fn from(s: &str) -> Self {
        PlanError::Other(s.to_string())
    }
}
