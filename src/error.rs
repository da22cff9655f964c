//! Error types for ida-htf
//!
//! Domain errors carry enough context to tell the caller which record or
//! run failed and what to change. Non-fatal scheduling conditions are not
//! errors; see [`crate::schedule::ScheduleWarning`].

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// ida-htf error types
#[derive(Error, Debug)]
pub enum Error {
    /// Acceleration series has no samples
    #[error("Empty acceleration signal: at least one sample is required")]
    EmptySignal,

    /// Acceleration series contains NaN or infinity
    #[error("Non-finite acceleration sample at index {index}")]
    NonFiniteSample {
        /// Position of the offending sample
        index: usize,
    },

    /// Time step must be finite and strictly positive
    #[error("Invalid time step: {0} (must be finite and > 0)")]
    InvalidTimeStep(f64),

    /// Structural period must be finite and non-negative
    #[error("Invalid period: {0} s (must be finite and >= 0)")]
    InvalidPeriod(f64),

    /// Damping ratio outside (0, 1)
    #[error("Invalid damping ratio: {0} (expected 0 < zeta < 1)")]
    InvalidDamping(f64),

    /// Generic malformed argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reference intensity cannot be used to derive scale factors
    #[error("Record {record_id}: reference intensity {value} is not usable for scaling (must be finite and > 0)")]
    InvalidReferenceIntensity {
        /// Record identifier
        record_id: u32,
        /// Offending reference intensity
        value: f64,
    },

    /// The structural response oracle reported its own failure
    #[error("Record {record_id}, run {run}: structural oracle failed: {message}")]
    OracleFailed {
        /// Record identifier
        record_id: u32,
        /// 1-based run index
        run: usize,
        /// Oracle-provided description
        message: String,
    },

    /// Oracle did not converge and the policy is to abort the record
    #[error("Record {record_id}, run {run}: analysis did not converge at intensity {intensity}\nSelect a different non-convergence policy to continue scheduling")]
    NonConvergence {
        /// Record identifier
        record_id: u32,
        /// 1-based run index
        run: usize,
        /// Tested intensity
        intensity: f64,
    },

    /// Storage error (run archive / exports)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
