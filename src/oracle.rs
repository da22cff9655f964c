//! Structural response oracle boundary
//!
//! The nonlinear model and its solver live outside this crate. The
//! scheduler sees them only through [`StructuralOracle`]: one blocking call
//! per tested intensity, answered with a tri-state [`OracleOutcome`].
//!
//! Closures implement the trait, which keeps test oracles short:
//!
//! ```rust
//! use ida_htf::oracle::{OracleOutcome, OracleRequest, StructuralOracle};
//! use ida_htf::run::ResponseBundle;
//!
//! let oracle = |request: &OracleRequest<'_>| -> ida_htf::Result<OracleOutcome> {
//!     if request.intensity >= 0.3 {
//!         Ok(OracleOutcome::Collapsed(ResponseBundle::default()))
//!     } else {
//!         Ok(OracleOutcome::Survived(ResponseBundle::default()))
//!     }
//! };
//! # fn assert_oracle<O: StructuralOracle>(_: &O) {}
//! # assert_oracle(&oracle);
//! ```

use crate::config::AnalysisSettings;
use crate::record::GroundMotion;
use crate::run::{ResponseBundle, RunStatus};
use crate::Result;

/// Everything the oracle needs for one analysis.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    /// Unscaled record
    pub record: &'a GroundMotion,
    /// 1-based run index within the record's schedule
    pub run_index: usize,
    /// Target absolute intensity
    pub intensity: f64,
    /// Factor applied to every component (`intensity / reference`)
    pub scale_factor: f64,
    /// Damping, collapse threshold and reporting levels
    pub settings: &'a AnalysisSettings,
}

impl OracleRequest<'_> {
    /// Record components multiplied by the scale factor.
    #[must_use]
    pub fn scaled_components(&self) -> Vec<Vec<f64>> {
        self.record
            .components()
            .iter()
            .map(|acc| acc.iter().map(|a| a * self.scale_factor).collect())
            .collect()
    }

    /// Analysis duration in seconds.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.record.duration()
    }
}

/// Result of one structural analysis.
#[derive(Debug, Clone, PartialEq)]
pub enum OracleOutcome {
    /// The solver failed to converge; no responses are available.
    NonConverged,
    /// Converged without collapse.
    Survived(ResponseBundle),
    /// Converged and the collapse criterion was met.
    Collapsed(ResponseBundle),
}

impl OracleOutcome {
    /// Tri-state status of this outcome.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        match self {
            Self::NonConverged => RunStatus::NonConverged,
            Self::Survived(_) => RunStatus::Survived,
            Self::Collapsed(_) => RunStatus::Collapsed,
        }
    }

    /// Take the response bundle, if any.
    #[must_use]
    pub fn into_response(self) -> Option<ResponseBundle> {
        match self {
            Self::NonConverged => None,
            Self::Survived(response) | Self::Collapsed(response) => Some(response),
        }
    }
}

/// A nonlinear time-history solver.
///
/// Implementations must be callable from several worker threads at once;
/// each call is independent and may block for as long as the solve takes.
pub trait StructuralOracle: Sync {
    /// Run one analysis.
    ///
    /// # Errors
    ///
    /// Returns error if the analysis could not be attempted at all
    /// (as opposed to a non-converged solve, which is an outcome).
    fn analyse(&self, request: &OracleRequest<'_>) -> Result<OracleOutcome>;
}

impl<F> StructuralOracle for F
where
    F: Fn(&OracleRequest<'_>) -> Result<OracleOutcome> + Sync,
{
    fn analyse(&self, request: &OracleRequest<'_>) -> Result<OracleOutcome> {
        self(request)
    }
}
