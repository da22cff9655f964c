//! Analysis configuration
//!
//! Every section deserializes with defaults, so a JSON file only needs to
//! name what it changes:
//!
//! ```rust
//! use ida_htf::config::IdaConfig;
//!
//! let config = IdaConfig::from_json_str(r#"{
//!     "measure": { "kind": "sa", "period": 0.8 },
//!     "htf": { "max_runs": 15 }
//! }"#)?;
//! assert_eq!(config.htf.max_runs, 15);
//! assert!((config.htf.first_intensity - 0.05).abs() < 1e-12);
//! # Ok::<(), ida_htf::Error>(())
//! ```

use crate::curve::ResponseMetric;
use crate::intensity::IntensityMeasure;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How an oracle non-convergence steers the Hunt/Trace phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonConvergencePolicy {
    /// Treat the run as survived and keep stepping upwards.
    #[default]
    AssumeSurvived,
    /// Treat the run as a collapse.
    AssumeCollapse,
    /// Stop scheduling the record with [`Error::NonConvergence`].
    Abort,
}

/// Hunt-Trace-Fill scheduling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtfConfig {
    /// Intensity of the first hunting run
    pub first_intensity: f64,
    /// Hunting step; run `j` adds `(j - 1) * increment_step`
    pub increment_step: f64,
    /// Oracle call budget per record
    pub max_runs: usize,
    /// Fraction of the remaining gap added per tracing run
    pub trace_ratio: f64,
    /// Trace increments below this value are replaced by `trace_floor`
    pub trace_threshold: f64,
    /// Trace increment used below `trace_threshold`
    pub trace_floor: f64,
    /// Non-convergence handling
    pub non_convergence: NonConvergencePolicy,
}

impl Default for HtfConfig {
    fn default() -> Self {
        Self {
            first_intensity: 0.05,
            increment_step: 0.05,
            max_runs: 10,
            trace_ratio: 0.2,
            trace_threshold: 0.025,
            trace_floor: 0.025,
            non_convergence: NonConvergencePolicy::AssumeSurvived,
        }
    }
}

impl HtfConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        positive("htf.first_intensity", self.first_intensity)?;
        positive("htf.increment_step", self.increment_step)?;
        positive("htf.trace_floor", self.trace_floor)?;
        if self.max_runs == 0 {
            return Err(Error::InvalidConfig(
                "htf.max_runs must be at least 1".to_string(),
            ));
        }
        if !(self.trace_ratio > 0.0 && self.trace_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "htf.trace_ratio must lie in (0, 1], got {}",
                self.trace_ratio
            )));
        }
        if !(self.trace_threshold.is_finite() && self.trace_threshold >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "htf.trace_threshold must be finite and >= 0, got {}",
                self.trace_threshold
            )));
        }
        Ok(())
    }
}

/// Parameters forwarded to the structural response oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Structural damping ratio
    pub damping_ratio: f64,
    /// Circular frequencies (rad/s) anchoring Rayleigh damping, ascending.
    /// `(0, 0)` leaves the choice to the oracle.
    pub rayleigh_frequencies: (f64, f64),
    /// Peak story drift ratio beyond which the oracle declares collapse
    pub collapse_drift_ratio: f64,
    /// Levels at which peak responses are reported
    pub control_levels: Vec<u32>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            damping_ratio: 0.05,
            rayleigh_frequencies: (0.0, 0.0),
            collapse_drift_ratio: 0.10,
            control_levels: Vec::new(),
        }
    }
}

impl AnalysisSettings {
    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.damping_ratio >= 0.0 && self.damping_ratio < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "analysis.damping_ratio must lie in [0, 1), got {}",
                self.damping_ratio
            )));
        }
        let (low, high) = self.rayleigh_frequencies;
        let unset = low == 0.0 && high == 0.0;
        if !unset && !(low > 0.0 && high.is_finite() && low < high) {
            return Err(Error::InvalidConfig(format!(
                "analysis.rayleigh_frequencies must be (0, 0) or ascending positive, got ({low}, {high})"
            )));
        }
        positive("analysis.collapse_drift_ratio", self.collapse_drift_ratio)
    }
}

/// Curve aggregation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Response quantity on the curve's abscissa
    pub metric: ResponseMetric,
    /// Largest response value of the evaluation grid
    pub grid_max: f64,
    /// Number of grid points
    pub grid_points: usize,
    /// Quantile levels in `[0, 1]`
    pub quantiles: Vec<f64>,
    /// Whether collapsed runs contribute curve points
    pub include_collapsed: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            metric: ResponseMetric::MaxStoryDrift,
            grid_max: 0.1,
            grid_points: 100,
            quantiles: vec![0.16, 0.5, 0.84],
            include_collapsed: false,
        }
    }
}

impl AggregationConfig {
    /// Linear response grid from `grid_max / grid_points` to `grid_max`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn grid(&self) -> Vec<f64> {
        let step = self.grid_max / self.grid_points as f64;
        (1..=self.grid_points).map(|i| step * i as f64).collect()
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        positive("aggregation.grid_max", self.grid_max)?;
        if self.grid_points == 0 {
            return Err(Error::InvalidConfig(
                "aggregation.grid_points must be at least 1".to_string(),
            ));
        }
        if self.quantiles.is_empty() {
            return Err(Error::InvalidConfig(
                "aggregation.quantiles must not be empty".to_string(),
            ));
        }
        if let Some(q) = self.quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
            return Err(Error::InvalidConfig(format!(
                "aggregation.quantiles must lie in [0, 1], got {q}"
            )));
        }
        Ok(())
    }
}

/// Complete IDA configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdaConfig {
    /// Intensity measure used to scale records
    pub measure: IntensityMeasure,
    /// Damping ratio of the intensity measure's oscillator
    pub measure_damping: f64,
    /// Scheduling parameters
    pub htf: HtfConfig,
    /// Oracle parameters
    pub analysis: AnalysisSettings,
    /// Aggregation parameters
    pub aggregation: AggregationConfig,
}

impl Default for IdaConfig {
    fn default() -> Self {
        Self {
            measure: IntensityMeasure::Pga,
            measure_damping: 0.05,
            htf: HtfConfig::default(),
            analysis: AnalysisSettings::default(),
            aggregation: AggregationConfig::default(),
        }
    }
}

impl IdaConfig {
    /// Create a configuration builder starting from defaults.
    #[must_use]
    pub fn builder() -> IdaConfigBuilder {
        IdaConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !(self.measure_damping > 0.0 && self.measure_damping < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "measure_damping must lie in (0, 1), got {}",
                self.measure_damping
            )));
        }
        self.htf.validate()?;
        self.analysis.validate()?;
        self.aggregation.validate()
    }
}

/// Builder for `IdaConfig`.
#[derive(Debug, Default)]
pub struct IdaConfigBuilder {
    config: IdaConfig,
}

impl IdaConfigBuilder {
    /// Set the intensity measure.
    #[must_use]
    pub const fn measure(mut self, measure: IntensityMeasure) -> Self {
        self.config.measure = measure;
        self
    }

    /// Set the intensity measure's damping ratio.
    #[must_use]
    pub const fn measure_damping(mut self, damping: f64) -> Self {
        self.config.measure_damping = damping;
        self
    }

    /// Set the scheduling parameters.
    #[must_use]
    pub fn htf(mut self, htf: HtfConfig) -> Self {
        self.config.htf = htf;
        self
    }

    /// Set the oracle parameters.
    #[must_use]
    pub fn analysis(mut self, analysis: AnalysisSettings) -> Self {
        self.config.analysis = analysis;
        self
    }

    /// Set the aggregation parameters.
    #[must_use]
    pub fn aggregation(mut self, aggregation: AggregationConfig) -> Self {
        self.config.aggregation = aggregation;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if any section is out of range.
    pub fn build(self) -> Result<IdaConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn positive(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidConfig(format!(
            "{field} must be finite and > 0, got {value}"
        )))
    }
}
