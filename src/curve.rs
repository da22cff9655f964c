//! IDA curve aggregation
//!
//! Turns ragged per-record run histories into comparable curves:
//!
//! 1. each record's runs are sorted by intensity;
//! 2. a monotone piecewise-linear interpolant maps the chosen response
//!    metric to intensity, anchored at the origin and held flat beyond the
//!    largest tested response;
//! 3. every interpolant is evaluated on a common response grid;
//! 4. quantiles across records are taken at each grid point.
//!
//! Quantiles use linear interpolation between order statistics, so curves
//! for increasing levels never cross.

use crate::config::AggregationConfig;
use crate::run::{DirectionalResponse, RunResult};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Scalar response quantity plotted against intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMetric {
    /// Largest peak inter-story drift ratio
    #[default]
    MaxStoryDrift,
    /// Peak roof displacement
    TopDisplacement,
    /// Largest peak floor acceleration
    MaxFloorAcceleration,
    /// Largest residual drift ratio
    MaxResidualDrift,
}

impl ResponseMetric {
    /// Extract this metric from one direction's responses.
    #[must_use]
    pub fn extract(self, response: &DirectionalResponse) -> f64 {
        match self {
            Self::MaxStoryDrift => response.max_story_drift(),
            Self::TopDisplacement => response.top_displacement.abs(),
            Self::MaxFloorAcceleration => response.max_floor_acceleration(),
            Self::MaxResidualDrift => response.max_residual_drift(),
        }
    }
}

/// One record's sorted samples and its response-to-intensity interpolant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordCurve {
    record_id: u32,
    intensities: Vec<f64>,
    responses: Vec<f64>,
    knot_responses: Vec<f64>,
    knot_intensities: Vec<f64>,
    evaluated: Vec<f64>,
}

impl RecordCurve {
    /// Build a curve from one record's runs.
    ///
    /// Runs without a response in `direction` are skipped, as are collapsed
    /// runs unless `include_collapsed`. Returns `None` when no run yields a
    /// positive response.
    #[must_use]
    pub fn from_runs(
        runs: &[RunResult],
        metric: ResponseMetric,
        direction: usize,
        include_collapsed: bool,
    ) -> Option<Self> {
        let record_id = runs.first()?.record_id();
        let mut samples: Vec<(f64, f64)> = runs
            .iter()
            .filter(|run| include_collapsed || !run.status().is_collapse())
            .filter_map(|run| {
                let response = run.response()?.direction(direction)?;
                let value = metric.extract(response);
                value.is_finite().then_some((run.intensity(), value))
            })
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut knot_responses = vec![0.0];
        let mut knot_intensities = vec![0.0];
        for &(intensity, response) in &samples {
            if knot_responses.last().is_some_and(|&last| response > last) {
                knot_responses.push(response);
                knot_intensities.push(intensity);
            }
        }
        if knot_responses.len() < 2 {
            return None;
        }

        let (intensities, responses) = samples.into_iter().unzip();
        Some(Self {
            record_id,
            intensities,
            responses,
            knot_responses,
            knot_intensities,
            evaluated: Vec::new(),
        })
    }

    /// Record identifier.
    #[must_use]
    pub const fn record_id(&self) -> u32 {
        self.record_id
    }

    /// Tested intensities, ascending.
    #[must_use]
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Responses paired with [`Self::intensities`].
    #[must_use]
    pub fn responses(&self) -> &[f64] {
        &self.responses
    }

    /// Largest response covered by the interpolant.
    #[must_use]
    pub fn max_response(&self) -> f64 {
        self.knot_responses.last().copied().unwrap_or(0.0)
    }

    /// Interpolant values on the aggregation grid.
    #[must_use]
    pub fn evaluated(&self) -> &[f64] {
        &self.evaluated
    }

    /// Intensity reached at `response`.
    ///
    /// Linear between knots. Beyond the largest tested response the curve
    /// holds the intensity at which that response occurred. A higher tested
    /// intensity with a smaller response lies below the envelope and does
    /// not lift the flatline.
    #[must_use]
    pub fn intensity_at(&self, response: f64) -> f64 {
        let n = self.knot_responses.len();
        let (Some(&first_r), Some(&last_r)) =
            (self.knot_responses.first(), self.knot_responses.last())
        else {
            return 0.0;
        };
        if response <= first_r {
            return self.knot_intensities[0];
        }
        if response >= last_r {
            return self.knot_intensities[n - 1];
        }
        let hi = self.knot_responses.partition_point(|&r| r <= response);
        let lo = hi - 1;
        let (r0, r1) = (self.knot_responses[lo], self.knot_responses[hi]);
        let (i0, i1) = (self.knot_intensities[lo], self.knot_intensities[hi]);
        i0 + (i1 - i0) * (response - r0) / (r1 - r0)
    }
}

/// One point of a quantile curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantilePoint {
    /// Grid response value
    pub response: f64,
    /// Quantile of the records' intensities at `response`
    pub intensity: f64,
    /// Records contributing at this grid point
    pub contributors: usize,
}

/// Cross-record quantile curve at one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileCurve {
    /// Quantile level in `[0, 1]`
    pub level: f64,
    /// Points for every grid value with at least one contributor
    pub points: Vec<QuantilePoint>,
}

/// Aggregation result for one response direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCurves {
    /// Response metric on the abscissa
    pub metric: ResponseMetric,
    /// Response direction (0 = X)
    pub direction: usize,
    /// Common response grid
    pub grid: Vec<f64>,
    /// Usable per-record curves, in input order
    pub records: Vec<RecordCurve>,
    /// One curve per requested quantile level
    pub quantiles: Vec<QuantileCurve>,
}

impl AggregatedCurves {
    /// Curve for a quantile level, if it was requested.
    #[must_use]
    pub fn quantile(&self, level: f64) -> Option<&QuantileCurve> {
        self.quantiles
            .iter()
            .find(|curve| (curve.level - level).abs() < 1e-12)
    }
}

/// Builds [`AggregatedCurves`] from run histories.
#[derive(Debug, Clone)]
pub struct CurveAggregator {
    config: AggregationConfig,
}

impl CurveAggregator {
    /// Create an aggregator from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is out of range.
    pub fn new(config: AggregationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Aggregation parameters.
    #[must_use]
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate one direction over all records' histories.
    ///
    /// Records without a usable curve are left out; grid points without any
    /// contributor are omitted from the quantile curves.
    pub fn aggregate<'a, I>(&self, histories: I, direction: usize) -> AggregatedCurves
    where
        I: IntoIterator<Item = &'a [RunResult]>,
    {
        let grid = self.config.grid();
        let records: Vec<RecordCurve> = histories
            .into_iter()
            .filter_map(|runs| {
                let mut curve = RecordCurve::from_runs(
                    runs,
                    self.config.metric,
                    direction,
                    self.config.include_collapsed,
                )?;
                curve.evaluated = grid.iter().map(|&r| curve.intensity_at(r)).collect();
                Some(curve)
            })
            .collect();

        let mut quantiles: Vec<QuantileCurve> = self
            .config
            .quantiles
            .iter()
            .map(|&level| QuantileCurve {
                level,
                points: Vec::with_capacity(grid.len()),
            })
            .collect();

        let mut column = Vec::with_capacity(records.len());
        for (g, &response) in grid.iter().enumerate() {
            column.clear();
            column.extend(
                records
                    .iter()
                    .filter_map(|curve| curve.evaluated.get(g).copied())
                    .filter(|v| v.is_finite()),
            );
            if column.is_empty() {
                continue;
            }
            column.sort_by(f64::total_cmp);
            for curve in &mut quantiles {
                curve.points.push(QuantilePoint {
                    response,
                    intensity: quantile_sorted(&column, curve.level),
                    contributors: column.len(),
                });
            }
        }

        tracing::debug!(
            direction,
            records = records.len(),
            grid_points = grid.len(),
            "aggregated IDA curves"
        );

        AggregatedCurves {
            metric: self.config.metric,
            direction,
            grid,
            records,
            quantiles,
        }
    }

    /// Aggregate directions `0..directions`.
    pub fn aggregate_directions(
        &self,
        histories: &[&[RunResult]],
        directions: usize,
    ) -> Vec<AggregatedCurves> {
        (0..directions)
            .map(|direction| self.aggregate(histories.iter().copied(), direction))
            .collect()
    }
}

/// Linearly interpolated quantile of a non-empty ascending slice.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn quantile_sorted(sorted: &[f64], level: f64) -> f64 {
    let position = level * (sorted.len() - 1) as f64;
    let lo = position.floor() as usize;
    let hi = position.ceil() as usize;
    let frac = position - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Quantile of unsorted values.
///
/// # Errors
///
/// Returns error if `values` is empty, holds non-finite values, or `level`
/// lies outside `[0, 1]`.
pub fn quantile(values: &[f64], level: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(Error::InvalidInput(
            "quantile of an empty sample".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&level) {
        return Err(Error::InvalidInput(format!(
            "quantile level must lie in [0, 1], got {level}"
        )));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInput(
            "quantile sample holds non-finite values".to_string(),
        ));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Ok(quantile_sorted(&sorted, level))
}
