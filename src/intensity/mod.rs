//! Intensity measures (IM)
//!
//! Pure functions turning a raw acceleration series into a scalar seismic
//! intensity, in the same units as the input (typically g).
//!
//! ## Spectral acceleration
//!
//! The single-degree-of-freedom pseudo-acceleration transfer function
//!
//! ```text
//! H(ω) = ωₙ² / (ωₙ² − ω² + 2iζωωₙ)
//! ```
//!
//! is applied to the Fourier transform of the zero-padded (power-of-two)
//! signal. The peak absolute real part of the inverse transform is the
//! spectral acceleration. Several periods can be evaluated against one
//! forward transform.
//!
//! ## Example
//!
//! ```rust
//! use ida_htf::intensity::{pga, spectral_acceleration_at};
//!
//! let acc = vec![0.0, 0.1, -0.3, 0.2, 0.05, -0.1];
//! assert!((pga(&acc)? - 0.3).abs() < 1e-12);
//!
//! // A zero period reproduces the PGA.
//! let sa0 = spectral_acceleration_at(0.0, &acc, 0.01, 0.05)?;
//! assert!((sa0 - 0.3).abs() < 1e-6);
//! # Ok::<(), ida_htf::Error>(())
//! ```

mod fft;

use crate::record::{validate_signal, validate_time_step, GroundMotion};
use crate::{Error, Result};
use fft::Complex;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Period substituted for `T = 0` so that `ωₙ` stays finite.
pub const NEGLIGIBLE_PERIOD: f64 = 1e-8;

/// Default lower/upper period multipliers for the averaged measure.
pub const DEFAULT_AVG_BOUNDS: (f64, f64) = (0.2, 3.0);

/// Default number of periods sampled by the averaged measure.
pub const DEFAULT_AVG_POINTS: usize = 10;

/// Spacing of the periods sampled by [`period_averaged_spectral_acceleration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodSpacing {
    /// Evenly spaced periods
    #[default]
    Linear,
    /// Evenly spaced in log-period (requires strictly positive bounds)
    Logarithmic,
}

impl PeriodSpacing {
    #[allow(clippy::cast_precision_loss)]
    fn sample(self, lower: f64, upper: f64, n_points: usize) -> Vec<f64> {
        if n_points == 1 {
            return vec![lower];
        }
        let last = (n_points - 1) as f64;
        match self {
            Self::Linear => (0..n_points)
                .map(|i| lower + (upper - lower) * i as f64 / last)
                .collect(),
            Self::Logarithmic => {
                let (a, b) = (lower.ln(), upper.ln());
                (0..n_points)
                    .map(|i| (a + (b - a) * i as f64 / last).exp())
                    .collect()
            }
        }
    }
}

/// Scalar intensity measure used to scale records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntensityMeasure {
    /// Peak ground acceleration
    Pga,
    /// Spectral acceleration at a single period
    Sa {
        /// Structural period in seconds
        period: f64,
    },
    /// Geometric mean of spectral accelerations over a period range
    SaAvg {
        /// Centre period in seconds
        period: f64,
        /// Lower bound multiplier of the centre period
        lower: f64,
        /// Upper bound multiplier of the centre period
        upper: f64,
        /// Number of sampled periods
        n_points: usize,
        /// Period spacing
        #[serde(default)]
        spacing: PeriodSpacing,
    },
}

impl IntensityMeasure {
    /// Averaged spectral acceleration with the default range `[0.2T, 3.0T]`
    /// sampled at 10 linearly spaced periods.
    #[must_use]
    pub const fn sa_avg(period: f64) -> Self {
        Self::SaAvg {
            period,
            lower: DEFAULT_AVG_BOUNDS.0,
            upper: DEFAULT_AVG_BOUNDS.1,
            n_points: DEFAULT_AVG_POINTS,
            spacing: PeriodSpacing::Linear,
        }
    }

    /// Evaluate the measure on a single component.
    ///
    /// # Errors
    ///
    /// Returns a domain error for malformed signals, periods or damping.
    pub fn evaluate_component(&self, acc: &[f64], dt: f64, damping: f64) -> Result<f64> {
        match *self {
            Self::Pga => pga(acc),
            Self::Sa { period } => spectral_acceleration_at(period, acc, dt, damping),
            Self::SaAvg {
                period,
                lower,
                upper,
                n_points,
                spacing,
            } => period_averaged_spectral_acceleration(
                period,
                acc,
                dt,
                damping,
                (lower, upper),
                n_points,
                spacing,
            ),
        }
    }

    /// Evaluate the measure on a record.
    ///
    /// Bidirectional records are reduced to one scalar with
    /// [`combine_components`], so both directions share a scale factor.
    ///
    /// # Errors
    ///
    /// Returns a domain error if any component cannot be evaluated.
    pub fn evaluate(&self, record: &GroundMotion, damping: f64) -> Result<f64> {
        let values = record
            .components()
            .iter()
            .map(|acc| self.evaluate_component(acc, record.dt(), damping))
            .collect::<Result<Vec<_>>>()?;

        match values.as_slice() {
            [single] => Ok(*single),
            [x, y] => Ok(combine_components(*x, *y)),
            _ => Err(Error::InvalidInput(format!(
                "Record {}: unsupported component count {}",
                record.id(),
                values.len()
            ))),
        }
    }
}

/// Peak absolute acceleration of the raw series.
///
/// # Errors
///
/// Returns error if the signal is empty or holds non-finite samples.
pub fn pga(acc: &[f64]) -> Result<f64> {
    validate_signal(acc)?;
    Ok(acc.iter().fold(0.0_f64, |peak, a| peak.max(a.abs())))
}

/// Spectral acceleration at each of `periods` (vectorized).
///
/// A period of zero is replaced by [`NEGLIGIBLE_PERIOD`], so its result
/// equals the PGA to within round-off.
///
/// # Errors
///
/// Returns error if:
/// - the signal is empty or non-finite, or `dt <= 0`
/// - `periods` is empty or holds a negative / non-finite period
/// - `damping` is outside `(0, 1)`
#[allow(clippy::cast_precision_loss)]
pub fn spectral_acceleration(
    periods: &[f64],
    acc: &[f64],
    dt: f64,
    damping: f64,
) -> Result<Vec<f64>> {
    validate_signal(acc)?;
    validate_time_step(dt)?;
    validate_damping(damping)?;
    if periods.is_empty() {
        return Err(Error::InvalidInput(
            "at least one period is required".to_string(),
        ));
    }
    for &period in periods {
        validate_period(period)?;
    }

    let n = fft::padded_len(acc.len());
    let mut spectrum = vec![Complex::ZERO; n];
    for (slot, &a) in spectrum.iter_mut().zip(acc) {
        *slot = Complex::new(a, 0.0);
    }
    fft::transform(&mut spectrum, false);

    let df = 1.0 / (n as f64 * dt);
    let omegas: Vec<f64> = (0..n)
        .map(|k| 2.0 * PI * fft::signed_bin(k, n) * df)
        .collect();

    let mut response = vec![Complex::ZERO; n];
    let results: Vec<f64> = periods
        .iter()
        .map(|&period| {
            let omega_n = 2.0 * PI / effective_period(period);
            let wn2 = omega_n * omega_n;
            for ((out, &x), &w) in response.iter_mut().zip(&spectrum).zip(&omegas) {
                let denom = Complex::new(wn2 - w * w, 2.0 * damping * w * omega_n);
                *out = x * denom.recip_scaled(wn2);
            }
            fft::transform(&mut response, true);
            response.iter().fold(0.0_f64, |peak, c| peak.max(c.re.abs()))
        })
        .collect();

    Ok(results)
}

/// Spectral acceleration at a single period.
///
/// # Errors
///
/// See [`spectral_acceleration`].
pub fn spectral_acceleration_at(period: f64, acc: &[f64], dt: f64, damping: f64) -> Result<f64> {
    let values = spectral_acceleration(&[period], acc, dt, damping)?;
    values
        .first()
        .copied()
        .ok_or_else(|| Error::Other("spectral acceleration returned no value".to_string()))
}

/// Geometric mean of spectral accelerations sampled at `n_points` periods
/// between `bounds.0 × center_period` and `bounds.1 × center_period`.
///
/// # Errors
///
/// Returns error if the bounds are negative, reversed or non-finite, if
/// `n_points == 0`, if logarithmic spacing meets a zero period, or for any
/// error of [`spectral_acceleration`].
pub fn period_averaged_spectral_acceleration(
    center_period: f64,
    acc: &[f64],
    dt: f64,
    damping: f64,
    bounds: (f64, f64),
    n_points: usize,
    spacing: PeriodSpacing,
) -> Result<f64> {
    validate_period(center_period)?;
    let (lower, upper) = bounds;
    if !(lower.is_finite() && upper.is_finite()) || lower < 0.0 || upper < lower {
        return Err(Error::InvalidInput(format!(
            "period bounds must satisfy 0 <= lower <= upper, got ({lower}, {upper})"
        )));
    }
    if n_points == 0 {
        return Err(Error::InvalidInput(
            "averaged spectral acceleration needs at least one period".to_string(),
        ));
    }
    let (t_low, t_high) = (lower * center_period, upper * center_period);
    if spacing == PeriodSpacing::Logarithmic && t_low <= 0.0 {
        return Err(Error::InvalidInput(
            "logarithmic period spacing requires a strictly positive lower period".to_string(),
        ));
    }

    let periods = spacing.sample(t_low, t_high, n_points);
    let values = spectral_acceleration(&periods, acc, dt, damping)?;
    Ok(geometric_mean(&values))
}

/// Geometric mean of the X and Y intensities of a record pair.
#[must_use]
pub fn combine_components(value_x: f64, value_y: f64) -> f64 {
    (value_x * value_y).sqrt()
}

#[allow(clippy::cast_precision_loss)]
fn geometric_mean(values: &[f64]) -> f64 {
    if values.iter().any(|&v| v <= 0.0) {
        return 0.0;
    }
    let mean_log = values.iter().map(|v| v.ln()).sum::<f64>() / values.len() as f64;
    mean_log.exp()
}

fn effective_period(period: f64) -> f64 {
    if period == 0.0 {
        NEGLIGIBLE_PERIOD
    } else {
        period
    }
}

fn validate_period(period: f64) -> Result<()> {
    if period.is_finite() && period >= 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidPeriod(period))
    }
}

pub(crate) fn validate_damping(damping: f64) -> Result<()> {
    if damping.is_finite() && damping > 0.0 && damping < 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidDamping(damping))
    }
}
