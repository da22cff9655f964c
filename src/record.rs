//! Ground-motion records
//!
//! A record is loaded once and never mutated: one or two horizontal
//! acceleration components sampled at a fixed time step.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Maximum number of horizontal components in a record.
pub const MAX_COMPONENTS: usize = 2;

/// A ground-motion record (one or two horizontal acceleration components).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundMotion {
    id: u32,
    components: Vec<Vec<f64>>,
    dt: f64,
}

impl GroundMotion {
    /// Create a validated record.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - there are zero or more than two components
    /// - any component is empty or holds a non-finite sample
    /// - `dt` is not finite and strictly positive
    pub fn new(id: u32, components: Vec<Vec<f64>>, dt: f64) -> Result<Self> {
        if components.is_empty() || components.len() > MAX_COMPONENTS {
            return Err(Error::InvalidInput(format!(
                "Record {id}: expected 1 or {MAX_COMPONENTS} components, got {}",
                components.len()
            )));
        }
        validate_time_step(dt)?;
        for component in &components {
            validate_signal(component)?;
        }

        Ok(Self { id, components, dt })
    }

    /// Create a single-direction record.
    ///
    /// # Errors
    ///
    /// See [`GroundMotion::new`].
    pub fn single(id: u32, acc: Vec<f64>, dt: f64) -> Result<Self> {
        Self::new(id, vec![acc], dt)
    }

    /// Create a bidirectional record from its two horizontal components.
    ///
    /// # Errors
    ///
    /// See [`GroundMotion::new`].
    pub fn pair(id: u32, acc_x: Vec<f64>, acc_y: Vec<f64>, dt: f64) -> Result<Self> {
        Self::new(id, vec![acc_x, acc_y], dt)
    }

    /// Record identifier.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Acceleration components, in direction order.
    #[must_use]
    pub fn components(&self) -> &[Vec<f64>] {
        &self.components
    }

    /// Time step in seconds.
    #[must_use]
    pub const fn dt(&self) -> f64 {
        self.dt
    }

    /// Whether this record is scaled as an X/Y pair.
    #[must_use]
    pub fn is_bidirectional(&self) -> bool {
        self.components.len() == MAX_COMPONENTS
    }

    /// Total duration in seconds (longest component).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f64 {
        let samples = self.components.iter().map(Vec::len).max().unwrap_or(0);
        samples as f64 * self.dt
    }
}

pub(crate) fn validate_time_step(dt: f64) -> Result<()> {
    if dt.is_finite() && dt > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidTimeStep(dt))
    }
}

pub(crate) fn validate_signal(acc: &[f64]) -> Result<()> {
    if acc.is_empty() {
        return Err(Error::EmptySignal);
    }
    if let Some(index) = acc.iter().position(|a| !a.is_finite()) {
        return Err(Error::NonFiniteSample { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_uses_longest_component() {
        let record = GroundMotion::pair(3, vec![0.0; 100], vec![0.0; 150], 0.02).unwrap();
        assert!((record.duration() - 3.0).abs() < 1e-12);
        assert!(record.is_bidirectional());
        assert_eq!(record.id(), 3);
    }

    #[test]
    fn test_rejects_three_components() {
        let err = GroundMotion::new(1, vec![vec![1.0]; 3], 0.01).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_bad_samples() {
        assert!(matches!(
            GroundMotion::single(1, vec![], 0.01),
            Err(Error::EmptySignal)
        ));
        assert!(matches!(
            GroundMotion::single(1, vec![0.1, f64::NAN], 0.01),
            Err(Error::NonFiniteSample { index: 1 })
        ));
        assert!(matches!(
            GroundMotion::single(1, vec![0.1], 0.0),
            Err(Error::InvalidTimeStep(_))
        ));
    }
}
