//! Run Result - one structural analysis at one tested intensity

use crate::schedule::Phase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tri-state outcome of a structural analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The solver could not converge.
    NonConverged,
    /// Converged; the structure did not collapse.
    Survived,
    /// Converged; the collapse drift threshold was exceeded.
    Collapsed,
}

impl RunStatus {
    /// Whether the solver converged.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        !matches!(self, Self::NonConverged)
    }

    /// Whether the analysis reported collapse.
    #[must_use]
    pub const fn is_collapse(self) -> bool {
        matches!(self, Self::Collapsed)
    }
}

/// Peak responses in one horizontal direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionalResponse {
    /// Peak absolute acceleration per floor level
    pub floor_accelerations: Vec<f64>,
    /// Peak inter-story drift ratio per story
    pub story_drifts: Vec<f64>,
    /// Peak absolute roof displacement
    pub top_displacement: f64,
    /// Residual drift ratio per story after shaking
    pub residual_drifts: Vec<f64>,
}

impl DirectionalResponse {
    /// Largest peak story drift.
    #[must_use]
    pub fn max_story_drift(&self) -> f64 {
        peak(&self.story_drifts)
    }

    /// Largest peak floor acceleration.
    #[must_use]
    pub fn max_floor_acceleration(&self) -> f64 {
        peak(&self.floor_accelerations)
    }

    /// Largest residual story drift.
    #[must_use]
    pub fn max_residual_drift(&self) -> f64 {
        peak(&self.residual_drifts)
    }
}

fn peak(values: &[f64]) -> f64 {
    values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Responses of a converged analysis, one entry per loaded direction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseBundle {
    /// Per-direction responses (X first)
    pub directions: Vec<DirectionalResponse>,
}

impl ResponseBundle {
    /// Bundle with the given per-direction responses.
    #[must_use]
    pub const fn new(directions: Vec<DirectionalResponse>) -> Self {
        Self { directions }
    }

    /// Bundle for a single-direction analysis.
    #[must_use]
    pub fn single(response: DirectionalResponse) -> Self {
        Self::new(vec![response])
    }

    /// Response in `direction`, if present.
    #[must_use]
    pub fn direction(&self, direction: usize) -> Option<&DirectionalResponse> {
        self.directions.get(direction)
    }
}

/// Result of one oracle invocation.
///
/// Created once per run and never mutated afterwards; the schedule that
/// produced it owns it until the history is handed to aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    record_id: u32,
    run_index: usize,
    intensity: f64,
    scale_factor: f64,
    phase: Phase,
    status: RunStatus,
    response: Option<ResponseBundle>,
    completed_at: DateTime<Utc>,
}

impl RunResult {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(
        record_id: u32,
        run_index: usize,
        intensity: f64,
        status: RunStatus,
    ) -> RunResultBuilder {
        RunResultBuilder::new(record_id, run_index, intensity, status)
    }

    /// Record this run belongs to.
    #[must_use]
    pub const fn record_id(&self) -> u32 {
        self.record_id
    }

    /// 1-based run index within the record's schedule.
    #[must_use]
    pub const fn run_index(&self) -> usize {
        self.run_index
    }

    /// Tested absolute intensity.
    #[must_use]
    pub const fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Scale factor applied to the raw record (`intensity / reference`).
    #[must_use]
    pub const fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Scheduler phase that requested this run.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Analysis outcome.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Peak responses, present when the oracle produced them.
    #[must_use]
    pub const fn response(&self) -> Option<&ResponseBundle> {
        self.response.as_ref()
    }

    /// Wall-clock completion time.
    #[must_use]
    pub const fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

/// Builder for `RunResult`.
#[derive(Debug)]
pub struct RunResultBuilder {
    record_id: u32,
    run_index: usize,
    intensity: f64,
    scale_factor: f64,
    phase: Phase,
    status: RunStatus,
    response: Option<ResponseBundle>,
    completed_at: DateTime<Utc>,
}

impl RunResultBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(record_id: u32, run_index: usize, intensity: f64, status: RunStatus) -> Self {
        Self {
            record_id,
            run_index,
            intensity,
            scale_factor: 1.0,
            phase: Phase::Hunt,
            status,
            response: None,
            completed_at: Utc::now(),
        }
    }

    /// Set the applied scale factor.
    #[must_use]
    pub const fn scale_factor(mut self, scale_factor: f64) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Set the requesting phase.
    #[must_use]
    pub const fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    /// Attach the response bundle.
    #[must_use]
    pub fn response(mut self, response: ResponseBundle) -> Self {
        self.response = Some(response);
        self
    }

    /// Set a custom completion timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn completed_at(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = completed_at;
        self
    }

    /// Build the `RunResult`.
    #[must_use]
    pub fn build(self) -> RunResult {
        RunResult {
            record_id: self.record_id,
            run_index: self.run_index,
            intensity: self.intensity,
            scale_factor: self.scale_factor,
            phase: self.phase,
            status: self.status,
            response: self.response,
            completed_at: self.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(RunStatus::Collapsed.is_collapse());
        assert!(RunStatus::Collapsed.is_converged());
        assert!(!RunStatus::NonConverged.is_converged());
        assert!(!RunStatus::Survived.is_collapse());
    }

    #[test]
    fn test_directional_peaks_use_absolute_values() {
        let response = DirectionalResponse {
            floor_accelerations: vec![0.2, -0.5],
            story_drifts: vec![0.01, 0.03, -0.02],
            top_displacement: 0.12,
            residual_drifts: vec![-0.004, 0.001],
        };
        assert!((response.max_story_drift() - 0.03).abs() < f64::EPSILON);
        assert!((response.max_floor_acceleration() - 0.5).abs() < f64::EPSILON);
        assert!((response.max_residual_drift() - 0.004).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_defaults() {
        let run = RunResult::builder(2, 1, 0.3, RunStatus::Survived).build();
        assert_eq!(run.record_id(), 2);
        assert_eq!(run.phase(), Phase::Hunt);
        assert!(run.response().is_none());
        assert!((run.scale_factor() - 1.0).abs() < f64::EPSILON);
    }
}
