//! Per-record schedule state

use crate::config::NonConvergencePolicy;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Stepping upwards with a linearly growing increment until collapse.
    Hunt,
    /// Closing in on the first collapse intensity from below.
    Trace,
    /// Bisecting the widest gap of the explored range.
    Fill,
    /// No further runs.
    Done,
}

/// Why a schedule reached [`Phase::Done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Budget spent while filling; collapse is bracketed.
    Bracketed,
    /// Budget spent while hunting; no collapse was found.
    CollapseNotFound,
    /// Budget spent while tracing; the bracket was never re-confirmed.
    StillTracing,
    /// Filling stopped early because no eligible gap remained.
    FillExhausted,
}

impl Termination {
    /// Active phase the schedule was in when it stopped.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::CollapseNotFound => Phase::Hunt,
            Self::StillTracing => Phase::Trace,
            Self::Bracketed | Self::FillExhausted => Phase::Fill,
        }
    }

    /// Whether a collapse intensity is known.
    #[must_use]
    pub const fn has_collapse(self) -> bool {
        !matches!(self, Self::CollapseNotFound)
    }
}

/// Non-fatal conditions attached to a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleWarning {
    /// Collapse occurred on the first or second run.
    CoarseIncrement {
        /// Run that collapsed
        run: usize,
    },
    /// Budget exhausted while hunting.
    CollapseNotFound {
        /// Runs performed
        runs: usize,
    },
    /// Budget exhausted while tracing.
    StillTracing {
        /// Runs performed
        runs: usize,
    },
    /// No gap left to fill before the budget was spent.
    FillExhausted {
        /// Runs performed
        runs: usize,
    },
    /// A non-converged run was steered by the configured policy.
    NonConvergenceAbsorbed {
        /// Run that did not converge
        run: usize,
        /// Tested intensity
        intensity: f64,
        /// Policy applied
        policy: NonConvergencePolicy,
    },
}

impl fmt::Display for ScheduleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CoarseIncrement { run } => write!(
                f,
                "collapse at run {run}: increment too coarse, reduce first intensity or increment step"
            ),
            Self::CollapseNotFound { runs } => write!(
                f,
                "collapse not achieved after {runs} runs: increase increment or run budget"
            ),
            Self::StillTracing { runs } => write!(
                f,
                "still tracing after {runs} runs: reduce increment or increase run budget"
            ),
            Self::FillExhausted { runs } => {
                write!(f, "no gap left to fill after {runs} runs")
            }
            Self::NonConvergenceAbsorbed {
                run,
                intensity,
                policy,
            } => write!(
                f,
                "run {run} at intensity {intensity} did not converge, applied {policy:?}"
            ),
        }
    }
}

/// Mutable Hunt/Trace/Fill state of one record.
///
/// `intensities` holds every tested intensity in run order except the one
/// that ended hunting, which is kept in `first_collapse_intensity` and only
/// re-enters through the fill pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    phase: Phase,
    max_runs: usize,
    runs: usize,
    intensities: Vec<f64>,
    hunt_collapse_run: Option<usize>,
    first_collapse_intensity: Option<f64>,
    trace_collapse_intensity: Option<f64>,
    fill_pool: Vec<f64>,
    termination: Option<Termination>,
    warnings: Vec<ScheduleWarning>,
}

impl ScheduleState {
    /// Fresh state in [`Phase::Hunt`].
    #[must_use]
    pub fn new(max_runs: usize) -> Self {
        Self {
            phase: Phase::Hunt,
            max_runs,
            runs: 0,
            intensities: Vec::with_capacity(max_runs),
            hunt_collapse_run: None,
            first_collapse_intensity: None,
            trace_collapse_intensity: None,
            fill_pool: Vec::new(),
            termination: None,
            warnings: Vec::new(),
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Run budget.
    #[must_use]
    pub const fn max_runs(&self) -> usize {
        self.max_runs
    }

    /// Oracle calls performed so far.
    #[must_use]
    pub const fn runs(&self) -> usize {
        self.runs
    }

    /// Tested intensities in run order (hunt collapse slot cleared).
    #[must_use]
    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    /// Run index at which hunting first found collapse.
    #[must_use]
    pub const fn hunt_collapse_run(&self) -> Option<usize> {
        self.hunt_collapse_run
    }

    /// Intensity at which hunting first found collapse.
    #[must_use]
    pub const fn first_collapse_intensity(&self) -> Option<f64> {
        self.first_collapse_intensity
    }

    /// Intensity at which tracing found collapse.
    #[must_use]
    pub const fn trace_collapse_intensity(&self) -> Option<f64> {
        self.trace_collapse_intensity
    }

    /// Sorted fill pool.
    #[must_use]
    pub fn fill_pool(&self) -> &[f64] {
        &self.fill_pool
    }

    /// Termination reason once [`Phase::Done`].
    #[must_use]
    pub const fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Warnings raised so far.
    #[must_use]
    pub fn warnings(&self) -> &[ScheduleWarning] {
        &self.warnings
    }

    /// Whether the schedule is finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    pub(super) fn last_intensity(&self) -> Option<f64> {
        self.intensities.last().copied()
    }

    pub(super) fn record_run(&mut self) {
        self.runs += 1;
    }

    pub(super) fn accept(&mut self, intensity: f64) {
        self.intensities.push(intensity);
    }

    pub(super) fn enter_trace(&mut self, run: usize, intensity: f64) {
        self.hunt_collapse_run = Some(run);
        self.first_collapse_intensity = Some(intensity);
        self.phase = Phase::Trace;
        if run <= 2 {
            self.warnings.push(ScheduleWarning::CoarseIncrement { run });
        }
    }

    pub(super) fn enter_fill(&mut self, intensity: f64) {
        self.trace_collapse_intensity = Some(intensity);
        self.intensities.push(intensity);
        self.fill_pool = self.intensities.clone();
        self.fill_pool.extend(self.first_collapse_intensity);
        self.fill_pool.sort_by(f64::total_cmp);
        self.phase = Phase::Fill;
    }

    pub(super) fn add_fill(&mut self, intensity: f64) {
        self.intensities.push(intensity);
        let at = self.fill_pool.partition_point(|&v| v < intensity);
        self.fill_pool.insert(at, intensity);
    }

    pub(crate) fn push_warning(&mut self, warning: ScheduleWarning) {
        self.warnings.push(warning);
    }

    pub(super) fn finish(&mut self, termination: Termination) {
        let runs = self.runs;
        match termination {
            Termination::CollapseNotFound => {
                self.warnings.push(ScheduleWarning::CollapseNotFound { runs });
            }
            Termination::StillTracing => {
                self.warnings.push(ScheduleWarning::StillTracing { runs });
            }
            Termination::FillExhausted => {
                self.warnings.push(ScheduleWarning::FillExhausted { runs });
            }
            Termination::Bracketed => {}
        }
        self.termination = Some(termination);
        self.phase = Phase::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_hunting() {
        let state = ScheduleState::new(8);
        assert_eq!(state.phase(), Phase::Hunt);
        assert_eq!(state.runs(), 0);
        assert!(state.intensities().is_empty());
        assert!(!state.is_done());
    }

    #[test]
    fn test_fill_pool_reintroduces_first_collapse() {
        let mut state = ScheduleState::new(8);
        state.accept(0.1);
        state.accept(0.2);
        state.enter_trace(3, 0.4);
        state.accept(0.25);
        state.enter_fill(0.31);
        assert_eq!(state.fill_pool(), &[0.1, 0.2, 0.25, 0.31, 0.4]);
        assert_eq!(state.intensities(), &[0.1, 0.2, 0.25, 0.31]);

        state.add_fill(0.15);
        assert_eq!(state.fill_pool(), &[0.1, 0.15, 0.2, 0.25, 0.31, 0.4]);
    }

    #[test]
    fn test_termination_phase() {
        assert_eq!(Termination::CollapseNotFound.phase(), Phase::Hunt);
        assert_eq!(Termination::StillTracing.phase(), Phase::Trace);
        assert!(!Termination::CollapseNotFound.has_collapse());
        assert!(Termination::Bracketed.has_collapse());
    }
}
