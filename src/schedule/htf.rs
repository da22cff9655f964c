//! Hunt-Trace-Fill intensity scheduler

use super::state::{Phase, ScheduleState, ScheduleWarning, Termination};
use super::{InterruptedSchedule, RecordSchedule};
use crate::config::{AnalysisSettings, HtfConfig, NonConvergencePolicy};
use crate::oracle::{OracleRequest, StructuralOracle};
use crate::record::GroundMotion;
use crate::run::{RunResult, RunStatus};
use crate::{Error, Result};
use chrono::Utc;

/// Adaptive per-record intensity scheduler.
///
/// The scheduler itself is stateless apart from its configuration; every
/// record gets its own [`ScheduleState`], so one scheduler can serve many
/// worker threads.
#[derive(Debug, Clone)]
pub struct HtfScheduler {
    config: HtfConfig,
}

impl HtfScheduler {
    /// Create a scheduler from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is out of range.
    pub fn new(config: HtfConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Scheduling parameters.
    #[must_use]
    pub const fn config(&self) -> &HtfConfig {
        &self.config
    }

    /// Fresh state for one record.
    #[must_use]
    pub fn start(&self) -> ScheduleState {
        ScheduleState::new(self.config.max_runs)
    }

    /// Intensity of the next run, or `None` once the schedule is done.
    ///
    /// Moves the state to [`Phase::Done`] when the budget is spent or no
    /// fill gap remains.
    pub fn next_intensity(&self, state: &mut ScheduleState) -> Option<f64> {
        if state.is_done() {
            return None;
        }
        if state.runs() >= state.max_runs() {
            let termination = match state.phase() {
                Phase::Hunt => Termination::CollapseNotFound,
                Phase::Trace => Termination::StillTracing,
                Phase::Fill | Phase::Done => Termination::Bracketed,
            };
            state.finish(termination);
            return None;
        }

        match state.phase() {
            Phase::Hunt => Some(self.hunt_intensity(state)),
            Phase::Trace => Some(self.trace_intensity(state)),
            Phase::Fill => {
                let candidate = fill_intensity(state.fill_pool());
                if candidate.is_none() {
                    state.finish(Termination::FillExhausted);
                }
                candidate
            }
            Phase::Done => None,
        }
    }

    /// Feed back the outcome of the run at `intensity`.
    ///
    /// `collapsed` is the verdict after the non-convergence policy was
    /// applied. Ignored once the schedule is done.
    pub fn observe(&self, state: &mut ScheduleState, intensity: f64, collapsed: bool) {
        if state.is_done() {
            return;
        }
        state.record_run();
        let run = state.runs();

        match state.phase() {
            Phase::Hunt => {
                if collapsed {
                    state.enter_trace(run, intensity);
                    tracing::info!(run, intensity, "hunt found collapse, tracing");
                } else {
                    state.accept(intensity);
                }
            }
            Phase::Trace => {
                if collapsed {
                    state.enter_fill(intensity);
                    tracing::info!(run, intensity, "trace confirmed collapse, filling");
                } else {
                    state.accept(intensity);
                }
            }
            Phase::Fill => state.add_fill(intensity),
            Phase::Done => {}
        }
    }

    /// Schedule one record to completion against `oracle`.
    ///
    /// `reference` is the record's unscaled intensity; each run scales the
    /// record by `intensity / reference`. Runs completed before an error are
    /// dropped; use [`HtfScheduler::run_keeping_history`] to keep them.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `reference` is not finite and strictly positive
    /// - the oracle fails
    /// - a run does not converge under [`NonConvergencePolicy::Abort`]
    pub fn run<O: StructuralOracle + ?Sized>(
        &self,
        record: &GroundMotion,
        reference: f64,
        oracle: &O,
        settings: &AnalysisSettings,
    ) -> Result<RecordSchedule> {
        self.run_keeping_history(record, reference, oracle, settings)
            .map_err(|interrupted| interrupted.error)
    }

    /// Like [`HtfScheduler::run`], but an error comes back together with
    /// the runs completed before it.
    ///
    /// # Errors
    ///
    /// Returns an [`InterruptedSchedule`] under the same conditions as
    /// [`HtfScheduler::run`]. Its partial schedule has no termination.
    pub fn run_keeping_history<O: StructuralOracle + ?Sized>(
        &self,
        record: &GroundMotion,
        reference: f64,
        oracle: &O,
        settings: &AnalysisSettings,
    ) -> std::result::Result<RecordSchedule, Box<InterruptedSchedule>> {
        let record_id = record.id();
        let started_at = Utc::now();
        let mut state = self.start();
        let mut runs = Vec::with_capacity(self.config.max_runs);

        let interrupt = |error: Error, runs: Vec<RunResult>, state: ScheduleState| {
            tracing::warn!(
                record_id,
                completed = runs.len(),
                %error,
                "schedule interrupted"
            );
            Box::new(InterruptedSchedule {
                error,
                partial: RecordSchedule::new(
                    record_id, reference, runs, state, started_at, Utc::now(),
                ),
            })
        };

        if !(reference.is_finite() && reference > 0.0) {
            let error = Error::InvalidReferenceIntensity {
                record_id,
                value: reference,
            };
            return Err(interrupt(error, runs, state));
        }

        while let Some(intensity) = self.next_intensity(&mut state) {
            let run_index = state.runs() + 1;
            let phase = state.phase();
            let scale_factor = intensity / reference;
            let request = OracleRequest {
                record,
                run_index,
                intensity,
                scale_factor,
                settings,
            };

            let outcome = match oracle.analyse(&request) {
                Ok(outcome) => outcome,
                Err(error) => return Err(interrupt(error, runs, state)),
            };
            let status = outcome.status();
            let collapsed = match status {
                RunStatus::Collapsed => true,
                RunStatus::Survived => false,
                RunStatus::NonConverged => {
                    let policy = self.config.non_convergence;
                    if policy == NonConvergencePolicy::Abort {
                        let error = Error::NonConvergence {
                            record_id,
                            run: run_index,
                            intensity,
                        };
                        state.record_run();
                        runs.push(
                            RunResult::builder(record_id, run_index, intensity, status)
                                .scale_factor(scale_factor)
                                .phase(phase)
                                .build(),
                        );
                        return Err(interrupt(error, runs, state));
                    }
                    state.push_warning(ScheduleWarning::NonConvergenceAbsorbed {
                        run: run_index,
                        intensity,
                        policy,
                    });
                    policy == NonConvergencePolicy::AssumeCollapse
                }
            };

            tracing::debug!(
                record_id,
                run = run_index,
                ?phase,
                intensity,
                scale_factor,
                ?status,
                "run complete"
            );

            let mut builder = RunResult::builder(record_id, run_index, intensity, status)
                .scale_factor(scale_factor)
                .phase(phase);
            if let Some(response) = outcome.into_response() {
                builder = builder.response(response);
            }
            runs.push(builder.build());

            self.observe(&mut state, intensity, collapsed);
        }

        for warning in state.warnings() {
            tracing::warn!(record_id, %warning, "schedule warning");
        }
        tracing::info!(
            record_id,
            runs = state.runs(),
            termination = ?state.termination(),
            "schedule finished"
        );

        Ok(RecordSchedule::new(
            record_id, reference, runs, state, started_at, Utc::now(),
        ))
    }

    #[allow(clippy::cast_precision_loss)]
    fn hunt_intensity(&self, state: &ScheduleState) -> f64 {
        match state.last_intensity() {
            Some(previous) if state.runs() > 0 => {
                previous + state.runs() as f64 * self.config.increment_step
            }
            _ => self.config.first_intensity,
        }
    }

    /// Next trace step, kept strictly below the first collapse intensity.
    ///
    /// When the floor step would reach the collapse, the remaining gap is
    /// halved instead.
    fn trace_intensity(&self, state: &ScheduleState) -> f64 {
        let last = state.last_intensity().unwrap_or(0.0);
        let Some(collapse) = state.first_collapse_intensity() else {
            return last + self.config.trace_floor;
        };
        let mut increment = self.config.trace_ratio * (collapse - last);
        if increment < self.config.trace_threshold {
            increment = self.config.trace_floor;
        }
        let candidate = last + increment;
        if candidate < collapse {
            candidate
        } else {
            let midpoint = last + (collapse - last) / 2.0;
            tracing::debug!(
                candidate,
                collapse,
                midpoint,
                "trace step would reach collapse, halving gap"
            );
            midpoint
        }
    }
}

/// Midpoint of the widest gap in the sorted pool, ignoring the final pair.
///
/// Ties resolve to the lowest gap.
#[must_use]
pub fn fill_intensity(pool: &[f64]) -> Option<f64> {
    if pool.len() < 3 {
        return None;
    }
    let eligible = &pool[..pool.len() - 1];
    let mut best: Option<(f64, f64)> = None;
    for pair in eligible.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > 0.0 && best.map_or(true, |(widest, _)| gap > widest) {
            best = Some((gap, pair[0]));
        }
    }
    best.map(|(gap, low)| low + gap / 2.0)
}
