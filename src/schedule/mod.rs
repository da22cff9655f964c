//! Hunt-Trace-Fill (HTF) intensity scheduling
//!
//! For one ground-motion record the scheduler decides, run by run, which
//! intensity to test next:
//!
//! ```text
//! HUNT ──collapse──> TRACE ──collapse──> FILL ──budget──> DONE
//!   │                  │
//!   └──budget──> DONE  └──budget──> DONE
//! ```
//!
//! - **Hunt**: `first_intensity`, then `previous + (j - 1) * increment_step`
//!   until the oracle reports collapse.
//! - **Trace**: from the last survived intensity towards the first collapse
//!   intensity in steps of `trace_ratio` of the remaining gap. A step that
//!   would reach the collapse intensity halves the gap instead, so tracing
//!   never leaves the bracket.
//! - **Fill**: bisect the widest gap of the explored range, never the gap
//!   adjacent to the collapse intensity.
//!
//! The oracle is called at most `max_runs` times per record. Filling stops
//! early with [`Termination::FillExhausted`] once no gap of positive width
//! is left.
//!
//! ## Example
//!
//! ```rust
//! use ida_htf::config::{AnalysisSettings, HtfConfig};
//! use ida_htf::oracle::{OracleOutcome, OracleRequest};
//! use ida_htf::record::GroundMotion;
//! use ida_htf::run::ResponseBundle;
//! use ida_htf::schedule::{HtfScheduler, Termination};
//!
//! let record = GroundMotion::single(1, vec![0.0, 0.2, -0.1, 0.05], 0.01)?;
//! let oracle = |request: &OracleRequest<'_>| -> ida_htf::Result<OracleOutcome> {
//!     let bundle = ResponseBundle::default();
//!     Ok(if request.intensity >= 0.3 {
//!         OracleOutcome::Collapsed(bundle)
//!     } else {
//!         OracleOutcome::Survived(bundle)
//!     })
//! };
//!
//! let scheduler = HtfScheduler::new(HtfConfig::default())?;
//! let schedule = scheduler.run(&record, 0.2, &oracle, &AnalysisSettings::default())?;
//! assert_eq!(schedule.termination(), Some(Termination::Bracketed));
//! assert_eq!(schedule.runs().len(), 10);
//! # Ok::<(), ida_htf::Error>(())
//! ```

mod htf;
mod state;

pub use htf::{fill_intensity, HtfScheduler};
pub use state::{Phase, ScheduleState, ScheduleWarning, Termination};

use crate::run::RunResult;
use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schedule stopped by an error, with the runs completed before it.
///
/// The partial schedule has no termination and can be archived like a
/// finished one.
#[derive(Debug)]
pub struct InterruptedSchedule {
    /// Cause
    pub error: Error,
    /// Runs completed up to and including the failing one, if it produced a
    /// status
    pub partial: RecordSchedule,
}

/// Finished schedule of one record: its runs plus the final state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSchedule {
    record_id: u32,
    reference_intensity: f64,
    runs: Vec<RunResult>,
    state: ScheduleState,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
}

impl RecordSchedule {
    pub(crate) const fn new(
        record_id: u32,
        reference_intensity: f64,
        runs: Vec<RunResult>,
        state: ScheduleState,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id,
            reference_intensity,
            runs,
            state,
            started_at,
            ended_at,
        }
    }

    /// Record identifier.
    #[must_use]
    pub const fn record_id(&self) -> u32 {
        self.record_id
    }

    /// Intensity of the unscaled record.
    #[must_use]
    pub const fn reference_intensity(&self) -> f64 {
        self.reference_intensity
    }

    /// Runs in execution order.
    #[must_use]
    pub fn runs(&self) -> &[RunResult] {
        &self.runs
    }

    /// Final scheduler state.
    #[must_use]
    pub const fn state(&self) -> &ScheduleState {
        &self.state
    }

    /// Why scheduling stopped; `None` for an interrupted schedule.
    #[must_use]
    pub const fn termination(&self) -> Option<Termination> {
        self.state.termination()
    }

    /// Non-fatal warnings raised while scheduling.
    #[must_use]
    pub fn warnings(&self) -> &[ScheduleWarning] {
        self.state.warnings()
    }

    /// Tested intensities in run order.
    #[must_use]
    pub fn tested_intensities(&self) -> Vec<f64> {
        self.runs.iter().map(RunResult::intensity).collect()
    }

    /// Lowest intensity at which collapse was observed.
    #[must_use]
    pub fn collapse_intensity(&self) -> Option<f64> {
        self.runs
            .iter()
            .filter(|run| run.status().is_collapse())
            .map(RunResult::intensity)
            .min_by(f64::total_cmp)
    }

    /// Scheduling start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Scheduling end time.
    #[must_use]
    pub const fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }
}
