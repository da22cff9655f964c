//! Incremental dynamic analysis over a record set
//!
//! Records are independent: each worker computes the reference intensity,
//! runs the record's schedule and returns it by value. The only
//! synchronisation point is the collection barrier before aggregation.
//!
//! ```text
//! records ──map (rayon)──> RecordSchedule | RecordFailure ──reduce──> IdaReport
//!                                                                     └─> CurveAggregator
//! ```

use crate::config::IdaConfig;
use crate::curve::{AggregatedCurves, CurveAggregator};
use crate::oracle::StructuralOracle;
use crate::record::GroundMotion;
use crate::run::RunResult;
use crate::schedule::{HtfScheduler, InterruptedSchedule, RecordSchedule};
use crate::{Error, Result};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A record that could not be scheduled.
#[derive(Debug)]
pub struct RecordFailure {
    /// Record identifier
    pub record_id: u32,
    /// Cause
    pub error: Error,
    /// Runs completed before the error; `None` if no schedule was started
    pub partial: Option<RecordSchedule>,
}

impl RecordFailure {
    fn before_scheduling(record_id: u32, error: Error) -> Self {
        Self {
            record_id,
            error,
            partial: None,
        }
    }

    fn interrupted(record_id: u32, interrupted: InterruptedSchedule) -> Self {
        Self {
            record_id,
            error: interrupted.error,
            partial: Some(interrupted.partial),
        }
    }
}

/// Outcome of a full IDA.
#[derive(Debug)]
pub struct IdaReport {
    /// Finished schedules, ordered like the input records
    pub schedules: Vec<RecordSchedule>,
    /// Records skipped because of an error
    pub failures: Vec<RecordFailure>,
    /// Aggregated curves, one entry per response direction
    pub curves: Vec<AggregatedCurves>,
}

impl IdaReport {
    /// Schedule of a record, if it succeeded.
    #[must_use]
    pub fn schedule(&self, record_id: u32) -> Option<&RecordSchedule> {
        self.schedules.iter().find(|s| s.record_id() == record_id)
    }

    /// Curves for a response direction.
    #[must_use]
    pub fn curves(&self, direction: usize) -> Option<&AggregatedCurves> {
        self.curves.iter().find(|c| c.direction == direction)
    }
}

/// Drives reference-intensity computation, scheduling and aggregation.
#[derive(Debug, Clone)]
pub struct IdaRunner {
    config: IdaConfig,
    scheduler: HtfScheduler,
    aggregator: CurveAggregator,
}

impl IdaRunner {
    /// Create a runner from a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the configuration is out of range.
    pub fn new(config: IdaConfig) -> Result<Self> {
        config.validate()?;
        let scheduler = HtfScheduler::new(config.htf.clone())?;
        let aggregator = CurveAggregator::new(config.aggregation.clone())?;
        Ok(Self {
            config,
            scheduler,
            aggregator,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &IdaConfig {
        &self.config
    }

    /// Intensity of the unscaled record under the configured measure.
    ///
    /// # Errors
    ///
    /// Returns a calculator domain error for malformed records.
    pub fn reference_intensity(&self, record: &GroundMotion) -> Result<f64> {
        self.config
            .measure
            .evaluate(record, self.config.measure_damping)
    }

    /// Schedule a single record.
    ///
    /// # Errors
    ///
    /// Returns error if the reference intensity cannot be computed or
    /// scheduling fails.
    pub fn schedule_record<O: StructuralOracle + ?Sized>(
        &self,
        record: &GroundMotion,
        oracle: &O,
    ) -> Result<RecordSchedule> {
        let reference = self.reference_intensity(record)?;
        tracing::debug!(record_id = record.id(), reference, "reference intensity");
        self.scheduler
            .run(record, reference, oracle, &self.config.analysis)
    }

    fn schedule_or_fail<O: StructuralOracle + ?Sized>(
        &self,
        record: &GroundMotion,
        oracle: &O,
    ) -> std::result::Result<RecordSchedule, RecordFailure> {
        let record_id = record.id();
        let reference = self
            .reference_intensity(record)
            .map_err(|error| RecordFailure::before_scheduling(record_id, error))?;
        tracing::debug!(record_id, reference, "reference intensity");
        self.scheduler
            .run_keeping_history(record, reference, oracle, &self.config.analysis)
            .map_err(|interrupted| RecordFailure::interrupted(record_id, *interrupted))
    }

    /// Schedule every record, then aggregate once all are done.
    ///
    /// A failing record is logged and reported in
    /// [`IdaReport::failures`] together with the runs it completed; the
    /// other records are unaffected. Partial histories are not aggregated.
    pub fn run<O: StructuralOracle + ?Sized>(
        &self,
        records: &[GroundMotion],
        oracle: &O,
    ) -> IdaReport {
        #[cfg(feature = "parallel")]
        let outcomes: Vec<std::result::Result<RecordSchedule, RecordFailure>> = records
            .par_iter()
            .map(|record| self.schedule_or_fail(record, oracle))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<std::result::Result<RecordSchedule, RecordFailure>> = records
            .iter()
            .map(|record| self.schedule_or_fail(record, oracle))
            .collect();

        let mut schedules = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(schedule) => schedules.push(schedule),
                Err(failure) => {
                    tracing::warn!(
                        record_id = failure.record_id,
                        error = %failure.error,
                        completed = failure.partial.as_ref().map_or(0, |p| p.runs().len()),
                        "record skipped"
                    );
                    failures.push(failure);
                }
            }
        }

        let directions = records
            .iter()
            .map(|record| record.components().len())
            .max()
            .unwrap_or(1);
        let histories: Vec<&[RunResult]> = schedules.iter().map(RecordSchedule::runs).collect();
        let curves = self.aggregator.aggregate_directions(&histories, directions);

        tracing::info!(
            records = records.len(),
            scheduled = schedules.len(),
            failed = failures.len(),
            "incremental dynamic analysis finished"
        );

        IdaReport {
            schedules,
            failures,
            curves,
        }
    }
}
