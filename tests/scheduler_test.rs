//! Hunt-Trace-Fill scheduler tests

use ida_htf::config::{AnalysisSettings, HtfConfig, NonConvergencePolicy};
use ida_htf::oracle::{OracleOutcome, OracleRequest};
use ida_htf::record::GroundMotion;
use ida_htf::run::{DirectionalResponse, ResponseBundle, RunStatus};
use ida_htf::schedule::{HtfScheduler, Phase, RecordSchedule, ScheduleWarning, Termination};
use ida_htf::{Error, Result};

const TOL: f64 = 1e-9;

fn record() -> GroundMotion {
    GroundMotion::single(7, vec![0.0, 0.25, -0.5, 0.1], 0.01).unwrap()
}

fn bundle(intensity: f64) -> ResponseBundle {
    ResponseBundle::single(DirectionalResponse {
        story_drifts: vec![0.1 * intensity],
        ..DirectionalResponse::default()
    })
}

fn threshold_oracle(collapse_at: f64) -> impl Fn(&OracleRequest<'_>) -> Result<OracleOutcome> + Sync {
    move |request: &OracleRequest<'_>| {
        Ok(if request.intensity >= collapse_at {
            OracleOutcome::Collapsed(bundle(request.intensity))
        } else {
            OracleOutcome::Survived(bundle(request.intensity))
        })
    }
}

fn schedule_with(config: HtfConfig, collapse_at: f64) -> RecordSchedule {
    HtfScheduler::new(config)
        .unwrap()
        .run(&record(), 0.5, &threshold_oracle(collapse_at), &AnalysisSettings::default())
        .unwrap()
}

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < TOL, "{actual:?} vs {expected:?}");
    }
}

#[test]
fn test_reference_scenario() {
    let schedule = schedule_with(HtfConfig::default(), 0.30);
    let tested = schedule.tested_intensities();

    // hunt, then trace, then the first fill run
    assert_close(
        &tested[..9],
        &[0.05, 0.10, 0.20, 0.35, 0.23, 0.255, 0.28, 0.305, 0.15],
    );
    assert_eq!(tested.len(), 10);

    let state = schedule.state();
    assert_eq!(state.hunt_collapse_run(), Some(4));
    assert!((state.first_collapse_intensity().unwrap() - 0.35).abs() < TOL);
    assert!((state.trace_collapse_intensity().unwrap() - 0.305).abs() < TOL);
    assert_eq!(schedule.termination(), Some(Termination::Bracketed));
    assert!((schedule.collapse_intensity().unwrap() - 0.305).abs() < TOL);
    assert!(schedule.warnings().is_empty());
}

#[test]
fn test_phases_recorded_per_run() {
    let schedule = schedule_with(HtfConfig::default(), 0.30);
    let phases: Vec<Phase> = schedule.runs().iter().map(|r| r.phase()).collect();
    assert_eq!(
        phases,
        vec![
            Phase::Hunt,
            Phase::Hunt,
            Phase::Hunt,
            Phase::Hunt,
            Phase::Trace,
            Phase::Trace,
            Phase::Trace,
            Phase::Trace,
            Phase::Fill,
            Phase::Fill,
        ]
    );
}

#[test]
fn test_scale_factor_is_intensity_over_reference() {
    let schedule = schedule_with(HtfConfig::default(), 0.30);
    for run in schedule.runs() {
        assert!((run.scale_factor() - run.intensity() / 0.5).abs() < TOL);
        assert_eq!(run.record_id(), 7);
    }
    let indices: Vec<usize> = schedule.runs().iter().map(|r| r.run_index()).collect();
    assert_eq!(indices, (1..=10).collect::<Vec<_>>());
}

#[test]
fn test_collapse_never_found() {
    let config = HtfConfig {
        max_runs: 6,
        ..HtfConfig::default()
    };
    let schedule = schedule_with(config, f64::INFINITY);

    assert_eq!(schedule.runs().len(), 6);
    assert_eq!(schedule.termination(), Some(Termination::CollapseNotFound));
    assert_eq!(schedule.termination().map(Termination::phase), Some(Phase::Hunt));
    assert_eq!(
        schedule.warnings(),
        &[ScheduleWarning::CollapseNotFound { runs: 6 }]
    );
    assert!(schedule.collapse_intensity().is_none());
    assert!(schedule.runs().iter().all(|r| r.response().is_some()));
}

#[test]
fn test_budget_spent_while_tracing() {
    let config = HtfConfig {
        max_runs: 5,
        ..HtfConfig::default()
    };
    let schedule = schedule_with(config, 0.30);
    assert_eq!(schedule.termination(), Some(Termination::StillTracing));
    assert_eq!(
        schedule.warnings(),
        &[ScheduleWarning::StillTracing { runs: 5 }]
    );
}

#[test]
fn test_collapse_on_second_run_warns() {
    let schedule = schedule_with(HtfConfig::default(), 0.08);
    assert_eq!(schedule.state().hunt_collapse_run(), Some(2));
    assert!(schedule
        .warnings()
        .contains(&ScheduleWarning::CoarseIncrement { run: 2 }));
}

#[test]
fn test_fill_stays_below_first_collapse() {
    let config = HtfConfig {
        max_runs: 20,
        ..HtfConfig::default()
    };
    let schedule = schedule_with(config, 0.30);
    let first_collapse = schedule.state().first_collapse_intensity().unwrap();
    let fills: Vec<f64> = schedule
        .runs()
        .iter()
        .filter(|r| r.phase() == Phase::Fill)
        .map(|r| r.intensity())
        .collect();
    assert!(!fills.is_empty());
    assert!(fills.iter().all(|&im| im > 0.0 && im < first_collapse));
}

#[test]
fn test_no_intensity_tested_twice() {
    let config = HtfConfig {
        max_runs: 25,
        ..HtfConfig::default()
    };
    let schedule = schedule_with(config, 0.30);
    let mut tested = schedule.tested_intensities();
    tested.sort_by(f64::total_cmp);
    assert!(tested.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn test_trace_stays_below_collapse_when_solver_diverges_above() {
    // collapse only inside a narrow band, no convergence past it
    let oracle = |request: &OracleRequest<'_>| -> Result<OracleOutcome> {
        let im = request.intensity;
        Ok(if im >= 0.36 {
            OracleOutcome::NonConverged
        } else if im >= 0.335 {
            OracleOutcome::Collapsed(bundle(im))
        } else {
            OracleOutcome::Survived(bundle(im))
        })
    };
    let config = HtfConfig {
        max_runs: 12,
        ..HtfConfig::default()
    };
    let schedule = HtfScheduler::new(config)
        .unwrap()
        .run(&record(), 0.5, &oracle, &AnalysisSettings::default())
        .unwrap();

    let state = schedule.state();
    let first_collapse = state.first_collapse_intensity().unwrap();
    assert!((first_collapse - 0.35).abs() < TOL);
    let trace: Vec<f64> = schedule
        .runs()
        .iter()
        .filter(|r| r.phase() == Phase::Trace)
        .map(|r| r.intensity())
        .collect();
    assert_close(&trace, &[0.23, 0.255, 0.28, 0.305, 0.33, 0.34]);
    assert!(trace.iter().all(|&im| im < first_collapse));
    assert!((state.trace_collapse_intensity().unwrap() - 0.34).abs() < TOL);
    assert_eq!(schedule.termination(), Some(Termination::Bracketed));
    assert!(schedule
        .runs()
        .iter()
        .all(|r| r.status() != RunStatus::NonConverged));
}

fn non_converging_oracle(request: &OracleRequest<'_>) -> Result<OracleOutcome> {
    let im = request.intensity;
    Ok(if (0.15..0.25).contains(&im) {
        OracleOutcome::NonConverged
    } else if im >= 0.30 {
        OracleOutcome::Collapsed(bundle(im))
    } else {
        OracleOutcome::Survived(bundle(im))
    })
}

fn schedule_with_policy(policy: NonConvergencePolicy) -> Result<RecordSchedule> {
    let config = HtfConfig {
        non_convergence: policy,
        ..HtfConfig::default()
    };
    HtfScheduler::new(config)?.run(
        &record(),
        0.5,
        &non_converging_oracle,
        &AnalysisSettings::default(),
    )
}

#[test]
fn test_non_convergence_assumed_survived() {
    let schedule = schedule_with_policy(NonConvergencePolicy::AssumeSurvived).unwrap();
    assert_eq!(schedule.runs()[2].status(), RunStatus::NonConverged);
    assert!(schedule.runs()[2].response().is_none());
    assert_eq!(schedule.state().hunt_collapse_run(), Some(4));
    assert!(schedule.warnings().iter().any(|w| matches!(
        w,
        ScheduleWarning::NonConvergenceAbsorbed {
            run: 3,
            policy: NonConvergencePolicy::AssumeSurvived,
            ..
        }
    )));
}

#[test]
fn test_non_convergence_assumed_collapse() {
    let schedule = schedule_with_policy(NonConvergencePolicy::AssumeCollapse).unwrap();
    assert_eq!(schedule.state().hunt_collapse_run(), Some(3));
    assert!((schedule.state().first_collapse_intensity().unwrap() - 0.2).abs() < TOL);
}

#[test]
fn test_non_convergence_abort() {
    let err = schedule_with_policy(NonConvergencePolicy::Abort).unwrap_err();
    assert!(matches!(
        err,
        Error::NonConvergence {
            record_id: 7,
            run: 3,
            ..
        }
    ));
}

#[test]
fn test_abort_keeps_completed_runs() {
    let config = HtfConfig {
        non_convergence: NonConvergencePolicy::Abort,
        ..HtfConfig::default()
    };
    let interrupted = HtfScheduler::new(config)
        .unwrap()
        .run_keeping_history(
            &record(),
            0.5,
            &non_converging_oracle,
            &AnalysisSettings::default(),
        )
        .unwrap_err();

    assert!(matches!(
        interrupted.error,
        Error::NonConvergence { record_id: 7, run: 3, .. }
    ));
    let partial = &interrupted.partial;
    assert_eq!(partial.record_id(), 7);
    assert_eq!(partial.termination(), None);
    assert_close(&partial.tested_intensities(), &[0.05, 0.10, 0.20]);
    let statuses: Vec<RunStatus> = partial.runs().iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Survived, RunStatus::Survived, RunStatus::NonConverged]
    );
    assert!(partial.runs()[..2].iter().all(|r| r.response().is_some()));
    assert_eq!(partial.state().runs(), 3);
}

#[test]
fn test_oracle_error_keeps_completed_runs() {
    let failing = |request: &OracleRequest<'_>| -> Result<OracleOutcome> {
        if request.run_index == 6 {
            return Err(Error::OracleFailed {
                record_id: request.record.id(),
                run: request.run_index,
                message: "singular stiffness".to_string(),
            });
        }
        threshold_oracle(0.30)(request)
    };
    let interrupted = HtfScheduler::new(HtfConfig::default())
        .unwrap()
        .run_keeping_history(&record(), 0.5, &failing, &AnalysisSettings::default())
        .unwrap_err();

    assert!(matches!(interrupted.error, Error::OracleFailed { run: 6, .. }));
    let partial = &interrupted.partial;
    assert_close(&partial.tested_intensities(), &[0.05, 0.10, 0.20, 0.35, 0.23]);
    assert_eq!(partial.state().phase(), Phase::Trace);
    assert!((partial.collapse_intensity().unwrap() - 0.35).abs() < TOL);
}

#[test]
fn test_invalid_reference_intensity() {
    let scheduler = HtfScheduler::new(HtfConfig::default()).unwrap();
    for reference in [0.0, -1.0, f64::NAN] {
        let err = scheduler
            .run(&record(), reference, &threshold_oracle(0.3), &AnalysisSettings::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidReferenceIntensity { record_id: 7, .. }));
    }
}

#[test]
fn test_oracle_error_propagates() {
    let failing = |request: &OracleRequest<'_>| -> Result<OracleOutcome> {
        if request.run_index == 2 {
            Err(Error::OracleFailed {
                record_id: request.record.id(),
                run: request.run_index,
                message: "model build failed".to_string(),
            })
        } else {
            Ok(OracleOutcome::Survived(ResponseBundle::default()))
        }
    };
    let err = HtfScheduler::new(HtfConfig::default())
        .unwrap()
        .run(&record(), 0.5, &failing, &AnalysisSettings::default())
        .unwrap_err();
    assert!(err.to_string().contains("model build failed"));
}

#[test]
fn test_settings_reach_oracle() {
    let settings = AnalysisSettings {
        collapse_drift_ratio: 0.04,
        control_levels: vec![1, 2, 3],
        ..AnalysisSettings::default()
    };
    let oracle = |request: &OracleRequest<'_>| -> Result<OracleOutcome> {
        assert_eq!(request.settings.control_levels, vec![1, 2, 3]);
        let drift = 0.1 * request.intensity;
        let response = bundle(request.intensity);
        Ok(if drift >= request.settings.collapse_drift_ratio {
            OracleOutcome::Collapsed(response)
        } else {
            OracleOutcome::Survived(response)
        })
    };
    let schedule = HtfScheduler::new(HtfConfig::default())
        .unwrap()
        .run(&record(), 0.5, &oracle, &settings)
        .unwrap();
    // drift 0.04 is reached at intensity 0.4
    assert!(schedule.collapse_intensity().unwrap() >= 0.4);
}
