//! IDA curve aggregation tests

use ida_htf::config::AggregationConfig;
use ida_htf::curve::{quantile, CurveAggregator, RecordCurve, ResponseMetric};
use ida_htf::run::{DirectionalResponse, ResponseBundle, RunResult, RunStatus};

const TOL: f64 = 1e-9;

fn response(drift: f64) -> DirectionalResponse {
    DirectionalResponse {
        story_drifts: vec![drift * 0.5, drift],
        floor_accelerations: vec![3.0 * drift],
        top_displacement: -2.0 * drift,
        residual_drifts: vec![drift / 10.0],
    }
}

/// Survived runs whose drift is `slope * intensity`.
fn linear_history(record_id: u32, slope: f64, intensities: &[f64]) -> Vec<RunResult> {
    intensities
        .iter()
        .enumerate()
        .map(|(i, &im)| {
            RunResult::builder(record_id, i + 1, im, RunStatus::Survived)
                .response(ResponseBundle::single(response(slope * im)))
                .build()
        })
        .collect()
}

fn aggregator(grid_max: f64, grid_points: usize, quantiles: Vec<f64>) -> CurveAggregator {
    CurveAggregator::new(AggregationConfig {
        grid_max,
        grid_points,
        quantiles,
        ..AggregationConfig::default()
    })
    .unwrap()
}

#[test]
fn test_two_linear_records_median() {
    let ims = [0.1, 0.2, 0.3, 0.4, 0.5];
    let histories = vec![linear_history(1, 0.1, &ims), linear_history(2, 0.05, &ims)];
    let curves = aggregator(0.02, 4, vec![0.0, 0.5, 1.0])
        .aggregate(histories.iter().map(Vec::as_slice), 0);

    assert_eq!(curves.records.len(), 2);
    assert_eq!(curves.grid.len(), 4);

    let low = curves.quantile(0.0).unwrap();
    let median = curves.quantile(0.5).unwrap();
    let high = curves.quantile(1.0).unwrap();
    let expected_low = [0.05, 0.1, 0.15, 0.2];
    let expected_median = [0.075, 0.15, 0.225, 0.3];
    let expected_high = [0.1, 0.2, 0.3, 0.4];
    for g in 0..4 {
        assert!((low.points[g].intensity - expected_low[g]).abs() < TOL);
        assert!((median.points[g].intensity - expected_median[g]).abs() < TOL);
        assert!((high.points[g].intensity - expected_high[g]).abs() < TOL);
        assert_eq!(median.points[g].contributors, 2);
    }
}

#[test]
fn test_curve_flatlines_past_largest_response() {
    let histories = vec![linear_history(1, 0.1, &[0.1, 0.2, 0.3, 0.4, 0.5])];
    let curves = aggregator(0.1, 10, vec![0.5]).aggregate(histories.iter().map(Vec::as_slice), 0);
    let median = curves.quantile(0.5).unwrap();
    // largest drift is 0.05; everything beyond holds at intensity 0.5
    for point in median.points.iter().filter(|p| p.response > 0.05 + TOL) {
        assert!((point.intensity - 0.5).abs() < TOL);
    }
    assert!((median.points[4].intensity - 0.5).abs() < TOL);
}

#[test]
fn test_quantile_curves_do_not_cross() {
    let ims = [0.05, 0.1, 0.2, 0.35, 0.23, 0.255, 0.28];
    let histories: Vec<Vec<RunResult>> = [0.08, 0.12, 0.05, 0.2, 0.15, 0.09]
        .iter()
        .zip(1..)
        .map(|(&slope, id)| linear_history(id, slope, &ims))
        .collect();
    let curves = aggregator(0.1, 50, vec![0.16, 0.5, 0.84])
        .aggregate(histories.iter().map(Vec::as_slice), 0);

    let q16 = curves.quantile(0.16).unwrap();
    let q50 = curves.quantile(0.5).unwrap();
    let q84 = curves.quantile(0.84).unwrap();
    assert_eq!(q16.points.len(), 50);
    for ((a, b), c) in q16.points.iter().zip(&q50.points).zip(&q84.points) {
        assert!(a.intensity <= b.intensity + TOL);
        assert!(b.intensity <= c.intensity + TOL);
    }
}

#[test]
fn test_degenerate_records_leave_no_points() {
    let histories = vec![
        vec![RunResult::builder(1, 1, 0.1, RunStatus::NonConverged).build()],
        vec![RunResult::builder(2, 1, 0.1, RunStatus::Survived)
            .response(ResponseBundle::single(DirectionalResponse::default()))
            .build()],
    ];
    let curves = aggregator(0.1, 10, vec![0.5]).aggregate(histories.iter().map(Vec::as_slice), 0);
    assert!(curves.records.is_empty());
    assert!(curves.quantile(0.5).unwrap().points.is_empty());
    assert_eq!(curves.grid.len(), 10);
}

#[test]
fn test_degenerate_record_does_not_dilute_others() {
    let histories = vec![
        linear_history(1, 0.1, &[0.1, 0.2]),
        vec![RunResult::builder(2, 1, 0.1, RunStatus::NonConverged).build()],
    ];
    let curves = aggregator(0.02, 2, vec![0.5]).aggregate(histories.iter().map(Vec::as_slice), 0);
    assert_eq!(curves.records.len(), 1);
    assert!(curves
        .quantile(0.5)
        .unwrap()
        .points
        .iter()
        .all(|p| p.contributors == 1));
}

#[test]
fn test_second_direction_is_aggregated_separately() {
    let runs: Vec<RunResult> = [0.1, 0.2, 0.4]
        .iter()
        .enumerate()
        .map(|(i, &im)| {
            RunResult::builder(3, i + 1, im, RunStatus::Survived)
                .response(ResponseBundle::new(vec![
                    response(0.1 * im),
                    response(0.2 * im),
                ]))
                .build()
        })
        .collect();
    let histories = [runs.as_slice()];
    let all = aggregator(0.02, 2, vec![0.5]).aggregate_directions(&histories, 2);

    assert_eq!(all.len(), 2);
    assert_eq!(all[1].direction, 1);
    let x = &all[0].quantile(0.5).unwrap().points;
    let y = &all[1].quantile(0.5).unwrap().points;
    // Y drifts are twice X drifts, so Y reaches each drift at half the intensity
    assert!((x[0].intensity - 0.1).abs() < TOL);
    assert!((y[0].intensity - 0.05).abs() < TOL);
}

#[test]
fn test_missing_direction_yields_no_curve() {
    let histories = vec![linear_history(1, 0.1, &[0.1, 0.2])];
    let curves = aggregator(0.02, 2, vec![0.5]).aggregate(histories.iter().map(Vec::as_slice), 1);
    assert!(curves.records.is_empty());
}

#[test]
fn test_alternative_metrics() {
    let runs = linear_history(1, 0.1, &[0.1, 0.2]);
    let top = RecordCurve::from_runs(&runs, ResponseMetric::TopDisplacement, 0, false).unwrap();
    // top displacement is 2 * drift (absolute value)
    assert!((top.max_response() - 0.04).abs() < TOL);

    let floor = RecordCurve::from_runs(&runs, ResponseMetric::MaxFloorAcceleration, 0, false).unwrap();
    assert!((floor.max_response() - 0.06).abs() < TOL);

    let residual = RecordCurve::from_runs(&runs, ResponseMetric::MaxResidualDrift, 0, false).unwrap();
    assert!((residual.max_response() - 0.002).abs() < TOL);
}

#[test]
fn test_collapsed_runs_opt_in() {
    let mut runs = linear_history(1, 0.1, &[0.1, 0.2]);
    runs.push(
        RunResult::builder(1, 3, 0.3, RunStatus::Collapsed)
            .response(ResponseBundle::single(response(0.12)))
            .build(),
    );
    let histories = [runs.as_slice()];

    let excluded = aggregator(0.1, 10, vec![0.5]).aggregate(histories.iter().copied(), 0);
    assert!((excluded.records[0].max_response() - 0.02).abs() < TOL);

    let included = CurveAggregator::new(AggregationConfig {
        include_collapsed: true,
        quantiles: vec![0.5],
        ..AggregationConfig::default()
    })
    .unwrap()
    .aggregate(histories.iter().copied(), 0);
    assert!((included.records[0].max_response() - 0.12).abs() < TOL);
}

#[test]
fn test_aggregation_is_deterministic() {
    let histories = vec![
        linear_history(1, 0.1, &[0.3, 0.1, 0.2]),
        linear_history(2, 0.07, &[0.05, 0.4]),
    ];
    let agg = aggregator(0.05, 20, vec![0.16, 0.5, 0.84]);
    let first = agg.aggregate(histories.iter().map(Vec::as_slice), 0);
    let second = agg.aggregate(histories.iter().map(Vec::as_slice), 0);
    assert_eq!(first, second);
}

#[test]
fn test_invalid_aggregation_config() {
    for config in [
        AggregationConfig {
            grid_points: 0,
            ..AggregationConfig::default()
        },
        AggregationConfig {
            grid_max: -0.1,
            ..AggregationConfig::default()
        },
        AggregationConfig {
            quantiles: vec![1.5],
            ..AggregationConfig::default()
        },
        AggregationConfig {
            quantiles: Vec::new(),
            ..AggregationConfig::default()
        },
    ] {
        assert!(CurveAggregator::new(config).is_err());
    }
}

#[test]
fn test_quantile_rejects_bad_input() {
    assert!(quantile(&[0.1, 0.2], -0.1).is_err());
    assert!(quantile(&[0.1, f64::NAN], 0.5).is_err());
    assert!((quantile(&[0.2, 0.1, 0.4], 0.25).unwrap() - 0.15).abs() < TOL);
}
