//! Full IDA sweep over synthetic records
//!
//! This demo shows:
//! - Scaling records by period-averaged spectral acceleration
//! - Hunt-Trace-Fill scheduling against a toy structural oracle
//! - Archiving runs, writing the Parquet intensity table and exporting curves
//!
//! Run with: RUST_LOG=ida_htf=debug cargo run --example ida_sweep

use anyhow::Context;
use ida_htf::config::{AggregationConfig, HtfConfig, IdaConfig};
use ida_htf::ida::IdaRunner;
use ida_htf::intensity::{spectral_acceleration, IntensityMeasure};
use ida_htf::oracle::{OracleOutcome, OracleRequest};
use ida_htf::record::GroundMotion;
use ida_htf::run::{DirectionalResponse, ResponseBundle};
use ida_htf::schedule::RecordSchedule;
use ida_htf::storage::{export_curves, intensity_table, write_intensity_table, RunArchive};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DT: f64 = 0.01;
const RECORDS: u32 = 12;
const STORY_PERIODS: [f64; 3] = [1.2, 0.45, 0.25];

/// Band-limited noise with a build-up and decay envelope.
fn synthetic_component(rng: &mut StdRng, len: usize) -> Vec<f64> {
    let freqs: Vec<(f64, f64, f64)> = (0..8)
        .map(|_| {
            (
                rng.gen_range(0.3..8.0),
                rng.gen_range(0.0..2.0 * PI),
                rng.gen_range(0.02..0.15),
            )
        })
        .collect();
    (0..len)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 * DT;
            let envelope = (t / 3.0).min(1.0) * (-0.08 * (t - 3.0).max(0.0)).exp();
            envelope
                * freqs
                    .iter()
                    .map(|(f, phase, amp)| amp * (2.0 * PI * f * t + phase).sin())
                    .sum::<f64>()
        })
        .collect()
}

/// Three-story proxy: story drift follows the record's spectrum at the
/// modal periods, with softening once drifts pass 2%.
fn toy_oracle(request: &OracleRequest<'_>) -> ida_htf::Result<OracleOutcome> {
    let damping = request.settings.damping_ratio;
    let mut directions = Vec::new();
    for acc in request.scaled_components() {
        let spectrum = spectral_acceleration(&STORY_PERIODS, &acc, DT, damping)?;
        let story_drifts: Vec<f64> = spectrum
            .iter()
            .zip(&STORY_PERIODS)
            .map(|(sa, period)| {
                let elastic = 0.025 * sa * period * period;
                if elastic > 0.02 {
                    elastic * (1.0 + 8.0 * (elastic - 0.02))
                } else {
                    elastic
                }
            })
            .collect();
        let top_displacement = story_drifts.iter().sum::<f64>() * 3.2;
        directions.push(DirectionalResponse {
            floor_accelerations: spectrum,
            story_drifts,
            top_displacement,
            residual_drifts: Vec::new(),
        });
    }

    let peak = directions
        .iter()
        .map(DirectionalResponse::max_story_drift)
        .fold(0.0, f64::max);
    if peak > 0.3 {
        return Ok(OracleOutcome::NonConverged);
    }
    let bundle = ResponseBundle::new(directions);
    Ok(if peak >= request.settings.collapse_drift_ratio {
        OracleOutcome::Collapsed(bundle)
    } else {
        OracleOutcome::Survived(bundle)
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ida_htf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== IDA Sweep Demo ===\n");

    let mut rng = StdRng::seed_from_u64(2024);
    let records = (1..=RECORDS)
        .map(|id| {
            let len = rng.gen_range(1500..3000);
            let x = synthetic_component(&mut rng, len);
            let y = synthetic_component(&mut rng, len);
            GroundMotion::pair(id, x, y, DT)
        })
        .collect::<ida_htf::Result<Vec<_>>>()
        .context("building synthetic records")?;
    println!("  ✓ {} bidirectional records", records.len());

    let config = IdaConfig::builder()
        .measure(IntensityMeasure::sa_avg(1.2))
        .htf(HtfConfig {
            first_intensity: 0.1,
            increment_step: 0.1,
            max_runs: 12,
            ..HtfConfig::default()
        })
        .aggregation(AggregationConfig {
            grid_max: 0.12,
            grid_points: 24,
            ..AggregationConfig::default()
        })
        .build()?;
    let runner = IdaRunner::new(config)?;

    let report = runner.run(&records, &toy_oracle);
    println!(
        "  ✓ {} schedules, {} failures\n",
        report.schedules.len(),
        report.failures.len()
    );

    for schedule in &report.schedules {
        println!(
            "  record {:>3}: {:>2} runs, {:?}, collapse at {}",
            schedule.record_id(),
            schedule.runs().len(),
            schedule.termination(),
            schedule
                .collapse_intensity()
                .map_or_else(|| "-".to_string(), |im| format!("{im:.3} g")),
        );
    }

    let out = std::env::temp_dir().join("ida_htf_sweep");
    let archive = RunArchive::new(out.join("runs"));
    for schedule in &report.schedules {
        archive.save_schedule(schedule)?;
    }
    for partial in report.failures.iter().filter_map(|f| f.partial.as_ref()) {
        archive.save_schedule(partial)?;
    }
    let table = intensity_table(&report.schedules, runner.config().htf.max_runs)?;
    write_intensity_table(out.join("intensities.parquet"), &table)?;
    export_curves(out.join("curves.json"), &report.curves)?;
    println!("\n  ✓ Artifacts written to {}", out.display());

    if let Some(curves) = report.curves(0) {
        println!("\nMedian X-direction curve (drift -> intensity):");
        if let Some(median) = curves.quantile(0.5) {
            for point in median.points.iter().step_by(4) {
                println!(
                    "  {:.3} -> {:.3} g ({} records)",
                    point.response, point.intensity, point.contributors
                );
            }
        }
    }

    let collapses: Vec<f64> = report
        .schedules
        .iter()
        .filter_map(RecordSchedule::collapse_intensity)
        .collect();
    if !collapses.is_empty() {
        let median = ida_htf::curve::quantile(&collapses, 0.5)?;
        println!("\n  ✓ Median collapse intensity: {median:.3} g");
    }

    Ok(())
}
