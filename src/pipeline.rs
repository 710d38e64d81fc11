//! One simulation batch: ingest, synthesize consumption, simulate, aggregate.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::SimulationError;
use crate::ingest::{LocationSeries, ingest_file, merge_by_location};
use crate::progress::ProgressReporter;
use crate::sim::battery::Battery;
use crate::sim::consumption::{ConsumptionProfile, ConsumptionSynthesizer, batch_seed, location_seed};
use crate::sim::downsample::{bucket_count, downsample};
use crate::sim::engine::simulate_all;
use crate::sim::summary::Summary;
use crate::sim::types::{ChartPoint, HourInput, LocationInput, LocationRun};

/// Percent reached once the file count is known.
const FILES_START: u64 = 5;
/// Percent share spread across the per-file milestones.
const FILES_SPAN: u64 = 30;

/// One uploaded file.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Result of one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResult {
    pub location: String,
    /// Resampled chart series.
    pub hourly_data: Vec<ChartPoint>,
    /// Totals over the full-resolution series.
    pub summary: Summary,
}

/// Payload of a successful batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutput {
    pub data: Vec<LocationResult>,
}

/// Runs a complete batch.
///
/// `bucket_minutes` overrides `config.aggregation.bucket_minutes` for the
/// chart series. The reporter is consumed so the progress channel is closed
/// on every return path, and on unwind.
///
/// # Errors
///
/// Any ingest failure aborts the whole batch with no partial results, as
/// does a location whose time span exceeds
/// `config.aggregation.max_chart_points` chart buckets (`ChartSpan`).
/// An invalid configuration is reported as `Computation`.
pub fn run_batch(
    config: &EngineConfig,
    uploads: &[Upload],
    mut reporter: ProgressReporter,
    bucket_minutes: Option<u32>,
) -> Result<SimulationOutput, SimulationError> {
    reporter.report(0, "Starting simulation");

    let problems = config.validate();
    if !problems.is_empty() {
        let joined: Vec<String> = problems.iter().map(ToString::to_string).collect();
        return Err(SimulationError::Computation(format!(
            "invalid configuration: {}",
            joined.join("; ")
        )));
    }
    if uploads.is_empty() {
        return Err(SimulationError::EmptyUpload);
    }

    let total = uploads.len() as u64;
    reporter.report(FILES_START as u8, format!("Processing {total} files"));

    let per_file = events_per_file(total);
    let steps = per_file * total;
    let mut series = Vec::with_capacity(uploads.len());
    for (i, upload) in uploads.iter().enumerate() {
        let i = i as u64;
        if per_file == 2 {
            reporter.report(
                file_milestone(2 * i + 1, steps),
                format!("Reading file {}", upload.file_name),
            );
        }
        let parsed = ingest_file(&upload.file_name, &upload.bytes, &config.ingest)?;
        info!(
            file = %upload.file_name,
            location = %parsed.location,
            rows = parsed.samples.len(),
            "file ingested"
        );
        series.push(parsed);
        reporter.report(
            file_milestone(per_file * (i + 1), steps),
            format!("Processed file {} ({}/{total})", upload.file_name, i + 1),
        );
    }

    reporter.report(40, "Combining data from all files");
    let merged = merge_by_location(series);

    let width = bucket_minutes.unwrap_or(config.aggregation.bucket_minutes);
    if width == 0 {
        warn!("bucket width 0 requested, using 1 minute");
    }
    for location in &merged {
        check_chart_span(location, width, config.aggregation.max_chart_points)?;
    }

    reporter.report(50, "Converting units");
    let mut inputs: Vec<LocationInput> = merged.into_iter().map(to_location_input).collect();

    reporter.report(60, "Generating consumption data");
    let seed = batch_seed(&config.consumption);
    info!(seed, locations = inputs.len(), "synthesizing consumption");
    let profile = ConsumptionProfile::from_config(&config.consumption);
    inputs
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, input)| fill_consumption(input, &profile, location_seed(seed, idx)));
    reporter.report(70, "Consumption data generated");

    reporter.report(80, "Running BESS simulation");
    let battery = Battery::from_config(&config.battery);
    let runs = simulate_all(&battery, &inputs);
    reporter.report(90, "BESS simulation completed");

    reporter.report(95, "Preparing results");
    let data: Vec<LocationResult> = runs.iter().map(|run| to_result(run, width)).collect();
    for result in &data {
        info!(
            location = %result.location,
            points = result.hourly_data.len(),
            total_production = result.summary.total_production,
            max_battery_charge = result.summary.max_battery_charge,
            "location complete"
        );
    }

    reporter.report(100, "Simulation completed");
    Ok(SimulationOutput { data })
}

/// Progress events per file: "reading" and "processed" while each of them
/// can still advance by a whole percent, only "processed" beyond that.
fn events_per_file(files: u64) -> u64 {
    if 2 * files <= FILES_SPAN { 2 } else { 1 }
}

/// Percent for per-file milestone `step` of `steps`, within (5, 35].
///
/// Strictly increasing in `step` as long as `steps <= 30`; past that,
/// neighbouring files share a percent and the reporter keeps the first.
fn file_milestone(step: u64, steps: u64) -> u8 {
    let pct = FILES_START + FILES_SPAN * step / steps.max(1);
    pct.min(FILES_START + FILES_SPAN) as u8
}

/// Rejects a location whose chart would need more than `limit` points.
fn check_chart_span(
    series: &LocationSeries,
    bucket_minutes: u32,
    limit: u64,
) -> Result<(), SimulationError> {
    let (Some(first), Some(last)) = (series.samples.first(), series.samples.last()) else {
        return Ok(());
    };
    let points = bucket_count(first.timestamp, last.timestamp, bucket_minutes);
    if points <= limit {
        return Ok(());
    }
    Err(SimulationError::ChartSpan {
        location: series.location.clone(),
        files: series.files.clone(),
        first: first.timestamp,
        last: last.timestamp,
        bucket_minutes: bucket_minutes.max(1),
        points,
        limit,
    })
}

fn to_location_input(series: LocationSeries) -> LocationInput {
    let hours = series
        .samples
        .iter()
        .map(|s| HourInput {
            timestamp: s.timestamp,
            production_mwh: s.production_mwh(),
            consumption_mwh: 0.0,
        })
        .collect();
    LocationInput {
        location: series.location,
        hours,
    }
}

fn fill_consumption(input: &mut LocationInput, profile: &ConsumptionProfile, seed: u64) {
    let stamps: Vec<_> = input.hours.iter().map(|h| h.timestamp).collect();
    let values = ConsumptionSynthesizer::new(profile.clone(), seed).synthesize(&stamps);
    for (hour, value) in input.hours.iter_mut().zip(values) {
        hour.consumption_mwh = value;
    }
}

fn to_result(run: &LocationRun, bucket_minutes: u32) -> LocationResult {
    LocationResult {
        location: run.location.clone(),
        hourly_data: downsample(&run.records, bucket_minutes),
        summary: Summary::from_records(&run.records),
    }
}
