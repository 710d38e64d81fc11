//! Core simulation records shared by the engine, aggregator and API.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Production and consumption for one location-hour, in MWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourInput {
    pub timestamp: NaiveDateTime,
    pub production_mwh: f64,
    pub consumption_mwh: f64,
}

/// Battery charge at the start and end of one hour (MWh).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BessState {
    pub charge_start_mwh: f64,
    pub charge_end_mwh: f64,
}

/// Full-resolution output for one location-hour.
///
/// Production and consumption are the sanitized values the transition saw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HourRecord {
    pub timestamp: NaiveDateTime,
    pub production_mwh: f64,
    pub consumption_mwh: f64,
    pub state: BessState,
}

/// Merged input series of one location, ordered by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationInput {
    pub location: String,
    pub hours: Vec<HourInput>,
}

/// Simulated series of one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationRun {
    pub location: String,
    pub records: Vec<HourRecord>,
}

/// One point of the downsampled chart series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    /// Bucket start, serialized as `YYYY-MM-DDTHH:MM:SS`.
    pub timestamp: NaiveDateTime,
    pub production: f64,
    pub consumption: f64,
    pub battery_charge: f64,
    pub net_energy: f64,
}

/// Read access to the series the aggregator resamples.
///
/// Implemented for full-resolution records and for chart points, so chart
/// series can be resampled again.
pub trait Observation {
    fn timestamp(&self) -> NaiveDateTime;
    fn production(&self) -> f64;
    fn consumption(&self) -> f64;
    fn battery_charge(&self) -> f64;
}

impl Observation for HourRecord {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
    fn production(&self) -> f64 {
        self.production_mwh
    }
    fn consumption(&self) -> f64 {
        self.consumption_mwh
    }
    fn battery_charge(&self) -> f64 {
        self.state.charge_end_mwh
    }
}

impl Observation for ChartPoint {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
    fn production(&self) -> f64 {
        self.production
    }
    fn consumption(&self) -> f64 {
        self.consumption
    }
    fn battery_charge(&self) -> f64 {
        self.battery_charge
    }
}

/// Replaces NaN and infinities with 0.
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Sanitizes an energy quantity before it enters the transition: non-finite
/// values become 0 and negatives are clipped to 0.
pub fn sanitize_energy(value: f64) -> f64 {
    finite_or_zero(value).max(0.0)
}
