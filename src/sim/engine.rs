//! Per-location charge recurrence and the parallel fan-out across locations.

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::debug;

use super::battery::Battery;
use super::types::{HourInput, HourRecord, LocationInput, LocationRun, sanitize_energy};

/// Walks one location's hours in order, threading the battery charge.
///
/// `hours` must be sorted by timestamp. The first hour of the series and
/// the first hour of every later calendar day start from the battery's
/// reset charge; every other hour starts from the previous hour's end.
pub fn simulate_series(battery: &Battery, hours: &[HourInput]) -> Vec<HourRecord> {
    let mut carried: Option<(NaiveDate, f64)> = None;

    hours
        .iter()
        .map(|hour| {
            let day = hour.timestamp.date();
            let charge_start = match carried {
                Some((prev_day, charge_end)) if prev_day == day => charge_end,
                _ => battery.reset_charge_mwh,
            };

            let state = battery.transition(charge_start, hour.production_mwh, hour.consumption_mwh);
            carried = Some((day, state.charge_end_mwh));

            HourRecord {
                timestamp: hour.timestamp,
                production_mwh: sanitize_energy(hour.production_mwh),
                consumption_mwh: sanitize_energy(hour.consumption_mwh),
                state,
            }
        })
        .collect()
}

/// Simulates one location.
pub fn simulate_location(battery: &Battery, input: &LocationInput) -> LocationRun {
    let records = simulate_series(battery, &input.hours);
    debug!(location = %input.location, hours = records.len(), "location simulated");
    LocationRun {
        location: input.location.clone(),
        records,
    }
}

/// Simulates every location in parallel.
///
/// Locations never share state; the output keeps the input order.
pub fn simulate_all(battery: &Battery, inputs: &[LocationInput]) -> Vec<LocationRun> {
    inputs
        .par_iter()
        .map(|input| simulate_location(battery, input))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 5, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn hourly(count: usize, production: f64, consumption: f64) -> Vec<HourInput> {
        (0..count)
            .map(|i| HourInput {
                timestamp: start() + Duration::hours(i as i64),
                production_mwh: production,
                consumption_mwh: consumption,
            })
            .collect()
    }

    #[test]
    fn charge_carries_within_a_day() {
        let battery = Battery::default();
        let records = simulate_series(&battery, &hourly(24, 0.3, 0.1));
        for pair in records.windows(2) {
            assert_eq!(pair[1].state.charge_start_mwh, pair[0].state.charge_end_mwh);
        }
    }

    #[test]
    fn day_boundary_resets_charge() {
        let battery = Battery::default();
        let records = simulate_series(&battery, &hourly(48, 1.0, 0.0));
        assert_eq!(records[0].state.charge_start_mwh, 0.0);
        assert_eq!(records[23].state.charge_end_mwh, 2.0);
        assert_eq!(records[24].state.charge_start_mwh, 0.0);
        assert_eq!(records[25].state.charge_start_mwh, 1.0);
    }

    #[test]
    fn gap_into_next_day_resets_even_if_not_midnight() {
        let battery = Battery::default();
        let mut hours = hourly(3, 1.0, 0.0);
        hours[2].timestamp = start() + Duration::hours(30);
        let records = simulate_series(&battery, &hours);
        assert_eq!(records[1].state.charge_start_mwh, 1.0);
        assert_eq!(records[2].state.charge_start_mwh, 0.0);
    }

    #[test]
    fn first_sample_starts_from_reset_charge() {
        let battery = Battery::new(2.0, 0.1, 0.02, 0.5);
        let mut hours = hourly(2, 0.0, 0.0);
        hours[0].timestamp += Duration::hours(9);
        hours[1].timestamp += Duration::hours(9);
        let records = simulate_series(&battery, &hours);
        assert_eq!(records[0].state.charge_start_mwh, 0.5);
    }

    #[test]
    fn records_hold_sanitized_flows() {
        let battery = Battery::default();
        let mut hours = hourly(2, 1.0, 0.0);
        hours[0].production_mwh = f64::NAN;
        hours[1].consumption_mwh = -4.0;
        let records = simulate_series(&battery, &hours);
        assert_eq!(records[0].production_mwh, 0.0);
        assert_eq!(records[1].consumption_mwh, 0.0);
    }

    #[test]
    fn locations_are_independent_and_ordered() {
        let battery = Battery::default();
        let inputs = vec![
            LocationInput {
                location: "north".to_string(),
                hours: hourly(24, 1.0, 0.0),
            },
            LocationInput {
                location: "south".to_string(),
                hours: hourly(24, 0.0, 1.0),
            },
        ];
        let runs = simulate_all(&battery, &inputs);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].location, "north");
        assert_eq!(runs[1].location, "south");

        let alone = simulate_location(&battery, &inputs[1]);
        assert_eq!(runs[1], alone);
        assert_eq!(runs[0].records[23].state.charge_end_mwh, 2.0);
    }
}
