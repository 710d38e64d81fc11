//! Property tests for the battery recurrence.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use proptest::prelude::*;

use bess_sim::sim::battery::Battery;
use bess_sim::sim::downsample::downsample;
use bess_sim::sim::engine::simulate_series;
use bess_sim::sim::types::HourInput;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 3, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Energy values including zeros, negatives, huge and non-finite readings.
fn energy() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => 0.0..3.0_f64,
        1 => Just(0.0),
        1 => -5.0..0.0_f64,
        1 => 1e3..1e9_f64,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
    ]
}

fn hours(max_len: usize) -> impl Strategy<Value = Vec<HourInput>> {
    prop::collection::vec((energy(), energy()), 1..max_len).prop_map(|flows| {
        flows
            .into_iter()
            .enumerate()
            .map(|(i, (production, consumption))| HourInput {
                timestamp: start() + Duration::hours(i as i64),
                production_mwh: production,
                consumption_mwh: consumption,
            })
            .collect()
    })
}

fn battery() -> impl Strategy<Value = Battery> {
    (0.1..10.0_f64, 0.0..=1.0_f64, 0.0..=0.5_f64)
        .prop_map(|(capacity, reserve, loss)| Battery::new(capacity, reserve, loss, 0.0))
}

proptest! {
    #[test]
    fn charge_stays_within_capacity(battery in battery(), hours in hours(120)) {
        for record in simulate_series(&battery, &hours) {
            prop_assert!(record.state.charge_start_mwh >= 0.0);
            prop_assert!(record.state.charge_start_mwh <= battery.capacity_mwh);
            prop_assert!(record.state.charge_end_mwh >= 0.0);
            prop_assert!(record.state.charge_end_mwh <= battery.capacity_mwh);
        }
    }

    #[test]
    fn charge_carries_except_at_day_start(battery in battery(), hours in hours(120)) {
        let records = simulate_series(&battery, &hours);
        for pair in records.windows(2) {
            if pair[0].timestamp.date() == pair[1].timestamp.date() {
                prop_assert_eq!(pair[1].state.charge_start_mwh, pair[0].state.charge_end_mwh);
            } else {
                prop_assert_eq!(pair[1].state.charge_start_mwh, battery.reset_charge_mwh);
            }
        }
    }

    #[test]
    fn chart_values_are_finite(battery in battery(), hours in hours(72), width in 1_u32..600) {
        let records = simulate_series(&battery, &hours);
        for point in downsample(&records, width) {
            prop_assert!(point.production.is_finite());
            prop_assert!(point.consumption.is_finite());
            prop_assert!(point.battery_charge.is_finite());
            prop_assert!(point.net_energy.is_finite());
        }
    }

    #[test]
    fn downsampling_is_idempotent(battery in battery(), hours in hours(72), width in 1_u32..600) {
        let records = simulate_series(&battery, &hours);
        let once = downsample(&records, width);
        let twice = downsample(&once, width);
        prop_assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            prop_assert_eq!(a.timestamp, b.timestamp);
            prop_assert!((a.production - b.production).abs() < 1e-9);
            prop_assert!((a.battery_charge - b.battery_charge).abs() < 1e-9);
            prop_assert!((a.net_energy - b.net_energy).abs() < 1e-9);
        }
    }
}
