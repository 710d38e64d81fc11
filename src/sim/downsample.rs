//! Chart-series resampling.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use super::types::{ChartPoint, Observation, finite_or_zero};

#[derive(Debug, Clone, Copy, Default)]
struct BucketSums {
    production: f64,
    consumption: f64,
    battery_charge: f64,
    count: usize,
}

impl BucketSums {
    fn add<T: Observation>(&mut self, obs: &T) {
        self.production += obs.production();
        self.consumption += obs.consumption();
        self.battery_charge += obs.battery_charge();
        self.count += 1;
    }

    fn to_point(self, timestamp: NaiveDateTime) -> ChartPoint {
        // empty buckets divide by zero and come out as NaN
        let n = self.count as f64;
        let production = self.production / n;
        let consumption = self.consumption / n;
        let battery_charge = self.battery_charge / n;
        ChartPoint {
            timestamp,
            production: finite_or_zero(production),
            consumption: finite_or_zero(consumption),
            battery_charge: finite_or_zero(battery_charge),
            net_energy: finite_or_zero(production - consumption),
        }
    }
}

/// Index of the bucket holding `ts`, counted from `origin`.
fn bucket_index(origin: NaiveDateTime, ts: NaiveDateTime, width: i64) -> i64 {
    (ts - origin).num_minutes().div_euclid(width)
}

/// Number of points [`downsample`] emits for samples spanning
/// `first..=last`.
///
/// The count grows with the span, not with the number of samples, so
/// callers facing untrusted timestamps check it before resampling.
pub fn bucket_count(first: NaiveDateTime, last: NaiveDateTime, bucket_minutes: u32) -> u64 {
    let width = i64::from(bucket_minutes.max(1));
    let (first, last) = if first <= last { (first, last) } else { (last, first) };
    let origin = first.date().and_time(NaiveTime::MIN);
    (bucket_index(origin, last, width) - bucket_index(origin, first, width)).unsigned_abs() + 1
}

/// Averages a series into fixed-width buckets.
///
/// Buckets are aligned to midnight of the earliest sample's day and emitted
/// contiguously from the first occupied bucket to the last, so gaps show up
/// as zero-valued points. Net energy is derived from the averaged production
/// and consumption of each bucket. Every value is finite.
///
/// Resampling a chart series again at the same width returns it unchanged.
/// Allocates [`bucket_count`] points regardless of the series length.
pub fn downsample<T: Observation>(series: &[T], bucket_minutes: u32) -> Vec<ChartPoint> {
    let width = i64::from(bucket_minutes.max(1));
    let Some(earliest) = series.iter().map(Observation::timestamp).min() else {
        return Vec::new();
    };
    let origin = earliest.date().and_time(NaiveTime::MIN);

    let index_of = |ts: NaiveDateTime| bucket_index(origin, ts, width);
    let first = index_of(earliest);
    let last = series
        .iter()
        .map(|obs| index_of(obs.timestamp()))
        .max()
        .unwrap_or(first);

    let mut buckets = vec![BucketSums::default(); (last - first + 1) as usize];
    for obs in series {
        buckets[(index_of(obs.timestamp()) - first) as usize].add(obs);
    }

    buckets
        .into_iter()
        .zip(first..)
        .map(|(sums, idx)| sums.to_point(origin + Duration::minutes(idx * width)))
        .collect()
}
