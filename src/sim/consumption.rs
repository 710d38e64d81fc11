//! Synthetic consumption profile sampled per hour of day.

use std::ops::RangeInclusive;

use chrono::{NaiveDateTime, Timelike};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use crate::config::{BucketShape, ConsumptionConfig};

/// Golden-ratio increment used to spread location seeds apart.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone, PartialEq)]
struct HourBucket {
    hours: RangeInclusive<u32>,
    shape: BucketShape,
}

/// Time-of-day consumption profile.
///
/// Each hour of day maps to the first bucket whose hour range contains it,
/// or to the fallback shape. A draw is `mean + std_dev * z` with `z` standard
/// normal, clipped to the bucket's `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionProfile {
    buckets: Vec<HourBucket>,
    fallback: BucketShape,
    std_dev: f64,
}

impl ConsumptionProfile {
    pub fn from_config(config: &ConsumptionConfig) -> Self {
        Self {
            buckets: config
                .buckets
                .iter()
                .map(|b| HourBucket {
                    hours: b.first_hour..=b.last_hour,
                    shape: b.shape(),
                })
                .collect(),
            fallback: config.fallback,
            std_dev: config.std_dev,
        }
    }

    /// The sampling shape for an hour of day (0..=23).
    pub fn shape_for_hour(&self, hour: u32) -> BucketShape {
        self.buckets
            .iter()
            .find(|b| b.hours.contains(&hour))
            .map_or(self.fallback, |b| b.shape)
    }

    /// Draws one consumption value (MWh) for the given hour of day.
    pub fn sample<R: Rng + ?Sized>(&self, hour: u32, rng: &mut R) -> f64 {
        let shape = self.shape_for_hour(hour);
        let z: f64 = rng.sample(StandardNormal);
        // not clamp(): an inverted range must not panic
        (shape.mean + self.std_dev * z).max(shape.min).min(shape.max)
    }
}

impl Default for ConsumptionProfile {
    fn default() -> Self {
        Self::from_config(&ConsumptionConfig::default())
    }
}

/// Generates the consumption series of one location.
///
/// # Examples
///
/// ```
/// use bess_sim::sim::consumption::{ConsumptionProfile, ConsumptionSynthesizer};
/// use chrono::NaiveDate;
///
/// let noon = NaiveDate::from_ymd_opt(2020, 6, 1)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap();
/// let mut synth = ConsumptionSynthesizer::new(ConsumptionProfile::default(), 42);
/// let values = synth.synthesize(&[noon]);
/// assert!((0.45..=0.70).contains(&values[0]));
/// ```
#[derive(Debug, Clone)]
pub struct ConsumptionSynthesizer {
    profile: ConsumptionProfile,
    rng: StdRng,
}

impl ConsumptionSynthesizer {
    /// Creates a synthesizer with a fixed seed for reproducible draws.
    pub fn new(profile: ConsumptionProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// One value per timestamp, aligned with the input.
    pub fn synthesize(&mut self, timestamps: &[NaiveDateTime]) -> Vec<f64> {
        timestamps
            .iter()
            .map(|ts| self.profile.sample(ts.hour(), &mut self.rng))
            .collect()
    }
}

/// Seed of the location at `index` within a batch seeded with `batch_seed`.
///
/// Each location gets its own stream, so results do not depend on the order
/// in which locations are simulated.
pub fn location_seed(batch_seed: u64, index: usize) -> u64 {
    let mut z = batch_seed.wrapping_add(SEED_STRIDE.wrapping_mul(index as u64 + 1));
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Resolves the batch seed: the configured one or a fresh random value.
pub fn batch_seed(config: &ConsumptionConfig) -> u64 {
    config.seed.unwrap_or_else(|| rand::rng().random())
}
