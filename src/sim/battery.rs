use crate::config::BatteryConfig;
use crate::sim::types::{BessState, sanitize_energy};

/// A battery energy storage system tracked in MWh.
///
/// `Battery` holds the fixed parameters of the storage unit; the charge level
/// itself is threaded through [`Battery::transition`] by the caller, so one
/// battery description can drive any number of independent locations.
///
/// # Energy Convention
/// - Surplus (production > consumption): charges the battery up to capacity
/// - Deficit (production <= consumption): discharges down to the reserve
///   floor, minus a per-hour loss proportional to the stored charge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Battery {
    /// Total energy capacity in megawatt-hours.
    pub capacity_mwh: f64,

    /// Minimum reserve as a fraction of capacity (0.0 to 1.0).
    pub reserve_fraction: f64,

    /// Fraction of the starting charge lost in every discharging hour.
    pub loss_rate: f64,

    /// Charge at the first hour of every calendar day.
    pub reset_charge_mwh: f64,
}

impl Battery {
    /// Creates a new battery with the specified parameters.
    ///
    /// # Arguments
    ///
    /// * `capacity_mwh` - Capacity in MWh (must be > 0)
    /// * `reserve_fraction` - Reserve floor as a fraction of capacity (0.0 to 1.0)
    /// * `loss_rate` - Per-hour discharge loss fraction (0.0 to 1.0)
    /// * `reset_charge_mwh` - Day-start charge (0.0 to capacity)
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero/negative or any fraction is out of range.
    pub fn new(
        capacity_mwh: f64,
        reserve_fraction: f64,
        loss_rate: f64,
        reset_charge_mwh: f64,
    ) -> Self {
        assert!(capacity_mwh.is_finite() && capacity_mwh > 0.0);
        assert!((0.0..=1.0).contains(&reserve_fraction));
        assert!((0.0..=1.0).contains(&loss_rate));
        assert!((0.0..=capacity_mwh).contains(&reset_charge_mwh));

        Self {
            capacity_mwh,
            reserve_fraction,
            loss_rate,
            reset_charge_mwh,
        }
    }

    /// Builds a battery from validated configuration.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`Battery::new`]; run
    /// [`crate::config::EngineConfig::validate`] first.
    pub fn from_config(config: &BatteryConfig) -> Self {
        Self::new(
            config.capacity_mwh,
            config.reserve_fraction,
            config.loss_rate,
            config.reset_charge_mwh,
        )
    }

    /// Charge below which the battery never discharges (MWh).
    pub fn reserve_floor_mwh(&self) -> f64 {
        self.reserve_fraction * self.capacity_mwh
    }

    /// Advances the battery by one hour.
    ///
    /// `charge_start_mwh` is either the reset charge (first hour of a day) or
    /// the previous hour's end charge. Production and consumption are
    /// sanitized here, so NaN, infinite and negative readings count as 0.
    ///
    /// The withdrawn energy in the discharging branch is not clamped at 0: a
    /// start charge below the reserve floor makes it negative and the end
    /// charge rises towards the floor. The final clip keeps the result in
    /// `[0, capacity]` either way.
    pub fn transition(
        &self,
        charge_start_mwh: f64,
        production_mwh: f64,
        consumption_mwh: f64,
    ) -> BessState {
        let production = sanitize_energy(production_mwh);
        let consumption = sanitize_energy(consumption_mwh);
        let charge_start = sanitize_energy(charge_start_mwh).min(self.capacity_mwh);

        let charge_end = if production > consumption {
            let surplus = production - consumption;
            let to_battery = surplus.min(self.capacity_mwh - charge_start);
            charge_start + to_battery
        } else {
            let deficit = consumption - production;
            let loss = self.loss_rate * charge_start;
            let available = charge_start - self.reserve_floor_mwh();
            let withdrawn = deficit.min(available);
            charge_start - withdrawn - loss
        };

        BessState {
            charge_start_mwh: charge_start,
            charge_end_mwh: charge_end.clamp(0.0, self.capacity_mwh),
        }
    }
}

impl Default for Battery {
    fn default() -> Self {
        Self::from_config(&BatteryConfig::default())
    }
}
