//! Per-location totals computed on full-resolution records.

use std::fmt;

use serde::Serialize;

use super::types::{HourRecord, finite_or_zero};

/// Totals of one location, taken before any resampling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Sum of hourly production (MWh).
    pub total_production: f64,
    /// Sum of hourly consumption (MWh).
    pub total_consumption: f64,
    /// Highest end-of-hour battery charge (MWh).
    pub max_battery_charge: f64,
}

impl Summary {
    /// Computes the summary from the complete record vector.
    ///
    /// An empty series yields all zeros; non-finite results are zeroed.
    pub fn from_records(records: &[HourRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut production = 0.0_f64;
        let mut consumption = 0.0_f64;
        let mut max_charge = f64::NEG_INFINITY;

        for r in records {
            production += r.production_mwh;
            consumption += r.consumption_mwh;
            max_charge = max_charge.max(r.state.charge_end_mwh);
        }

        Self {
            total_production: finite_or_zero(production),
            total_consumption: finite_or_zero(consumption),
            max_battery_charge: finite_or_zero(max_charge),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total production:   {:.3} MWh", self.total_production)?;
        writeln!(f, "Total consumption:  {:.3} MWh", self.total_consumption)?;
        write!(f, "Max battery charge: {:.3} MWh", self.max_battery_charge)
    }
}
