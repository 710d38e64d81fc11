//! CSV export for chart series.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::pipeline::LocationResult;

/// Column header of the chart-series export.
const HEADER: &str = "location,timestamp,production_mwh,consumption_mwh,\
                      battery_charge_mwh,net_energy_mwh";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Exports the chart series of every location to a CSV file.
///
/// One row per chart point, locations in result order. Produces
/// deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(results: &[LocationResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(results, buf)
}

/// Writes chart series as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(results: &[LocationResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for result in results {
        for p in &result.hourly_data {
            wtr.write_record(&[
                result.location.clone(),
                p.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                format!("{:.6}", p.production),
                format!("{:.6}", p.consumption),
                format!("{:.6}", p.battery_charge),
                format!("{:.6}", p.net_energy),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
