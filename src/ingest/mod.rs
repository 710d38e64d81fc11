//! Timeseries ingestion: turns uploaded CSV files into per-location
//! production series.
//!
//! Each file is decoded with the first configured encoding that yields a
//! header, trimmed to its data block, checked for the required columns,
//! assigned a location from its file name and parsed row by row.

pub mod decode;
pub mod header;

use std::ffi::OsStr;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::config::IngestConfig;
use crate::error::SimulationError;

use self::decode::TextEncoding;
use self::header::{DataBlock, find_data_block};

/// Watt-hours per megawatt-hour.
pub const WH_PER_MWH: f64 = 1_000_000.0;

/// Maximum number of offending values quoted in a time-parse error.
const MAX_TIME_SAMPLES: usize = 5;

/// One hourly production reading as found in the upload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductionSample {
    pub timestamp: NaiveDateTime,
    /// Raw production in watt-hours. Unparseable cells are NaN.
    pub production_wh: f64,
}

impl ProductionSample {
    /// Production converted to megawatt-hours.
    pub fn production_mwh(&self) -> f64 {
        self.production_wh / WH_PER_MWH
    }
}

/// Production series of one location.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSeries {
    pub location: String,
    /// Names of the uploads the samples came from.
    pub files: Vec<String>,
    pub samples: Vec<ProductionSample>,
}

/// Parses one uploaded file into a [`LocationSeries`].
///
/// # Errors
///
/// Returns the first validation failure: `Decoding` when no encoding yields a
/// header, `Schema` when required columns are absent, `Naming` when the file
/// name has no location field, `TimeParse` when any timestamp is malformed.
pub fn ingest_file(
    file_name: &str,
    bytes: &[u8],
    cfg: &IngestConfig,
) -> Result<LocationSeries, SimulationError> {
    let text = decode_with_header(file_name, bytes, cfg)?;
    let Some(block) = locate_block(&text, cfg) else {
        return Err(decoding_error(file_name, cfg));
    };
    debug!(file = file_name, line = block.header_line, header = block.header, "found header");
    if block.footer_lines > 0 {
        warn!(
            file = file_name,
            lines = block.footer_lines,
            "trailing lines without delimiter ignored as footer"
        );
    }

    let samples = parse_block(file_name, &block, cfg)?;
    let location = location_from_file_name(file_name, cfg.location_field)?;
    let samples = parse_timestamps(file_name, samples, cfg)?;

    Ok(LocationSeries {
        location,
        files: vec![file_name.to_string()],
        samples,
    })
}

/// Tries each configured encoding in order; the first one whose text
/// contains a header line wins.
fn decode_with_header(
    file_name: &str,
    bytes: &[u8],
    cfg: &IngestConfig,
) -> Result<String, SimulationError> {
    for label in &cfg.encodings {
        let Some(encoding) = TextEncoding::from_label(label) else {
            warn!(encoding = label.as_str(), "skipping unknown encoding");
            continue;
        };
        let Some(text) = encoding.decode(bytes) else {
            debug!(file = file_name, encoding = label.as_str(), "decode failed");
            continue;
        };
        if locate_block(&text, cfg).is_some() {
            debug!(file = file_name, encoding = label.as_str(), "decoded");
            return Ok(text);
        }
    }

    Err(decoding_error(file_name, cfg))
}

fn locate_block<'a>(text: &'a str, cfg: &IngestConfig) -> Option<DataBlock<'a>> {
    find_data_block(
        text,
        &cfg.time_column,
        &cfg.production_column,
        &cfg.comment_prefix,
        char::from(cfg.delimiter_byte()),
    )
}

fn decoding_error(file_name: &str, cfg: &IngestConfig) -> SimulationError {
    SimulationError::Decoding {
        file: file_name.to_string(),
        time_column: cfg.time_column.clone(),
        production_column: cfg.production_column.clone(),
        tried: cfg.encodings.clone(),
    }
}

/// A row whose timestamp has not been parsed yet.
struct RawRow {
    time: String,
    production_wh: f64,
}

fn parse_block(
    file_name: &str,
    block: &DataBlock<'_>,
    cfg: &IngestConfig,
) -> Result<Vec<RawRow>, SimulationError> {
    let csv_text = block.to_csv_text();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(cfg.delimiter_byte())
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SimulationError::Schema {
            file: file_name.to_string(),
            missing: vec![format!("unreadable header: {e}")],
        })?
        .clone();
    let time_idx = headers.iter().position(|h| h == cfg.time_column);
    let prod_idx = headers.iter().position(|h| h == cfg.production_column);

    let (time_idx, prod_idx) = match (time_idx, prod_idx) {
        (Some(t), Some(p)) => (t, p),
        (t, p) => {
            let missing = [(t, &cfg.time_column), (p, &cfg.production_column)]
                .into_iter()
                .filter(|(idx, _)| idx.is_none())
                .map(|(_, name)| name.clone())
                .collect();
            return Err(SimulationError::Schema {
                file: file_name.to_string(),
                missing,
            });
        }
    };

    let mut rows = Vec::with_capacity(block.rows.len());
    let mut unparseable = 0_usize;
    for record in reader.records() {
        let record = record.map_err(|e| {
            SimulationError::Computation(format!("reading records of {file_name}: {e}"))
        })?;
        let time = record.get(time_idx).unwrap_or_default().to_string();
        let production_wh = match record.get(prod_idx).map(str::parse::<f64>) {
            Some(Ok(v)) => v,
            _ => {
                unparseable += 1;
                f64::NAN
            }
        };
        rows.push(RawRow {
            time,
            production_wh,
        });
    }

    if unparseable > 0 {
        warn!(
            file = file_name,
            count = unparseable,
            "production cells not numeric; treated as 0"
        );
    }
    Ok(rows)
}

fn parse_timestamps(
    file_name: &str,
    rows: Vec<RawRow>,
    cfg: &IngestConfig,
) -> Result<Vec<ProductionSample>, SimulationError> {
    let mut samples = Vec::with_capacity(rows.len());
    let mut offending = Vec::new();

    for row in rows {
        match NaiveDateTime::parse_from_str(&row.time, &cfg.time_format) {
            Ok(timestamp) => samples.push(ProductionSample {
                timestamp,
                production_wh: row.production_wh,
            }),
            Err(_) => {
                if offending.len() < MAX_TIME_SAMPLES {
                    offending.push(row.time);
                }
            }
        }
    }

    if offending.is_empty() {
        Ok(samples)
    } else {
        Err(SimulationError::TimeParse {
            file: file_name.to_string(),
            format: cfg.time_format.clone(),
            samples: offending,
        })
    }
}

/// Extracts the location from an underscore-delimited file name.
///
/// The extension and any directory part are ignored, so
/// `Timeseries_Rome_2020.csv` with `field = 1` yields `Rome`.
///
/// # Errors
///
/// Returns `Naming` if the name has too few fields or the field is empty.
pub fn location_from_file_name(file_name: &str, field: usize) -> Result<String, SimulationError> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or(file_name);

    stem.split('_')
        .nth(field)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SimulationError::Naming {
            file: file_name.to_string(),
        })
}

/// Groups series by location in first-appearance order.
///
/// Files mapping to the same location are concatenated, then the samples
/// are stably sorted by timestamp.
pub fn merge_by_location(series: Vec<LocationSeries>) -> Vec<LocationSeries> {
    let mut merged: Vec<LocationSeries> = Vec::new();
    for s in series {
        match merged.iter_mut().find(|m| m.location == s.location) {
            Some(existing) => {
                existing.files.extend(s.files);
                existing.samples.extend(s.samples);
            }
            None => merged.push(s),
        }
    }
    for m in &mut merged {
        m.samples.sort_by_key(|s| s.timestamp);
    }
    merged
}
