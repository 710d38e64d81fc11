//! TOML-based engine configuration.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Top-level engine configuration parsed from TOML.
///
/// All fields have defaults matching the reference battery and consumption
/// profile. Load from TOML with [`EngineConfig::from_toml_file`] or use
/// [`EngineConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Battery storage parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Synthetic consumption profile.
    #[serde(default)]
    pub consumption: ConsumptionConfig,
    /// Chart-series resampling.
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// CSV upload parsing.
    #[serde(default)]
    pub ingest: IngestConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Battery storage parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Total energy capacity (MWh).
    pub capacity_mwh: f64,
    /// Minimum reserve as a fraction of capacity (0.0 to 1.0).
    pub reserve_fraction: f64,
    /// Fraction of the stored charge lost in every discharging hour (0.0 to 1.0).
    pub loss_rate: f64,
    /// Charge at the first hour of every calendar day (MWh).
    pub reset_charge_mwh: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_mwh: 2.0,
            reserve_fraction: 0.1,
            loss_rate: 0.02,
            reset_charge_mwh: 0.0,
        }
    }
}

/// Shape of one time-of-day consumption bucket (MWh per hour).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketShape {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// A consumption bucket covering `first_hour..=last_hour`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub first_hour: u32,
    pub last_hour: u32,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl BucketConfig {
    fn new(first_hour: u32, last_hour: u32, mean: f64, min: f64, max: f64) -> Self {
        Self {
            first_hour,
            last_hour,
            mean,
            min,
            max,
        }
    }

    /// The sampling shape of this bucket.
    pub fn shape(&self) -> BucketShape {
        BucketShape {
            mean: self.mean,
            min: self.min,
            max: self.max,
        }
    }
}

/// Synthetic consumption profile.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsumptionConfig {
    /// Standard deviation of the normal draw (MWh).
    pub std_dev: f64,
    /// Batch seed. `None` draws a fresh seed per run.
    pub seed: Option<u64>,
    /// Hour buckets; the first bucket containing an hour wins.
    pub buckets: Vec<BucketConfig>,
    /// Shape used for hours not covered by any bucket.
    pub fallback: BucketShape,
}

impl Default for ConsumptionConfig {
    fn default() -> Self {
        Self {
            std_dev: 0.050,
            seed: None,
            buckets: vec![
                BucketConfig::new(1, 6, 0.075, 0.050, 0.100),
                BucketConfig::new(7, 8, 0.200, 0.150, 0.300),
                BucketConfig::new(9, 12, 0.550, 0.450, 0.700),
                BucketConfig::new(13, 14, 0.500, 0.400, 0.600),
            ],
            fallback: BucketShape {
                mean: 0.150,
                min: 0.100,
                max: 0.200,
            },
        }
    }
}

/// Chart-series resampling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregationConfig {
    /// Width of one chart bucket in minutes (must be > 0).
    pub bucket_minutes: u32,
    /// Upper bound on chart points per location; a longer span is rejected.
    pub max_chart_points: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bucket_minutes: 60,
            max_chart_points: 100_000,
        }
    }
}

/// CSV upload parsing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Field delimiter (single ASCII character).
    pub delimiter: String,
    /// Name of the timestamp column.
    pub time_column: String,
    /// Name of the production column (watt-hours).
    pub production_column: String,
    /// Lines starting with this prefix are never treated as the header.
    pub comment_prefix: String,
    /// chrono format string of the timestamp column.
    pub time_format: String,
    /// Encodings tried in order; the first yielding a header wins.
    pub encodings: Vec<String>,
    /// Zero-based index of the location in the underscore-split file name.
    pub location_field: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            time_column: "time".to_string(),
            production_column: "P_Wh".to_string(),
            comment_prefix: "#".to_string(),
            time_format: "%Y-%m-%dT%H:%M:%S".to_string(),
            encodings: ["utf-8", "latin1", "iso-8859-1", "cp1252"]
                .into_iter()
                .map(String::from)
                .collect(),
            location_field: 1,
        }
    }
}

impl IngestConfig {
    /// Delimiter as a byte for the CSV reader.
    ///
    /// Falls back to `;` when the configured delimiter is not a single ASCII
    /// character; [`EngineConfig::validate`] reports that case.
    pub fn delimiter_byte(&self) -> u8 {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => *b,
            _ => b';',
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    pub bind: String,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
    /// Request body limit in MiB.
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
                "http://localhost:8080".to_string(),
            ],
            max_upload_mb: 64,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, thiserror::Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_mwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Encoding labels understood by the ingestor.
pub const KNOWN_ENCODINGS: &[&str] = &["utf-8", "utf8", "latin1", "iso-8859-1", "cp1252", "windows-1252"];

impl EngineConfig {
    /// Returns the reference configuration.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let bat = &self.battery;
        if !(bat.capacity_mwh.is_finite() && bat.capacity_mwh > 0.0) {
            errors.push(ConfigError::new("battery.capacity_mwh", "must be > 0"));
        }
        if !(0.0..=1.0).contains(&bat.reserve_fraction) {
            errors.push(ConfigError::new("battery.reserve_fraction", "must be in [0.0, 1.0]"));
        }
        if !(0.0..=1.0).contains(&bat.loss_rate) {
            errors.push(ConfigError::new("battery.loss_rate", "must be in [0.0, 1.0]"));
        }
        if !(0.0..=bat.capacity_mwh).contains(&bat.reset_charge_mwh) {
            errors.push(ConfigError::new(
                "battery.reset_charge_mwh",
                "must be in [0.0, battery.capacity_mwh]",
            ));
        }

        let con = &self.consumption;
        if !(con.std_dev.is_finite() && con.std_dev >= 0.0) {
            errors.push(ConfigError::new("consumption.std_dev", "must be finite and >= 0"));
        }
        for (i, b) in con.buckets.iter().enumerate() {
            if b.first_hour > b.last_hour || b.last_hour > 23 {
                errors.push(ConfigError::new(
                    format!("consumption.buckets[{i}]"),
                    "hours must satisfy first_hour <= last_hour <= 23",
                ));
            }
            if let Some(msg) = shape_problem(&b.shape()) {
                errors.push(ConfigError::new(format!("consumption.buckets[{i}]"), msg));
            }
        }
        if let Some(msg) = shape_problem(&con.fallback) {
            errors.push(ConfigError::new("consumption.fallback", msg));
        }

        if self.aggregation.bucket_minutes == 0 {
            errors.push(ConfigError::new("aggregation.bucket_minutes", "must be > 0"));
        }
        if self.aggregation.max_chart_points == 0 {
            errors.push(ConfigError::new("aggregation.max_chart_points", "must be > 0"));
        }

        let ing = &self.ingest;
        if !matches!(ing.delimiter.as_bytes(), [b] if b.is_ascii()) {
            errors.push(ConfigError::new(
                "ingest.delimiter",
                format!("must be a single ASCII character, got \"{}\"", ing.delimiter),
            ));
        }
        if ing.time_column.is_empty() || ing.production_column.is_empty() {
            errors.push(ConfigError::new("ingest", "column names must not be empty"));
        }
        if ing.encodings.is_empty() {
            errors.push(ConfigError::new("ingest.encodings", "must list at least one encoding"));
        }
        for enc in &ing.encodings {
            if !KNOWN_ENCODINGS.contains(&enc.to_ascii_lowercase().as_str()) {
                errors.push(ConfigError::new(
                    "ingest.encodings",
                    format!("unknown encoding \"{enc}\", available: {}", KNOWN_ENCODINGS.join(", ")),
                ));
            }
        }

        if self.server.max_upload_mb == 0 {
            errors.push(ConfigError::new("server.max_upload_mb", "must be > 0"));
        }

        errors
    }
}

fn shape_problem(shape: &BucketShape) -> Option<&'static str> {
    let finite = shape.mean.is_finite() && shape.min.is_finite() && shape.max.is_finite();
    if !finite || shape.min < 0.0 || shape.min > shape.max {
        Some("must satisfy 0 <= min <= max with finite values")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_is_valid() {
        let cfg = EngineConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn baseline_matches_reference_battery() {
        let cfg = EngineConfig::baseline();
        assert_eq!(cfg.battery.capacity_mwh, 2.0);
        assert_eq!(cfg.battery.reserve_fraction, 0.1);
        assert_eq!(cfg.battery.loss_rate, 0.02);
        assert_eq!(cfg.battery.reset_charge_mwh, 0.0);
        assert_eq!(cfg.consumption.buckets.len(), 4);
        assert_eq!(cfg.aggregation.bucket_minutes, 60);
        assert_eq!(cfg.aggregation.max_chart_points, 100_000);
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[battery]
capacity_mwh = 4.0
reserve_fraction = 0.2
loss_rate = 0.01

[consumption]
std_dev = 0.0
seed = 7

[consumption.fallback]
mean = 0.0
min = 0.0
max = 0.0

[[consumption.buckets]]
first_hour = 0
last_hour = 23
mean = 0.3
min = 0.2
max = 0.4

[aggregation]
bucket_minutes = 180

[ingest]
delimiter = ","
encodings = ["utf-8"]

[server]
bind = "127.0.0.1:9000"
"#;
        let cfg = EngineConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.battery.capacity_mwh), Some(4.0));
        assert_eq!(cfg.as_ref().map(|c| c.consumption.seed), Some(Some(7)));
        assert_eq!(cfg.as_ref().map(|c| c.consumption.buckets.len()), Some(1));
        assert_eq!(cfg.as_ref().map(|c| c.ingest.delimiter_byte()), Some(b','));
        assert_eq!(cfg.as_ref().map(|c| c.validate().len()), Some(0));
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[consumption]
seed = 99
"#;
        let cfg = EngineConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.consumption.seed), Some(Some(99)));
        assert_eq!(cfg.as_ref().map(|c| c.consumption.std_dev), Some(0.05));
        assert_eq!(cfg.as_ref().map(|c| c.battery.capacity_mwh), Some(2.0));
        assert_eq!(cfg.as_ref().map(|c| c.ingest.production_column.as_str()), Some("P_Wh"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let toml = r#"
[battery]
capacity_mwh = 2.0
voltage = 800
"#;
        assert!(EngineConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_catches_bad_battery() {
        let mut cfg = EngineConfig::baseline();
        cfg.battery.capacity_mwh = 0.0;
        cfg.battery.loss_rate = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.capacity_mwh"));
        assert!(errors.iter().any(|e| e.field == "battery.loss_rate"));
    }

    #[test]
    fn validation_catches_inverted_bucket() {
        let mut cfg = EngineConfig::baseline();
        cfg.consumption.buckets[1].min = 0.5;
        cfg.consumption.buckets[1].max = 0.1;
        cfg.consumption.buckets[2].last_hour = 24;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "consumption.buckets[1]"));
        assert!(errors.iter().any(|e| e.field == "consumption.buckets[2]"));
    }

    #[test]
    fn validation_catches_zero_bucket_width() {
        let mut cfg = EngineConfig::baseline();
        cfg.aggregation.bucket_minutes = 0;
        cfg.aggregation.max_chart_points = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "aggregation.bucket_minutes"));
        assert!(errors.iter().any(|e| e.field == "aggregation.max_chart_points"));
    }

    #[test]
    fn validation_catches_bad_ingest() {
        let mut cfg = EngineConfig::baseline();
        cfg.ingest.delimiter = ";;".to_string();
        cfg.ingest.encodings = vec!["ebcdic".to_string()];
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "ingest.delimiter"));
        assert!(errors.iter().any(|e| e.message.contains("ebcdic")));
        assert_eq!(cfg.ingest.delimiter_byte(), b';');
    }
}
