//! Error taxonomy for a simulation batch.

use chrono::NaiveDateTime;

/// Reasons a simulation batch can fail.
///
/// Input-validation variants abort the whole batch and are client faults
/// (HTTP 400, or 413 for an oversized body). `Computation` covers unexpected
/// runtime failures (HTTP 500).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    /// The request carried no files.
    #[error("no files were uploaded")]
    EmptyUpload,

    /// No configured encoding produced a usable header line.
    #[error(
        "could not read file {file}: no header containing `{time_column}` and \
         `{production_column}` found (tried encodings: {})",
        tried.join(", ")
    )]
    Decoding {
        file: String,
        time_column: String,
        production_column: String,
        tried: Vec<String>,
    },

    /// The detected header lacks one or more required columns.
    #[error("missing required columns in file {file}: {}", missing.join(", "))]
    Schema { file: String, missing: Vec<String> },

    /// The file name does not carry a location field.
    #[error("invalid filename format: {file} (expected <prefix>_<location>_...)")]
    Naming { file: String },

    /// One or more timestamps do not match the configured format.
    #[error("error parsing time column in file {file} (expected {format}). Sample values: {samples:?}")]
    TimeParse {
        file: String,
        format: String,
        samples: Vec<String>,
    },

    /// A location's time span needs more chart points than allowed.
    #[error(
        "location {location} (files: {}) spans {first} to {last}: {points} chart points \
         at {bucket_minutes}-minute resolution exceed the limit of {limit}",
        files.join(", ")
    )]
    ChartSpan {
        location: String,
        files: Vec<String>,
        first: NaiveDateTime,
        last: NaiveDateTime,
        bucket_minutes: u32,
        points: u64,
        limit: u64,
    },

    /// The request was malformed before any file could be read.
    #[error("malformed upload: {0}")]
    Upload(String),

    /// The request body exceeds the configured upload limit.
    #[error("upload too large: {0}")]
    PayloadTooLarge(String),

    /// Unexpected failure while computing results.
    #[error("simulation failed: {0}")]
    Computation(String),
}

impl SimulationError {
    /// HTTP status code for this error class.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Computation(_) => 500,
            Self::PayloadTooLarge(_) => 413,
            _ => 400,
        }
    }

    /// Returns true for input-validation failures.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
