//! Battery energy storage simulation over uploaded production series.

#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
/// Upload decoding, header detection and series extraction.
pub mod ingest;
pub mod io;
pub mod pipeline;
pub mod progress;
/// Consumption synthesis, battery state machine and aggregation.
pub mod sim;
