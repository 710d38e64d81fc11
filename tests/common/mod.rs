//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use bess_sim::config::{BucketShape, EngineConfig};

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "bess-sim-test-boundary";

/// A PV export for one location: metadata lines, a header, `hours` hourly
/// rows from midnight of `date` with constant production, and a footer.
pub fn pv_export(date: &str, hours: u32, production_wh: f64) -> Vec<u8> {
    let mut text = String::from(
        "Latitude (decimal degrees):\t41.892\n\
         Longitude (decimal degrees):\t12.511\n\
         Radiation database:\tPVGIS-SARAH2\n\
         \n\
         time;P_Wh;G(i);H_sun;T2m;WS10m;Int\n",
    );
    for h in 0..hours {
        text.push_str(&format!("{date}T{h:02}:00:00;{production_wh};0.0;0.0;12.3;1.5;0\n"));
    }
    text.push_str("\nP_Wh: PV system power (Wh)\nG(i): Global irradiance (W/m2)\n");
    text.into_bytes()
}

/// Baseline configuration with a fixed consumption seed.
pub fn seeded_config(seed: u64) -> EngineConfig {
    let mut config = EngineConfig::baseline();
    config.consumption.seed = Some(seed);
    config
}

/// Configuration whose synthesized consumption is 0 for every hour.
pub fn zero_consumption_config() -> EngineConfig {
    let mut config = seeded_config(1);
    config.consumption.std_dev = 0.0;
    config.consumption.buckets.clear();
    config.consumption.fallback = BucketShape {
        mean: 0.0,
        min: 0.0,
        max: 0.0,
    };
    config
}

/// Builds a `multipart/form-data` body with one `files` part per entry.
///
/// Returns `(content_type, body)`.
pub fn multipart_body(files: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for (name, bytes) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                 filename=\"{name}\"\r\nContent-Type: text/csv\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
