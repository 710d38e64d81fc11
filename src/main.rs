//! BESS simulator entry point: CLI wiring for offline batches and the API server.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use bess_sim::config::EngineConfig;
use bess_sim::io::export::export_csv;
use bess_sim::pipeline::{SimulationOutput, Upload, run_batch};
use bess_sim::progress::ProgressReporter;

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    seed_override: Option<u64>,
    resolution_override: Option<u32>,
    inputs: Vec<String>,
    export_path: Option<String>,
    json: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    bind: Option<String>,
}

fn print_help() {
    eprintln!("bess-sim: battery energy storage simulation over PV production series");
    eprintln!();
    eprintln!("Usage: bess-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load engine configuration from a TOML file");
    eprintln!("  --seed <u64>             Seed for consumption synthesis");
    eprintln!("  --resolution <minutes>   Chart bucket width");
    eprintln!("  --input <path>           Simulate a CSV file offline (repeatable)");
    eprintln!("  --export <path>          Write the chart series of --input runs to CSV");
    eprintln!("  --json                   Print the result payload of --input runs as JSON");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start the HTTP API (default without --input)");
        eprintln!("  --bind <addr>            API bind address (default: server.bind)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Input file names must carry the location as an underscore-separated field,");
    eprintln!("e.g. pv_rome_2020.csv.");
}

/// Returns the value following the flag at `*i`, or exits.
fn flag_value(args: &[String], i: &mut usize, flag: &str, what: &str) -> String {
    *i += 1;
    if *i >= args.len() {
        eprintln!("error: {flag} requires {what}");
        process::exit(1);
    }
    args[*i].clone()
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        seed_override: None,
        resolution_override: None,
        inputs: Vec::new(),
        export_path: None,
        json: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        bind: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                cli.config_path = Some(flag_value(&args, &mut i, "--config", "a path argument"));
            }
            "--seed" => {
                let raw = flag_value(&args, &mut i, "--seed", "a u64 argument");
                if let Ok(s) = raw.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{raw}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--resolution" => {
                let raw = flag_value(&args, &mut i, "--resolution", "a minutes argument");
                match raw.parse::<u32>() {
                    Ok(m) if m > 0 => cli.resolution_override = Some(m),
                    _ => {
                        eprintln!("error: --resolution value \"{raw}\" must be a positive integer");
                        process::exit(1);
                    }
                }
            }
            "--input" => {
                cli.inputs.push(flag_value(&args, &mut i, "--input", "a path argument"));
            }
            "--export" => {
                cli.export_path = Some(flag_value(&args, &mut i, "--export", "a path argument"));
            }
            "--json" => {
                cli.json = true;
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--bind" => {
                cli.bind = Some(flag_value(&args, &mut i, "--bind", "an address argument"));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &CliArgs) -> EngineConfig {
    let mut config = match cli.config_path {
        Some(ref path) => match EngineConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        },
        None => EngineConfig::baseline(),
    };

    if let Some(seed) = cli.seed_override {
        config.consumption.seed = Some(seed);
    }
    if let Some(minutes) = cli.resolution_override {
        config.aggregation.bucket_minutes = minutes;
    }

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    config
}

fn read_inputs(paths: &[String]) -> Vec<Upload> {
    paths
        .iter()
        .map(|p| {
            let path = PathBuf::from(p);
            let bytes = fs::read(&path).unwrap_or_else(|e| {
                eprintln!("error: cannot read \"{p}\": {e}");
                process::exit(1);
            });
            let file_name = path
                .file_name()
                .map_or_else(|| p.clone(), |n| n.to_string_lossy().into_owned());
            Upload::new(file_name, bytes)
        })
        .collect()
}

fn run_offline(config: &EngineConfig, cli: &CliArgs) {
    let uploads = read_inputs(&cli.inputs);
    let output: SimulationOutput =
        match run_batch(config, &uploads, ProgressReporter::detached(), None) {
            Ok(out) => out,
            Err(e) => {
                eprintln!("error: {e}");
                process::exit(1);
            }
        };

    if cli.json {
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("error: failed to serialize results: {e}");
                process::exit(1);
            }
        }
    } else {
        for result in &output.data {
            println!("--- {} ({} points) ---", result.location, result.hourly_data.len());
            println!("{}\n", result.summary);
        }
    }

    if let Some(ref path) = cli.export_path {
        if let Err(e) = export_csv(&output.data, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path = %path, "chart series written");
    }
}

#[cfg(feature = "api")]
fn run_server(config: EngineConfig, bind: Option<&str>) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let raw = bind.unwrap_or(config.server.bind.as_str()).to_string();
    let addr: SocketAddr = raw.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid bind address \"{raw}\": {e}");
        process::exit(1);
    });

    let state = Arc::new(bess_sim::api::AppState::new(config));
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    if let Err(e) = rt.block_on(bess_sim::api::serve(state, addr)) {
        eprintln!("error: server stopped: {e}");
        process::exit(1);
    }
}

fn main() {
    let cli = parse_args();
    init_tracing();
    let config = load_config(&cli);

    if !cli.inputs.is_empty() {
        run_offline(&config, &cli);
    } else if cli.export_path.is_some() || cli.json {
        eprintln!("error: --export and --json require at least one --input");
        process::exit(1);
    }

    #[cfg(feature = "api")]
    if cli.serve || cli.inputs.is_empty() {
        run_server(config, cli.bind.as_deref());
    }

    #[cfg(not(feature = "api"))]
    if cli.inputs.is_empty() {
        print_help();
        process::exit(1);
    }
}
