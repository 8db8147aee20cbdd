use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, warn};
use rewind::configuration::Config;
use rewind::data_capture::{run_capture, CaptureEngine, CaptureLimits, CaptureStats, ReplaySource};
use rewind::error_handling::types::{CaptureError, ConfigError};
use rewind::network::ConnectionFilter;
use rewind::observability::{init_logging, MetricsRecorder};
use rewind::sanitization::PiiSanitizer;
use rewind::storage::{export_sessions, FileStorage, Storage};

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "rewind")]
#[command(version)]
#[command(about = "Reconstructs HTTP sessions from captured TCP traffic")]
struct Args {
    /// TOML configuration file. Defaults are used when it cannot be read.
    #[arg(long, env = "REWIND_CONFIG", default_value = "config/config.toml")]
    config: PathBuf,

    /// Recorded capture events (JSON lines). Overrides `capture.input_file`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Export directory. Overrides `capture.output_directory`.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let (mut config, config_error) = match Config::from_file(&args.config) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    if let Some(input) = args.input {
        config.capture.input_file = Some(input);
    }
    if let Some(dir) = args.output_dir {
        config.capture.output_directory = dir;
    }

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Unable to initialize logging: {}", e);
    }
    match config_error {
        None => info!("Configuration imported from {}", args.config.display()),
        Some(e) => warn!(
            "Unable to import configuration from {}: {}, using defaults",
            args.config.display(),
            e
        ),
    }

    match run(config).await {
        Ok(stats) => print_summary(&stats),
        Err(e) => {
            error!("{}, exiting...", e);
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<CaptureStats, CaptureError> {
    let input = config.capture.input_file.clone().ok_or_else(|| {
        ConfigError::BadValue("no input file given (capture.input_file or --input)".to_string())
    })?;
    let source = ReplaySource::open(&input)?;
    let storage = FileStorage::new(&config.capture.output_directory, &config.capture.output_file)?;
    let sanitizer = config
        .sanitization
        .to_policy()
        .map(PiiSanitizer::new)
        .transpose()
        .map_err(|e| ConfigError::BadValue(format!("invalid redaction pattern: {}", e)))?;

    let metrics = MetricsRecorder::new(config.metrics.enabled);
    let mut engine = CaptureEngine::new(ConnectionFilter::new(&config.filters.ports), metrics);
    let limits = CaptureLimits::from_config(&config.capture);

    // Second consumer: reads point-in-time snapshots while the capture thread writes.
    let snapshots = engine.snapshots();
    let monitor = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SNAPSHOT_INTERVAL);
        loop {
            interval.tick().await;
            let active = snapshots.active_count();
            metrics.set_active_sessions(active);
            debug!(
                "{} session(s), {} active",
                snapshots.session_count(),
                active
            );
        }
    });

    let capture = tokio::task::spawn_blocking(move || {
        let reason = run_capture(&mut engine, source, &limits);
        (engine, reason)
    });
    let joined = capture.await;
    monitor.abort();

    let (mut engine, reason) =
        joined.map_err(|e| CaptureError::Io(std::io::Error::other(e)))?;
    let reason = reason?;
    info!("Capture stopped: {}", reason);

    engine.shutdown();
    let sessions = engine.snapshots().snapshot();
    let document = export_sessions(&sessions, sanitizer.as_ref(), &config.body_policy());
    storage.save_export(&document)?;

    Ok(engine.stats())
}

fn print_summary(stats: &CaptureStats) {
    println!("==================== Capture summary ====================");
    println!("  packets processed : {}", stats.packets_processed);
    println!("  HTTP messages     : {}", stats.http_messages);
    println!("    requests        : {}", stats.http_requests);
    println!("    responses       : {}", stats.http_responses);
    println!("  dropped packets   : {}", stats.dropped_packets);
    println!("  errors            : {}", stats.errors);
    println!("=========================================================");
}
