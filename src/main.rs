//! AnugaNav - Teach-and-repeat mission controller
//!
//! Connects to a JalaIO vehicle control daemon, replays a recorded track
//! log, and pauses at recorded inspection points to visually confirm the
//! expected object classes before continuing.

use anuga_nav::config::AnugaConfig;
use anuga_nav::error::Result;
use anuga_nav::link::JalaClient;
use anuga_nav::replay::{MissionOutcome, ReplayController};
use anuga_nav::shared::MissionState;
use anuga_nav::telemetry::TelemetryReceiver;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("anuga_nav=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let mut config = if let Some(path) = flag_value(&args, "--config", "-c") {
        info!("Loading configuration from {}", path);
        AnugaConfig::load(Path::new(&path))?
    } else if Path::new("anuga.toml").exists() {
        info!("Loading configuration from anuga.toml");
        AnugaConfig::load(Path::new("anuga.toml"))?
    } else {
        info!("Using default configuration");
        AnugaConfig::default()
    };

    // Override vehicle IP if provided
    if let Some(ip) = flag_value(&args, "--vehicle", "-v") {
        info!("Using vehicle IP: {}", ip);
        config.connection.vehicle_ip = ip;
    }

    // First positional argument overrides the configured track log path
    if let Some(path) = positional(&args) {
        config.tracklog.path = path;
    }

    info!("AnugaNav v{}", env!("CARGO_PKG_VERSION"));

    // Initialize shared state and signal handling
    let shared = Arc::new(MissionState::new());

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(anuga_nav::AnugaError::Connection)?;
    let signal_state = Arc::clone(&shared);
    std::thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                warn!("Received signal {}, shutting down", sig);
                signal_state.signal_shutdown();
            }
        })
        .expect("Failed to spawn signal thread");

    // Connect to JalaIO
    let addr = config.address();
    info!("Connecting to JalaIO at {}", addr);
    let timeout = Duration::from_millis(config.connection.timeout_ms);
    let client = JalaClient::connect_timeout(&addr, timeout)?;

    // Build the controller and load the track log before any motion
    let mut controller = ReplayController::new(client, Arc::clone(&shared), &config);
    controller.load_tracklog(Path::new(&config.tracklog.path))?;

    // Spawn telemetry thread
    let mut receiver = TelemetryReceiver::bind(config.connection.port, Arc::clone(&shared))?;
    let telemetry_handle = std::thread::Builder::new()
        .name("telemetry".into())
        .spawn(move || receiver.run())
        .expect("Failed to spawn telemetry thread");

    // Run the mission
    let result = controller.run();

    // Signal shutdown and wait for the telemetry thread
    shared.signal_shutdown();
    if let Err(e) = telemetry_handle.join() {
        error!("Telemetry thread panicked: {:?}", e);
    }

    let report = result?;

    info!(
        "Mission summary: {} points driven, {} inspections confirmed, {} timed out, {} inconclusive",
        report.points_driven,
        report.confirmed_count(),
        report.timed_out_count(),
        report.inconclusive_count()
    );

    match report.outcome {
        MissionOutcome::Completed => info!("Mission completed"),
        MissionOutcome::Cancelled => warn!("Mission cancelled by operator"),
    }

    Ok(())
}

/// Find the value following `--flag` or its short form.
fn flag_value(args: &[String], long: &str, short: &str) -> Option<String> {
    args.iter()
        .position(|a| a == long || a == short)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

/// First positional argument (not a flag, not a flag value).
fn positional(args: &[String]) -> Option<String> {
    let mut skip_next = false;
    for arg in &args[1..] {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg.starts_with('-') {
            skip_next = true;
            continue;
        }
        return Some(arg.clone());
    }
    None
}
