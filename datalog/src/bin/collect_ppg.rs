use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use datalog::{suggest_port, CsvSink, DevicePort, LogError, PpgPipeline, Session};

/// Log heart-rate/SpO2 readings from a PPG sensor into a timestamped CSV.
#[derive(Parser)]
struct Opts {
    /// Serial port to open; discovered automatically when omitted.
    #[arg(long)]
    port: Option<String>,
    /// Must match the firmware's serial baud rate.
    #[arg(long, default_value_t = 115_200)]
    baud: u32,
    /// Directory the timestamped CSV file is created in.
    #[arg(long, default_value = "./dataset")]
    output_dir: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Opts::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(opts: Opts) -> Result<(), LogError> {
    let port_name = match opts.port {
        Some(p) => p,
        None => suggest_port()?.ok_or_else(|| {
            LogError::Connection("no known serial device found, pass --port".to_string())
        })?,
    };

    let port = DevicePort::open(&port_name, opts.baud)?;
    // Give the board time to come out of its open-triggered reset.
    thread::sleep(Duration::from_secs(2));

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .map_err(|e| LogError::Other(format!("could not install interrupt handler: {}", e)))?;

    let sink = CsvSink::create(&opts.output_dir)?;
    info!(file = %sink.path().display(), "saving PPG data, press Ctrl+C to stop");
    info!("place finger on sensor and wait for readings");

    let summary = Session::new(port, PpgPipeline::new(sink), shutdown)
        .with_startup_skip()
        .run()?;

    info!(
        rows = summary.accepted,
        file = %summary.report.path.display(),
        bytes = summary.report.bytes,
        "data collection stopped"
    );
    Ok(())
}
