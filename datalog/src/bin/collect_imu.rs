use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use datalog::{suggest_port, DevicePort, LogError, RawPipeline, RawSink, Session};

/// Log raw IMU lines from a serial device verbatim to a timestamped file.
#[derive(Parser)]
struct Opts {
    /// Serial port to open; discovered automatically when omitted.
    #[arg(long)]
    port: Option<String>,
    /// Must match the firmware's serial baud rate.
    #[arg(long, default_value_t = 9600)]
    baud: u32,
    /// Directory the timestamped file is created in.
    #[arg(long, default_value = ".")]
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

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .map_err(|e| LogError::Other(format!("could not install interrupt handler: {}", e)))?;

    let sink = RawSink::create(&opts.output_dir)?;
    info!(file = %sink.path().display(), "saving IMU data, press Ctrl+C to stop");

    let summary = Session::new(port, RawPipeline::new(sink), shutdown).run()?;

    info!(
        rows = summary.accepted,
        file = %summary.report.path.display(),
        bytes = summary.report.bytes,
        "data collection stopped"
    );
    Ok(())
}
