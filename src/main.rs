use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use trng_logger::{
    enumerate_ports, env_file_path, load_env_file, locate, logging, Acquisition,
    AcquisitionError, CaptureSink, ConfigArgs, SystemClock, TrngSession,
};

#[derive(Parser, Debug)]
#[command(
    name = "trng-logger",
    about = "Sample a TrueRNG at a fixed interval and log raw bytes plus bit counts"
)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,
    /// Open this serial port instead of searching for a TrueRNG
    #[arg(long)]
    port: Option<String>,
    /// List serial ports with their hardware ids and exit
    #[arg(long)]
    list_devices: bool,
    /// Log level (error, warn, info, debug, trace); overrides TRNG_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    // Fill unset variables from the settings file before clap reads them
    let env_file = env_file_path();
    let loaded = load_env_file(&env_file)?;

    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());
    if loaded {
        info!("Loaded settings from {}", env_file.display());
    }

    if args.list_devices {
        return list_devices();
    }

    // 1. Configuration and output directory, before touching any device
    let config = args.config.resolve()?;
    let sink = CaptureSink::create(&config.temp_folder).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.temp_folder.display()
        )
    })?;

    // 2. Discovery
    let port = match args.port {
        Some(port) => port,
        None => match locate(&enumerate_ports()?) {
            Some(device) => device.port,
            None => {
                warn!("{}. Exiting.", AcquisitionError::DeviceNotFound);
                return Ok(());
            }
        },
    };

    // 3. Session
    let session = TrngSession::open(&port)?;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    // 4. Acquisition
    info!(
        "Sampling {} bits every {}s into {} (new files every {}s)",
        config.sample_bits,
        config.interval_secs,
        sink.dir().display(),
        config.sample_duration_secs
    );
    let mut acquisition = Acquisition::new(&config, session, sink, SystemClock);
    let summary = acquisition.run(&running)?;
    println!(
        "Done. {} sample(s), {} bytes, {} capture window(s).",
        summary.ticks, summary.bytes, summary.windows
    );
    Ok(())
}

fn list_devices() -> Result<()> {
    let ports = enumerate_ports().context("Failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in &ports {
        match port.model() {
            Some(model) => println!("{}\t{}\t{}", port.name, port.hardware_id, model.name()),
            None => println!("{}\t{}", port.name, port.hardware_id),
        }
    }
    Ok(())
}
