use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use pedalog_lib::{DeviceIdentity, ErrorKind, Pedalog, Reading, SessionConfig};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Read power telemetry from Pedalog pedal-power meters.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    session: SessionArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// USB transfer timeout in milliseconds.
    #[arg(long, global = true, default_value_t = 1000)]
    timeout_ms: u64,
    /// Bus rescans after a failed read before a device is considered present.
    #[arg(long, global = true, default_value_t = 1)]
    reconnect_attempts: u32,
    /// Pause between rescans in milliseconds.
    #[arg(long, global = true, default_value_t = 250)]
    reconnect_delay_ms: u64,
    /// Do not query serial numbers (for firmware without the serial command).
    #[arg(long, global = true)]
    no_serial: bool,
}

impl From<&SessionArgs> for SessionConfig {
    fn from(args: &SessionArgs) -> Self {
        SessionConfig::default()
            .with_timeout(Duration::from_millis(args.timeout_ms))
            .with_reconnect(args.reconnect_attempts, Duration::from_millis(args.reconnect_delay_ms))
            .with_query_serial(!args.no_serial)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached devices.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Poll a device and print its readings.
    Read {
        /// Serial number of the device to read; defaults to the first one found.
        #[arg(short = 'n', long)]
        serial: Option<u32>,
        /// Run continuously until interrupted.
        #[arg(short, long)]
        continuous: bool,
        /// Number of samples to fetch if not running continuously.
        #[arg(short, long, default_value_t = 10)]
        samples: u32,
        /// Polling interval in milliseconds.
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
        /// Print one JSON object per reading.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli.verbose, cli.log_file.as_deref())?;

    if let Err(e) = run(&cli) {
        error!("Application failed: {:?}", e);
        return Err(e);
    }
    Ok(())
}

fn init_logging(verbose: &Verbosity<InfoLevel>, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::builder()
        .with_default_directive(verbose.tracing_level_filter().into())
        .from_env_lossy();
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let file_name = path.file_name().context("log file path has no file name")?;
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

fn run(cli: &Cli) -> Result<()> {
    let pedalog = Pedalog::init()
        .context("failed to initialise USB")?
        .with_config(SessionConfig::from(&cli.session));

    match &cli.command {
        Commands::List { json } => list(&pedalog, *json),
        Commands::Read {
            serial,
            continuous,
            samples,
            interval_ms,
            json,
        } => read(
            &pedalog,
            *serial,
            *continuous,
            *samples,
            Duration::from_millis(*interval_ms),
            *json,
        ),
    }
}

fn list(pedalog: &Pedalog<pedalog_lib::NusbTransport>, json: bool) -> Result<()> {
    let devices = pedalog.enumerate();
    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }
    if devices.is_empty() {
        println!("No Pedalog devices found.");
    }
    for (index, identity) in devices.iter().enumerate() {
        println!("Device #{}: {}", index + 1, identity);
    }
    Ok(())
}

fn find_device(devices: &[DeviceIdentity], serial: Option<u32>) -> Option<DeviceIdentity> {
    match serial {
        Some(serial) => devices.iter().copied().find(|d| d.serial() == serial),
        None => devices.first().copied(),
    }
}

fn read(
    pedalog: &Pedalog<pedalog_lib::NusbTransport>,
    serial: Option<u32>,
    continuous: bool,
    samples: u32,
    interval: Duration,
    json: bool,
) -> Result<()> {
    let Some(mut identity) = find_device(&pedalog.enumerate(), serial) else {
        bail!(ErrorKind::NoDeviceFound);
    };
    info!("Reading from {}", identity);

    let mut remaining = samples;
    while continuous || remaining > 0 {
        match pedalog.read(&identity) {
            Ok(reading) => print_reading(&reading, json)?,
            Err(ErrorKind::NoDeviceFound) => {
                warn!("{}: {}", identity, ErrorKind::NoDeviceFound);
                match find_device(&pedalog.enumerate(), serial) {
                    Some(found) => identity = found,
                    None if continuous => info!("Waiting for the device to come back..."),
                    None => bail!(ErrorKind::NoDeviceFound),
                }
            }
            Err(kind) => warn!("{}: {}", identity, kind),
        }
        remaining = remaining.saturating_sub(1);
        if continuous || remaining > 0 {
            sleep(interval);
        }
    }
    Ok(())
}

fn print_reading(reading: &Reading, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(reading)?);
    } else {
        println!("{reading}");
    }
    Ok(())
}
