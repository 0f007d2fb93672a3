// bluevery — desktop CLI
//
// Drives the bluevery scan scheduler against the host Bluetooth adapter.

mod ble;
mod config;

use anyhow::{Context, Result};
use ble::BtleplugCore;
use bluevery_core::{
    Bluevery, BlueveryError, BroadcastListeners, CharacteristicAddress, ScanOptions,
};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Bluetooth base UUID used to expand 16- and 32-bit short forms
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

#[derive(Parser)]
#[command(name = "bluevery")]
#[command(about = "bluevery — BLE scan scheduling", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan cycle and list what was found
    Scan {
        /// Delay before each burst, in milliseconds
        #[arg(short, long)]
        interval: Option<u64>,
        /// Number of bursts
        #[arg(short = 'n', long)]
        iterations: Option<u32>,
        /// Length of each burst, in seconds
        #[arg(short, long)]
        seconds: Option<u32>,
        /// Only report peripherals advertising this service (repeatable)
        #[arg(long = "service")]
        services: Vec<String>,
        /// Report repeated advertisements
        #[arg(long)]
        duplicates: bool,
    },
    /// Read a characteristic value
    Read {
        peripheral: String,
        service: String,
        characteristic: String,
    },
    /// Write a hex-encoded payload to a characteristic
    Write {
        peripheral: String,
        service: String,
        characteristic: String,
        payload: String,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;
    let _log_guard = init_tracing(cli.verbose, config.log_dir.as_deref())?;

    match cli.command {
        Commands::Scan {
            interval,
            iterations,
            seconds,
            services,
            duplicates,
        } => cmd_scan(config, interval, iterations, seconds, services, duplicates).await,
        Commands::Read {
            peripheral,
            service,
            characteristic,
        } => cmd_read(config, peripheral, service, characteristic).await,
        Commands::Write {
            peripheral,
            service,
            characteristic,
            payload,
        } => cmd_write(config, peripheral, service, characteristic, payload).await,
        Commands::Config { action } => cmd_config(config, action),
    }
}

/// Install the stderr subscriber and, when configured, a daily rolling file
fn init_tracing(verbose: bool, log_dir: Option<&str>) -> Result<Option<WorkerGuard>> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir))?;
            let appender = tracing_appender::rolling::daily(Path::new(dir), "bluevery.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn cmd_scan(
    config: config::Config,
    interval: Option<u64>,
    iterations: Option<u32>,
    seconds: Option<u32>,
    services: Vec<String>,
    duplicates: bool,
) -> Result<()> {
    let mut scan = config.scan.clone();
    if let Some(interval) = interval {
        scan.interval_length = interval;
    }
    if let Some(iterations) = iterations {
        scan.iterations = iterations;
    }
    if let Some(seconds) = seconds {
        scan.scanning_settings.seconds = seconds;
    }
    if !services.is_empty() {
        scan.scanning_settings.service_uuids = services
            .iter()
            .map(|s| parse_uuid(s))
            .collect::<Result<Vec<_>>>()?;
    }
    if duplicates {
        scan.scanning_settings.allow_duplicates = true;
    }
    let scan = ScanOptions::new(scan.scanning_settings, scan.interval_length, scan.iterations)?;

    let core = Arc::new(BtleplugCore::open(config.adapter_index).await?);
    let listeners = Arc::new(BroadcastListeners::new());
    let bridge = core.spawn_event_bridge(listeners.sender());
    let bluevery = Bluevery::new(core.clone(), listeners, config.bluevery_options());
    bluevery.init().await;

    println!("{}", "Scanning...".bold());
    println!(
        "  {} bursts of {}s, {}ms apart",
        scan.iterations, scan.scanning_settings.seconds, scan.interval_length
    );
    println!();

    let outcome = tokio::select! {
        result = bluevery.start_scan(scan) => ScanOutcome::from(result),
        _ = tokio::signal::ctrl_c() => ScanOutcome::Interrupted,
    };

    let peripherals = bluevery.discovered_peripherals();
    bluevery.stop_bluevery();
    bridge.abort();

    for line in outcome.report() {
        println!("{}", line);
    }

    println!();
    println!("{} ({})", "Peripherals".bold(), peripherals.len());
    if peripherals.is_empty() {
        println!("  {}", "(none found)".dimmed());
    } else {
        let mut peripherals = peripherals;
        peripherals.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        for p in peripherals {
            let rssi = p
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<20} {:>8}  {}",
                p.id.bright_cyan(),
                rssi,
                p.name.as_deref().unwrap_or("(unnamed)")
            );
        }
    }
    println!("  {} cached by the adapter", core.cached_count());

    Ok(())
}

/// How a `scan` command ended
#[derive(Debug)]
enum ScanOutcome {
    Completed,
    Failed(BlueveryError),
    /// Ctrl-C arrived before the cycle resolved
    Interrupted,
}

impl From<Result<(), BlueveryError>> for ScanOutcome {
    fn from(result: Result<(), BlueveryError>) -> Self {
        match result {
            Ok(()) => ScanOutcome::Completed,
            Err(e) => ScanOutcome::Failed(e),
        }
    }
}

impl ScanOutcome {
    fn report(&self) -> Vec<String> {
        match self {
            ScanOutcome::Completed => vec![format!("{} Scan cycle complete", "✓".green())],
            ScanOutcome::Interrupted => vec![format!(
                "{} Interrupted, scan cycle abandoned",
                "!".yellow()
            )],
            ScanOutcome::Failed(e) => {
                let mut lines = vec![format!("{} {}", "✗".red(), e)];
                if let Some(done) = e.completed_bursts() {
                    lines.push(format!("  {} bursts completed before the failure", done));
                }
                lines
            }
        }
    }
}

async fn cmd_read(
    config: config::Config,
    peripheral: String,
    service: String,
    characteristic: String,
) -> Result<()> {
    let address = CharacteristicAddress::new(
        peripheral,
        parse_uuid(&service)?,
        parse_uuid(&characteristic)?,
    );
    let bluevery = open_bluevery(&config).await?;

    let value = bluevery.read_value(&address).await?;
    println!("{} Read {} bytes from {}", "✓".green(), value.len(), address);
    println!("  {:<6} {}", "hex".bright_cyan(), hex::encode(&value));
    if let Ok(text) = std::str::from_utf8(&value) {
        if !text.is_empty() && text.chars().all(|c| !c.is_control()) {
            println!("  {:<6} {}", "utf8".bright_cyan(), text);
        }
    }
    Ok(())
}

async fn cmd_write(
    config: config::Config,
    peripheral: String,
    service: String,
    characteristic: String,
    payload: String,
) -> Result<()> {
    let address = CharacteristicAddress::new(
        peripheral,
        parse_uuid(&service)?,
        parse_uuid(&characteristic)?,
    );
    let bytes = parse_payload(&payload)?;
    let bluevery = open_bluevery(&config).await?;

    let confirmation = bluevery.write_value(&address, &bytes).await?;
    println!(
        "{} Wrote {} bytes to {}",
        "✓".green(),
        confirmation.bytes_written,
        address
    );
    Ok(())
}

fn cmd_config(mut config: config::Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else {
                anyhow::bail!("Unknown or unset config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<20} {}", key.bright_cyan(), value);
            }

            println!();
            println!(
                "  {}",
                config::Config::config_file()?.display().to_string().dimmed()
            );
        }
    }

    Ok(())
}

/// Façade for one-shot characteristic access; no listener traffic is needed
async fn open_bluevery(config: &config::Config) -> Result<Bluevery> {
    let core = Arc::new(BtleplugCore::open(config.adapter_index).await?);
    Ok(Bluevery::new(
        core,
        Arc::new(BroadcastListeners::new()),
        config.bluevery_options(),
    ))
}

/// Parse a full UUID or a 16/32-bit Bluetooth short form ("180d", "0x2a37")
fn parse_uuid(input: &str) -> Result<Uuid> {
    let trimmed = input.trim().trim_start_matches("0x");
    let expanded = match trimmed.len() {
        4 => format!("0000{}{}", trimmed, BASE_UUID_SUFFIX),
        8 => format!("{}{}", trimmed, BASE_UUID_SUFFIX),
        _ => trimmed.to_string(),
    };
    Uuid::parse_str(&expanded).with_context(|| format!("Invalid UUID: {}", input))
}

fn parse_payload(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    hex::decode(&cleaned).with_context(|| format!("Invalid hex payload: {}", input))
}
