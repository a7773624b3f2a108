//! notirelay - device notification relay
//!
//! Reads raw notifications as JSON lines and relays each one to the
//! collection server configured in `~/.config/notirelay/config.toml`.
//!
//! Input lines look like:
//!
//! ```text
//! {"packageName":"com.example.chat","postTime":1705312800000,"extras":{"android.title":"Hi"}}
//! ```
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/notirelay/config.toml (~/.config/notirelay/config.toml)
//! - Device id: $XDG_DATA_HOME/notirelay/device_id (~/.local/share/notirelay/device_id)
//! - Logs: $XDG_STATE_HOME/notirelay/ (~/.local/state/notirelay/) with `-v`,
//!   otherwise failed deliveries are logged to stderr

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use notirelay_core::logging::{self, LogOutput};
use notirelay_core::relay::{codec, HttpDeliveryClient, IngestionQueue};
use notirelay_core::{CaptureListener, Config, RawEvent, RecordBuilder};

#[derive(Parser)]
#[command(name = "notirelay")]
#[command(about = "Relay captured device notifications to a collection server")]
#[command(version)]
struct Args {
    /// Write full logs to the state directory instead of failures to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show relay configuration and server reachability
    Status,

    /// Relay raw notifications read as JSON lines
    Relay {
        /// Read events from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Start with capture switched off (events are read but not relayed)
        #[arg(long)]
        no_listen: bool,
    },

    /// Print the wire JSON for each raw notification without sending it
    Encode {
        /// Read events from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let output = if args.verbose {
        LogOutput::File
    } else {
        LogOutput::Stderr
    };
    let _log_guard =
        logging::init(&config.logging, output).context("failed to initialize logging")?;

    match args.command {
        Command::Status => cmd_status(&config),
        Command::Relay { input, no_listen } => cmd_relay(&config, input.as_deref(), no_listen),
        Command::Encode { input } => cmd_encode(&config, input.as_deref()),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create runtime")
}

fn open_input(input: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Parse each non-blank line, skipping (and logging) ones that are not raw events.
fn for_each_event(input: Option<&Path>, mut handle: impl FnMut(RawEvent)) -> Result<usize> {
    let mut skipped = 0;
    for (index, line) in open_input(input)?.lines().enumerate() {
        let line = line.context("failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawEvent>(&line) {
            Ok(raw) => handle(raw),
            Err(e) => {
                skipped += 1;
                tracing::warn!(line = index + 1, error = %e, "Skipping unreadable event");
                eprintln!("line {}: skipped ({})", index + 1, e);
            }
        }
    }
    Ok(skipped)
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Notification Relay Configuration");
    println!("================================");
    println!();

    let delivery = &config.delivery;
    let device_id = config.device_id().context("failed to resolve device id")?;

    println!("Device ID:       {}", device_id);
    println!("Listening:       {}", config.capture.listening);
    println!("Enabled:         {}", delivery.enabled);
    println!(
        "Server URL:      {}",
        delivery.server_url.as_deref().unwrap_or("<not set>")
    );
    println!("Endpoint:        {}", delivery.endpoint_path);
    println!("Timeout:         {}s", delivery.timeout_secs);
    println!(
        "Success Status:  {}-{}",
        delivery.success_status_min, delivery.success_status_max
    );

    println!();
    if !delivery.is_ready() {
        println!("Status: Not ready (delivery disabled or server_url missing)");
        println!();
        println!("Configure the server in config.toml:");
        println!();
        println!("  [delivery]");
        println!("  server_url = \"http://10.0.2.2:8080\"");
        return Ok(());
    }

    let client = HttpDeliveryClient::new(delivery).context("invalid delivery configuration")?;
    let reachable = runtime()?.block_on(client.health_check());
    if reachable {
        println!("Status: Ready (server reachable)");
    } else {
        println!("Status: Ready (server not reachable at the moment)");
    }

    Ok(())
}

fn cmd_relay(config: &Config, input: Option<&Path>, no_listen: bool) -> Result<()> {
    if !config.delivery.is_ready() {
        bail!("delivery is not configured. Run 'status' for details.");
    }

    let client =
        HttpDeliveryClient::new(&config.delivery).context("invalid delivery configuration")?;
    let builder = RecordBuilder::new(config.device_id().context("failed to resolve device id")?)?;

    let runtime = runtime()?;
    // The queue spawns its drain task on this runtime; reading stays on the main thread
    let _enter = runtime.enter();
    let queue = IngestionQueue::with_tracing(Arc::new(client));
    let listener = CaptureListener::new(builder, queue, config.capture.listening && !no_listen);

    let mut read = 0;
    let mut relayed = 0;
    let skipped = for_each_event(input, |raw| {
        read += 1;
        if listener.on_event_posted(&raw) {
            relayed += 1;
        }
    })?;

    runtime.block_on(listener.queue().wait_idle());

    let stats = listener.queue().stats();
    println!("Read:               {}", read);
    println!("Skipped:            {}", skipped);
    println!("Relayed:            {}", relayed);
    println!("Delivered:          {}", stats.delivered);
    println!("Rejected:           {}", stats.rejected);
    println!("Transport failures: {}", stats.transport_failures);
    println!("Encoding failures:  {}", stats.encoding_failures);

    Ok(())
}

fn cmd_encode(config: &Config, input: Option<&Path>) -> Result<()> {
    let builder = RecordBuilder::new(config.device_id().context("failed to resolve device id")?)?;

    let mut failure = None;
    for_each_event(input, |raw| {
        let record = builder.build(&raw);
        match codec::encode(&record).and_then(|wire| codec::to_json(&wire)) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("{}: {}", record.source_id(), e);
                failure.get_or_insert(e);
            }
        }
    })?;

    match failure {
        Some(e) => Err(e).context("some events could not be encoded"),
        None => Ok(()),
    }
}
