mod address;
mod capture;
mod classify;
mod dot11;
mod radio;
mod rawsocks;
mod render;
mod roster;
mod status;
#[cfg(test)]
mod test_utils;
mod topology;
mod util;
mod vendor;

use anyhow::{Context, Result};
use capture::{run_capture, Counters, LiveCapture, PcapReplay};
use crossterm::{cursor::Hide, cursor::Show, execute};
use itertools::Itertools;
use libc::EXIT_FAILURE;
use nix::unistd::geteuid;
use radio::{spawn_hopper, ChannelList, InterfaceControl, Nl80211Radio};
use render::{spawn_renderer, Dashboard, Palette};
use roster::Roster;
use status::{MessageLog, MessageType, StatusMessage};
use topology::TopologyStore;
use vendor::VendorDb;

use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clap::Parser;

const MAX_MESSAGES: usize = 500;

#[derive(Parser)]
#[command(name = "wifiwatch")]
#[command(author = "Ryan Butler (Ragnt)")]
#[command(about = "Watches which wifi clients talk to which access points.", long_about = None)]
#[command(version)]
struct Arguments {
    /// Interface to capture on.
    #[arg(default_value = "wlan0")]
    interface: String,

    #[arg(short, long, default_value = "known_devices.json")]
    /// Known devices roster (JSON).
    known: PathBuf,

    #[arg(short, long, default_value = "1-13")]
    /// Channels to hop across, e.g. "1,6,11" or "1-13,36,40".
    channels: ChannelList,

    #[arg(long, default_value_t = 2)]
    /// Seconds to dwell on each channel.
    hop_interval: u64,

    #[arg(long, default_value_t = 1000)]
    /// Milliseconds between screen refreshes.
    refresh_interval: u64,

    #[arg(short, long)]
    /// Optional - Replay a pcap file instead of capturing live.
    read: Option<PathBuf>,

    #[arg(long)]
    /// Disable colored roster tags.
    no_color: bool,

    #[arg(long)]
    /// Show vendor names from the OUI database.
    vendors: bool,

    #[arg(long)]
    /// Optional - Write diagnostic logs to this file.
    log_file: Option<PathBuf>,
}

fn init_tracing(path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Could not create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Arguments::parse();

    if cli.read.is_none() && !geteuid().is_root() {
        eprintln!("You need to run as root for live capture (or use --read <PCAP>).");
        exit(EXIT_FAILURE);
    }

    if let Some(ref path) = cli.log_file {
        init_tracing(path)?;
    }

    let log = Arc::new(MessageLog::new(MAX_MESSAGES));
    log.info("Starting...");

    let roster = Roster::load(&cli.known, &log);
    if roster.is_empty() {
        log.info("No known devices, nothing will be tagged");
    }
    let vendors = if cli.vendors {
        match VendorDb::load() {
            Ok(db) => Some(db),
            Err(e) => {
                log.warning(format!("Vendor database unavailable: {e}"));
                None
            }
        }
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    let store = Arc::new(TopologyStore::new());
    let counters = Arc::new(Counters::default());
    let current_channel = Arc::new(AtomicU8::new(0));

    let dashboard = Dashboard {
        interface: match cli.read {
            Some(ref path) => path.display().to_string(),
            None => cli.interface.clone(),
        },
        roster,
        palette: Palette {
            color: !cli.no_color,
        },
        vendors,
        counters: counters.clone(),
        current_channel: current_channel.clone(),
        log: log.clone(),
        started: Instant::now(),
    };

    let (dashboard, result) = match cli.read {
        Some(ref path) => {
            let result = replay(path, &store, &counters, &log, &running);
            (Some(dashboard), result)
        }
        None => live(
            &cli,
            dashboard,
            &store,
            &counters,
            &current_channel,
            &log,
            &running,
        ),
    };

    println!();
    if let Some(dashboard) = dashboard {
        print!("{}", dashboard.render(&store.snapshot()));
    }
    if let Err(ref e) = result {
        println!("Error: {e:#}");
    }
    result
}

fn replay(
    path: &Path,
    store: &TopologyStore,
    counters: &Counters,
    log: &MessageLog,
    running: &AtomicBool,
) -> Result<()> {
    let mut source = PcapReplay::open(path)
        .with_context(|| format!("Could not open capture file {}", path.display()))?;
    log.info(format!("Replaying {}", path.display()));
    run_capture(&mut source, store, counters, log, running, None)?;
    Ok(())
}

fn live(
    cli: &Arguments,
    dashboard: Dashboard,
    store: &Arc<TopologyStore>,
    counters: &Counters,
    current_channel: &Arc<AtomicU8>,
    log: &Arc<MessageLog>,
    running: &Arc<AtomicBool>,
) -> (Option<Dashboard>, Result<()>) {
    let mut radio = match Nl80211Radio::open(&cli.interface) {
        Ok(radio) => radio,
        Err(e) => {
            let err = anyhow::Error::new(e).context("Could not open interface");
            return (Some(dashboard), Err(err));
        }
    };

    log.info(format!("Putting {} into monitor mode", radio.name()));
    match radio.enable_monitor() {
        Ok(()) => log.add_message(StatusMessage::new(
            MessageType::Priority,
            format!("Capturing on {}", radio.name()),
        )),
        Err(e) => log.error(format!("Monitor mode: {e}")),
    }

    let mut source = match LiveCapture::open(radio.index()) {
        Ok(source) => source,
        Err(e) => {
            restore(&mut radio);
            let err = anyhow::Error::new(e).context("Could not open raw socket");
            return (Some(dashboard), Err(err));
        }
    };

    log.info(format!(
        "Setting channel hopper: {}",
        cli.channels.0.iter().join(", ")
    ));
    let hopper = spawn_hopper(
        Box::new(radio.channels()),
        cli.channels.0.clone(),
        Duration::from_secs(cli.hop_interval),
        running.clone(),
        current_channel.clone(),
        log.clone(),
    );

    execute!(stdout(), Hide).ok();
    let renderer = spawn_renderer(
        dashboard,
        store.clone(),
        Duration::from_millis(cli.refresh_interval),
        running.clone(),
    );

    let result = run_capture(
        &mut source,
        store,
        counters,
        log,
        running,
        Some(&mut radio as &mut dyn InterfaceControl),
    );
    running.store(false, Ordering::SeqCst);

    println!("Stopping threads");
    if hopper.join().is_err() {
        eprintln!("Channel hopper panicked");
    }
    let dashboard = renderer.join().ok();
    execute!(stdout(), Show).ok();

    restore(&mut radio);
    (dashboard, result.context("Capture stopped"))
}

fn restore(radio: &mut Nl80211Radio) {
    println!("Setting {} back to station mode.", radio.name());
    if let Err(e) = radio.restore() {
        eprintln!("Could not restore {}: {e}", radio.name());
    }
}
