use std::fmt::Write;
use std::io::stdout;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::style::Stylize;
use crossterm::{cursor::MoveTo, execute, terminal, terminal::ClearType};
use itertools::Itertools;

use crate::address::HardwareAddress;
use crate::capture::Counters;
use crate::roster::Roster;
use crate::status::MessageLog;
use crate::topology::{Snapshot, TopologyStore};
use crate::util::{format_elapsed, sleep_while_running};
use crate::vendor::VendorDb;

const RECENT_MESSAGES: usize = 5;

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub color: bool,
}

impl Palette {
    pub fn ap_tag(&self, alias: &str) -> String {
        let tag = format!(" [*{alias}*]");
        if self.color {
            tag.cyan().to_string()
        } else {
            tag
        }
    }

    pub fn client_tag(&self, alias: &str) -> String {
        let tag = format!(" [*{alias}*]");
        if self.color {
            tag.green().to_string()
        } else {
            tag
        }
    }
}

fn section(title: &str, count: usize) -> String {
    format!("=== {title} ({count}) ===")
}

/// Text listing of every AP and client, annotated against the roster.
pub fn render_topology(
    snapshot: &Snapshot,
    roster: &Roster,
    palette: Palette,
    vendors: Option<&VendorDb>,
) -> String {
    let mut output = String::new();
    let vendor = |addr: &HardwareAddress| -> String {
        vendors
            .and_then(|db| db.lookup(addr))
            .map(|name| format!(" <{name}>"))
            .unwrap_or_default()
    };
    let ap_tag = |addr: &HardwareAddress| -> String {
        roster
            .ap_group(addr)
            .map(|alias| palette.ap_tag(alias))
            .unwrap_or_default()
    };

    writeln!(output, "{}", section("Access Points", snapshot.access_points.len())).ok();
    for ap in &snapshot.access_points {
        writeln!(
            output,
            "{} ({}){}{}",
            ap.ssid,
            ap.bssid,
            vendor(&ap.bssid),
            ap_tag(&ap.bssid)
        )
        .ok();
    }

    writeln!(output).ok();
    writeln!(output, "{}", section("Clients", snapshot.clients.len())).ok();
    for client in &snapshot.clients {
        let mut line = format!("{}{}", client.station, vendor(&client.station));
        if let Some(alias) = roster.client_alias(&client.station) {
            line.push_str(&palette.client_tag(alias));
        }

        match client.ap {
            Some(ap) => {
                let target = match snapshot.access_point(&ap) {
                    Some(known) => format!("{} ({})", known.ssid, ap),
                    None => ap.to_string(),
                };
                write!(line, " --> {}{}", target, ap_tag(&ap)).ok();
            }
            None => {
                write!(line, " --> [Not associated]").ok();
            }
        }

        if !client.probes.is_empty() {
            write!(line, "  probes: {}", client.probes.iter().join(", ")).ok();
        }
        writeln!(output, "{line}").ok();
    }

    output
}

/// Full-screen view: status bar, topology and the message tail.
pub struct Dashboard {
    pub interface: String,
    pub roster: Roster,
    pub palette: Palette,
    pub vendors: Option<VendorDb>,
    pub counters: Arc<Counters>,
    pub current_channel: Arc<AtomicU8>,
    pub log: Arc<MessageLog>,
    pub started: Instant,
}

impl Dashboard {
    pub fn status_bar(&self) -> String {
        let counts = self.counters.snapshot();
        let channel = match self.current_channel.load(Ordering::SeqCst) {
            0 => "-".to_string(),
            n => n.to_string(),
        };
        format!(
            "{} | {} | Ch {} | Frames: {} Beacons: {} Probes: {} Assoc/Auth: {} Data: {} Ignored: {} Errors: {}",
            self.interface,
            format_elapsed(self.started.elapsed()),
            channel,
            counts.frames,
            counts.beacons,
            counts.probe_requests,
            counts.associations,
            counts.data,
            counts.ignored,
            counts.decode_errors,
        )
    }

    pub fn render(&self, snapshot: &Snapshot) -> String {
        let mut output = String::new();
        writeln!(output, "{}", self.status_bar()).ok();
        writeln!(output).ok();
        output.push_str(&render_topology(
            snapshot,
            &self.roster,
            self.palette,
            self.vendors.as_ref(),
        ));

        writeln!(output).ok();
        writeln!(output, "=== Messages ===").ok();
        let mut recent = self.log.get_recent_messages(RECENT_MESSAGES);
        recent.reverse();
        for message in recent {
            writeln!(
                output,
                "{}: ({}) {}",
                message.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                message.message_type,
                message.content
            )
            .ok();
        }
        output
    }

    pub fn draw(&self, snapshot: &Snapshot) {
        let output = self.render(snapshot);
        execute!(stdout(), MoveTo(0, 0)).ok();
        execute!(stdout(), terminal::Clear(ClearType::All)).ok();
        print!("{output}");
    }
}

/// Redraws the dashboard every `refresh` until `running` clears.
pub fn spawn_renderer(
    dashboard: Dashboard,
    store: Arc<TopologyStore>,
    refresh: Duration,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<Dashboard> {
    thread::spawn(move || {
        while sleep_while_running(&running, refresh) {
            dashboard.draw(&store.snapshot());
        }
        dashboard
    })
}
