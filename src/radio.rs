//! Interface mode and channel control over nl80211.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nl80211_ng::attr::Nl80211Iftype;
use nl80211_ng::{get_interface_info_idx, set_interface_chan, Interface, Nl80211};
use thiserror::Error;

use crate::status::MessageLog;
use crate::util::sleep_while_running;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RadioError {
    #[error("netlink: {0}")]
    Netlink(String),
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error("monitor mode not available for {0}")]
    MonitorUnsupported(String),
    #[error("{0} did not go into monitor mode")]
    NotInMonitor(String),
    #[error("invalid channel {0:?}")]
    InvalidChannel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Band {
    Band2GHz,
    Band5GHz,
}

impl Band {
    pub fn to_u8(self) -> u8 {
        match self {
            Band::Band2GHz => 2,
            Band::Band5GHz => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub band: Band,
    pub number: u8,
}

impl Channel {
    pub fn new(number: u8) -> Result<Self, RadioError> {
        let band = match number {
            1..=14 => Band::Band2GHz,
            32..=177 => Band::Band5GHz,
            _ => return Err(RadioError::InvalidChannel(number.to_string())),
        };
        Ok(Channel { band, number })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

/// Hop list from the command line: `1,6,11`, `1-13`, `1-11,36,40`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelList(pub Vec<Channel>);

impl FromStr for ChannelList {
    type Err = RadioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || RadioError::InvalidChannel(raw.to_string());
        let number = |part: &str| part.trim().parse::<u8>().map_err(|_| invalid());

        let mut channels = Vec::new();
        for part in raw.split(',').filter(|part| !part.trim().is_empty()) {
            let (first, last) = match part.split_once('-') {
                Some((first, last)) => (number(first)?, number(last)?),
                None => {
                    let single = number(part)?;
                    (single, single)
                }
            };
            if first > last {
                return Err(invalid());
            }
            for n in first..=last {
                let channel = Channel::new(n)?;
                if !channels.contains(&channel) {
                    channels.push(channel);
                }
            }
        }

        if channels.is_empty() {
            return Err(invalid());
        }
        Ok(ChannelList(channels))
    }
}

/// Mode switching for the capture interface.
pub trait InterfaceControl {
    fn enable_monitor(&mut self) -> Result<(), RadioError>;
    fn restore(&mut self) -> Result<(), RadioError>;
    /// Brings a downed interface back up without changing its mode.
    fn bring_up(&mut self) -> Result<(), RadioError>;
}

/// Channel switching, driven from the hopper thread.
pub trait ChannelControl: Send {
    fn set_channel(&mut self, channel: Channel) -> Result<(), RadioError>;
}

pub struct Nl80211Radio {
    netlink: Nl80211,
    interface: Interface,
    index: i32,
    name: String,
    was_monitor: bool,
}

impl Nl80211Radio {
    pub fn open(name: &str) -> Result<Self, RadioError> {
        let mut netlink = Nl80211::new().map_err(|e| RadioError::Netlink(format!("{e:?}")))?;

        let interface = netlink
            .get_interfaces()
            .iter()
            .find(|&(_, iface)| iface.name_as_string() == name)
            .map(|(_, iface)| iface.clone())
            .ok_or_else(|| RadioError::InterfaceNotFound(name.to_string()))?;

        let index = interface
            .index
            .ok_or_else(|| RadioError::InterfaceNotFound(name.to_string()))?;

        let mut was_monitor = false;
        if let Some(ref phy) = interface.phy {
            if !phy
                .iftypes
                .clone()
                .is_some_and(|types| types.contains(&Nl80211Iftype::IftypeMonitor))
            {
                return Err(RadioError::MonitorUnsupported(name.to_string()));
            }
            was_monitor = phy
                .current_iftype
                .as_ref()
                .is_some_and(|iftype| *iftype == Nl80211Iftype::IftypeMonitor);
        }

        Ok(Nl80211Radio {
            netlink,
            interface,
            index,
            name: name.to_string(),
            was_monitor,
        })
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> Nl80211Channels {
        Nl80211Channels { index: self.index }
    }

    fn active_monitor(&self) -> bool {
        self.interface
            .phy
            .as_ref()
            .and_then(|phy| phy.active_monitor)
            .unwrap_or(false)
    }
}

fn netlink_error<E: fmt::Debug>(e: E) -> RadioError {
    RadioError::Netlink(format!("{e:?}"))
}

impl InterfaceControl for Nl80211Radio {
    fn enable_monitor(&mut self) -> Result<(), RadioError> {
        if self.was_monitor {
            return Ok(());
        }
        let active = self.active_monitor();

        let mut result = self.netlink.set_interface_down(self.index).map_err(netlink_error);
        thread::sleep(Duration::from_millis(500));
        if result.is_ok() {
            result = self
                .netlink
                .set_interface_monitor(active, self.index)
                .map_err(netlink_error);
        }
        thread::sleep(Duration::from_millis(500));
        let up = self.netlink.set_interface_up(self.index).map_err(netlink_error);
        result?;
        up?;

        let interface = get_interface_info_idx(self.index).map_err(RadioError::Netlink)?;
        if let Some(ref phy) = interface.phy {
            if phy
                .current_iftype
                .as_ref()
                .is_some_and(|iftype| *iftype != Nl80211Iftype::IftypeMonitor)
            {
                return Err(RadioError::NotInMonitor(self.name.clone()));
            }
        }
        self.interface = interface;
        Ok(())
    }

    fn restore(&mut self) -> Result<(), RadioError> {
        if self.was_monitor {
            return Ok(());
        }
        let mut result = self.netlink.set_interface_down(self.index).map_err(netlink_error);
        if result.is_ok() {
            result = self
                .netlink
                .set_interface_station(self.index)
                .map_err(netlink_error);
        }
        let up = self.netlink.set_interface_up(self.index).map_err(netlink_error);
        result.and(up)
    }

    fn bring_up(&mut self) -> Result<(), RadioError> {
        self.netlink
            .set_interface_up(self.index)
            .map_err(netlink_error)
    }
}

pub struct Nl80211Channels {
    index: i32,
}

impl ChannelControl for Nl80211Channels {
    fn set_channel(&mut self, channel: Channel) -> Result<(), RadioError> {
        set_interface_chan(self.index, channel.number, channel.band.to_u8())
            .map_err(|e| RadioError::Netlink(format!("{e}")))
    }
}

/// Rotates through `channels`, dwelling `hop_interval` on each one that
/// could be set. Failed channels are logged and skipped; if a whole cycle
/// fails the hopper waits one interval before trying again.
pub fn spawn_hopper(
    mut control: Box<dyn ChannelControl>,
    channels: Vec<Channel>,
    hop_interval: Duration,
    running: Arc<AtomicBool>,
    current_channel: Arc<AtomicU8>,
    log: Arc<MessageLog>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        if channels.is_empty() {
            return;
        }
        let mut failures_in_a_row = 0usize;

        for channel in channels.iter().cycle() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match control.set_channel(*channel) {
                Ok(()) => {
                    failures_in_a_row = 0;
                    current_channel.store(channel.number, Ordering::SeqCst);
                    if !sleep_while_running(&running, hop_interval) {
                        break;
                    }
                }
                Err(e) => {
                    log.error(format!("Channel {channel}: {e}"));
                    failures_in_a_row += 1;
                    if failures_in_a_row >= channels.len() {
                        failures_in_a_row = 0;
                        if !sleep_while_running(&running, hop_interval) {
                            break;
                        }
                    }
                }
            }
        }
    })
}
