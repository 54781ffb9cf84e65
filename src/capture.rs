use std::fs::File;
use std::io::{self, BufReader};
use std::os::fd::OwnedFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use pcap_file::pcap::PcapReader;
use pcap_file::DataLink;
use thiserror::Error;
use tracing::instrument;

use crate::classify::{classify, TopologyUpdate};
use crate::dot11::{
    decode, DecodeError, LinkType, SUBTYPE_ASSOC_REQUEST, SUBTYPE_AUTHENTICATION, SUBTYPE_BEACON,
    SUBTYPE_PROBE_REQUEST, SUBTYPE_REASSOC_REQUEST, TYPE_DATA, TYPE_MANAGEMENT,
};
use crate::radio::InterfaceControl;
use crate::rawsocks::{open_socket_rx, read_frame};
use crate::status::MessageLog;
use crate::topology::TopologyStore;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("socket: {0}")]
    Io(#[from] io::Error),
    #[error("network down")]
    NetworkDown,
    #[error("pcap: {0}")]
    Pcap(String),
    #[error("unsupported capture link type {0}")]
    UnsupportedLink(String),
}

pub enum Captured {
    Frame(Vec<u8>),
    /// Nothing waiting right now.
    Idle,
    /// The source has no more frames.
    Exhausted,
}

pub trait FrameSource {
    fn link_type(&self) -> LinkType;
    fn next_frame(&mut self) -> Result<Captured, CaptureError>;
}

/// Frames straight off the monitor interface.
pub struct LiveCapture {
    socket: OwnedFd,
}

impl LiveCapture {
    pub fn open(ifindex: i32) -> Result<Self, CaptureError> {
        Ok(LiveCapture {
            socket: open_socket_rx(ifindex)?,
        })
    }
}

impl FrameSource for LiveCapture {
    fn link_type(&self) -> LinkType {
        LinkType::Radiotap
    }

    fn next_frame(&mut self) -> Result<Captured, CaptureError> {
        match read_frame(&self.socket) {
            Ok(packet) if packet.is_empty() => Ok(Captured::Idle),
            Ok(packet) => Ok(Captured::Frame(packet)),
            Err(e) if e.raw_os_error() == Some(libc::ENETDOWN) => Err(CaptureError::NetworkDown),
            Err(e) => Err(CaptureError::Io(e)),
        }
    }
}

/// Frames from a pcap file, in file order.
pub struct PcapReplay {
    reader: PcapReader<BufReader<File>>,
    link: LinkType,
}

impl PcapReplay {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let file = File::open(path)?;
        let reader =
            PcapReader::new(BufReader::new(file)).map_err(|e| CaptureError::Pcap(e.to_string()))?;
        let link = match reader.header().datalink {
            DataLink::IEEE802_11_RADIOTAP => LinkType::Radiotap,
            DataLink::IEEE802_11 => LinkType::Ieee80211,
            other => return Err(CaptureError::UnsupportedLink(format!("{other:?}"))),
        };
        Ok(PcapReplay { reader, link })
    }
}

impl FrameSource for PcapReplay {
    fn link_type(&self) -> LinkType {
        self.link
    }

    fn next_frame(&mut self) -> Result<Captured, CaptureError> {
        match self.reader.next_packet() {
            Some(Ok(packet)) => Ok(Captured::Frame(packet.data.into_owned())),
            Some(Err(e)) => Err(CaptureError::Pcap(e.to_string())),
            None => Ok(Captured::Exhausted),
        }
    }
}

#[derive(Default)]
pub struct Counters {
    pub frames: AtomicU64,
    pub beacons: AtomicU64,
    pub probe_requests: AtomicU64,
    pub associations: AtomicU64,
    pub data: AtomicU64,
    pub ignored: AtomicU64,
    pub decode_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub frames: u64,
    pub beacons: u64,
    pub probe_requests: u64,
    pub associations: u64,
    pub data: u64,
    pub ignored: u64,
    pub decode_errors: u64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            beacons: self.beacons.load(Ordering::Relaxed),
            probe_requests: self.probe_requests.load(Ordering::Relaxed),
            associations: self.associations.load(Ordering::Relaxed),
            data: self.data.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Decodes, classifies and applies one captured buffer.
#[instrument(level = "trace", skip_all)]
pub fn process_frame(
    store: &TopologyStore,
    counters: &Counters,
    packet: &[u8],
    link: LinkType,
) -> Result<Option<TopologyUpdate>, DecodeError> {
    Counters::bump(&counters.frames);

    let frame = match decode(packet, link) {
        Ok(frame) => frame,
        Err(e) => {
            Counters::bump(&counters.decode_errors);
            tracing::debug!(%e, len = packet.len(), "dropping undecodable frame");
            return Err(e);
        }
    };

    match (frame.frame_type, frame.subtype) {
        (TYPE_MANAGEMENT, SUBTYPE_BEACON) => Counters::bump(&counters.beacons),
        (TYPE_MANAGEMENT, SUBTYPE_PROBE_REQUEST) => Counters::bump(&counters.probe_requests),
        (
            TYPE_MANAGEMENT,
            SUBTYPE_ASSOC_REQUEST | SUBTYPE_REASSOC_REQUEST | SUBTYPE_AUTHENTICATION,
        ) => Counters::bump(&counters.associations),
        (TYPE_DATA, _) => Counters::bump(&counters.data),
        _ => {}
    }

    match classify(&frame) {
        Some(update) => {
            if store.apply(update.clone()) {
                tracing::trace!(?update, "topology changed");
            }
            Ok(Some(update))
        }
        None => {
            Counters::bump(&counters.ignored);
            Ok(None)
        }
    }
}

/// Pulls frames from `source` until `running` clears or the source runs dry.
///
/// Per-frame failures are counted and skipped. A downed interface is brought
/// back up through `interface` when one is available; any other read error
/// ends the capture.
pub fn run_capture(
    source: &mut dyn FrameSource,
    store: &TopologyStore,
    counters: &Counters,
    log: &MessageLog,
    running: &AtomicBool,
    mut interface: Option<&mut dyn InterfaceControl>,
) -> Result<(), CaptureError> {
    let link = source.link_type();

    while running.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(Captured::Frame(packet)) => {
                let _ = process_frame(store, counters, &packet, link);
            }
            Ok(Captured::Idle) => thread::sleep(Duration::from_micros(100)),
            Ok(Captured::Exhausted) => {
                log.info("Capture source exhausted");
                return Ok(());
            }
            Err(CaptureError::NetworkDown) => {
                let Some(control) = interface.as_deref_mut() else {
                    return Err(CaptureError::NetworkDown);
                };
                log.warning("Interface went down, bringing it back up");
                if let Err(e) = control.bring_up() {
                    log.error(format!("Could not bring interface up: {e}"));
                }
                thread::sleep(Duration::from_millis(500));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
