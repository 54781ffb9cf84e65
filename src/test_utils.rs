//! Synthetic 802.11 frames and capture files for tests.

use crate::address::HardwareAddress;
use crate::dot11::{
    SUBTYPE_ASSOC_REQUEST, SUBTYPE_AUTHENTICATION, SUBTYPE_BEACON, SUBTYPE_PROBE_REQUEST,
    TYPE_DATA, TYPE_MANAGEMENT,
};

pub struct FrameBuilder;

impl FrameBuilder {
    fn header(
        frame_type: u8,
        subtype: u8,
        flags: u8,
        addr1: &str,
        addr2: &str,
        addr3: &str,
    ) -> Vec<u8> {
        let mut frame = vec![(subtype << 4) | (frame_type << 2), flags, 0x00, 0x00];
        for raw in [addr1, addr2, addr3] {
            let addr: HardwareAddress = raw.parse().expect("test address");
            frame.extend_from_slice(&addr.0);
        }
        // Sequence control.
        frame.extend_from_slice(&[0x10, 0x00]);
        frame
    }

    fn ssid_element(frame: &mut Vec<u8>, ssid: &str) {
        frame.push(0x00);
        frame.push(ssid.len() as u8);
        frame.extend_from_slice(ssid.as_bytes());
    }

    pub fn beacon(bssid: &str, ssid: &str) -> Vec<u8> {
        Self::beacon_raw_ssid(bssid, ssid.as_bytes())
    }

    pub fn beacon_raw_ssid(bssid: &str, ssid: &[u8]) -> Vec<u8> {
        let mut frame = Self::header(
            TYPE_MANAGEMENT,
            SUBTYPE_BEACON,
            0,
            "ff:ff:ff:ff:ff:ff",
            bssid,
            bssid,
        );
        // Timestamp, interval (100 TU), capabilities.
        frame.extend_from_slice(&[0u8; 8]);
        frame.extend_from_slice(&[0x64, 0x00, 0x11, 0x04]);
        frame.push(0x00);
        frame.push(ssid.len() as u8);
        frame.extend_from_slice(ssid);
        frame
    }

    pub fn probe_request(station: &str, ssid: &str) -> Vec<u8> {
        let mut frame = Self::header(
            TYPE_MANAGEMENT,
            SUBTYPE_PROBE_REQUEST,
            0,
            "ff:ff:ff:ff:ff:ff",
            station,
            "ff:ff:ff:ff:ff:ff",
        );
        Self::ssid_element(&mut frame, ssid);
        frame
    }

    pub fn association_request(station: &str, ap: &str) -> Vec<u8> {
        let mut frame = Self::header(TYPE_MANAGEMENT, SUBTYPE_ASSOC_REQUEST, 0, ap, station, ap);
        // Capabilities, listen interval.
        frame.extend_from_slice(&[0x11, 0x04, 0x0a, 0x00]);
        frame
    }

    /// `addr1` receives, `addr2` transmits, `bssid` is the AP either way.
    pub fn authentication(addr1: &str, addr2: &str, bssid: &str, seq: u16) -> Vec<u8> {
        Self::authentication_with_algorithm(addr1, addr2, bssid, 0, seq)
    }

    /// Algorithm 0 is open system, 3 is SAE.
    pub fn authentication_with_algorithm(
        addr1: &str,
        addr2: &str,
        bssid: &str,
        algorithm: u16,
        seq: u16,
    ) -> Vec<u8> {
        let mut frame = Self::header(
            TYPE_MANAGEMENT,
            SUBTYPE_AUTHENTICATION,
            0,
            addr1,
            addr2,
            bssid,
        );
        // Algorithm, sequence, status success.
        frame.extend_from_slice(&algorithm.to_le_bytes());
        frame.extend_from_slice(&seq.to_le_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);
        frame
    }

    pub fn data(addr1: &str, addr2: &str, to_ds: bool, from_ds: bool) -> Vec<u8> {
        let flags = u8::from(to_ds) | (u8::from(from_ds) << 1);
        let mut frame = Self::header(TYPE_DATA, 0, flags, addr1, addr2, addr1);
        // LLC/SNAP header for IPv4, no payload.
        frame.extend_from_slice(&[0xaa, 0xaa, 0x03, 0x00, 0x00, 0x00, 0x08, 0x00]);
        frame
    }

    /// Prefixes a minimal radiotap header with no fields present.
    pub fn with_radiotap(frame: &[u8]) -> Vec<u8> {
        let mut packet = vec![0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00];
        packet.extend_from_slice(frame);
        packet
    }
}

/// Writes frames to a temporary pcap file with the given link type.
pub fn create_test_pcap(
    frames: &[Vec<u8>],
    datalink: pcap_file::DataLink,
) -> std::io::Result<tempfile::NamedTempFile> {
    use pcap_file::pcap::{PcapHeader, PcapPacket, PcapWriter};

    let temp_file = tempfile::NamedTempFile::new()?;
    let file = temp_file.reopen()?;

    let mut pcap_writer = PcapWriter::with_header(
        file,
        PcapHeader {
            datalink,
            ..Default::default()
        },
    )
    .map_err(|e| std::io::Error::other(format!("Pcap write error: {}", e)))?;

    for (i, frame) in frames.iter().enumerate() {
        let packet = PcapPacket {
            timestamp: std::time::Duration::from_secs(1700000000 + i as u64),
            orig_len: frame.len() as u32,
            data: std::borrow::Cow::Borrowed(frame),
        };
        pcap_writer
            .write_packet(&packet)
            .map_err(|e| std::io::Error::other(format!("Packet write error: {}", e)))?;
    }

    Ok(temp_file)
}
