//! Just enough of the 802.11 MAC header to classify a frame.

use byteorder::{ByteOrder, LittleEndian};
use radiotap::Radiotap;
use thiserror::Error;

use crate::address::HardwareAddress;

pub const TYPE_MANAGEMENT: u8 = 0;
pub const TYPE_CONTROL: u8 = 1;
pub const TYPE_DATA: u8 = 2;

pub const SUBTYPE_ASSOC_REQUEST: u8 = 0;
pub const SUBTYPE_ASSOC_RESPONSE: u8 = 1;
pub const SUBTYPE_REASSOC_REQUEST: u8 = 2;
pub const SUBTYPE_PROBE_REQUEST: u8 = 4;
pub const SUBTYPE_PROBE_RESPONSE: u8 = 5;
pub const SUBTYPE_BEACON: u8 = 8;
pub const SUBTYPE_AUTHENTICATION: u8 = 11;

const FLAG_TO_DS: u8 = 0x01;
const FLAG_FROM_DS: u8 = 0x02;
const FLAG_ORDER: u8 = 0x80;

const MGMT_HEADER_LEN: usize = 24;
const HT_CONTROL_LEN: usize = 4;
const FCS_LEN: usize = 4;
// Timestamp, beacon interval, capability info.
const BEACON_FIXED_LEN: usize = 12;
const TAG_SSID: u8 = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("radiotap header: {0}")]
    Radiotap(String),
    #[error("frame truncated at {0} bytes")]
    Truncated(usize),
    #[error("unsupported 802.11 protocol version {0}")]
    UnsupportedVersion(u8),
}

/// Link layer of a captured buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// Radiotap header followed by the 802.11 frame (monitor interfaces).
    Radiotap,
    /// Bare 802.11 frame.
    Ieee80211,
}

/// The fields of one captured frame that drive classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedFrame {
    pub frame_type: u8,
    pub subtype: u8,
    pub to_ds: bool,
    pub from_ds: bool,
    /// Receiver (or BSSID for management frames).
    pub addr1: Option<HardwareAddress>,
    /// Transmitter.
    pub addr2: Option<HardwareAddress>,
    /// BSSID on management frames.
    pub addr3: Option<HardwareAddress>,
    /// Raw SSID element from beacons and probe requests.
    pub ssid: Option<String>,
}

impl ObservedFrame {
    /// Builds a frame from textual fields, as a capture tool would report
    /// them. Malformed addresses are dropped rather than rejected.
    pub fn from_fields(
        frame_type: u8,
        subtype: u8,
        addr1: Option<&str>,
        addr2: Option<&str>,
    ) -> Self {
        ObservedFrame {
            frame_type,
            subtype,
            addr1: addr1.and_then(|raw| raw.parse().ok()),
            addr2: addr2.and_then(|raw| raw.parse().ok()),
            ..Default::default()
        }
    }

    pub fn with_ds(mut self, to_ds: bool, from_ds: bool) -> Self {
        self.to_ds = to_ds;
        self.from_ds = from_ds;
        self
    }

    pub fn with_ssid(mut self, ssid: &str) -> Self {
        self.ssid = Some(ssid.to_string());
        self
    }

    pub fn with_bssid(mut self, bssid: &str) -> Self {
        self.addr3 = bssid.parse().ok();
        self
    }
}

pub fn decode(packet: &[u8], link: LinkType) -> Result<ObservedFrame, DecodeError> {
    match link {
        LinkType::Ieee80211 => parse_frame(packet, false),
        LinkType::Radiotap => {
            let radiotap =
                Radiotap::from_bytes(packet).map_err(|e| DecodeError::Radiotap(format!("{e:?}")))?;
            let fcs = radiotap.flags.map_or(false, |flags| flags.fcs);
            let payload = packet
                .get(radiotap.header.length..)
                .ok_or(DecodeError::Truncated(packet.len()))?;
            parse_frame(payload, fcs)
        }
    }
}

/// Parses a bare 802.11 frame. `fcs` marks a trailing frame check sequence,
/// which is stripped but not verified.
pub fn parse_frame(payload: &[u8], fcs: bool) -> Result<ObservedFrame, DecodeError> {
    if payload.len() < 2 {
        return Err(DecodeError::Truncated(payload.len()));
    }
    let payload = if fcs && payload.len() >= FCS_LEN + 2 {
        &payload[..payload.len() - FCS_LEN]
    } else {
        payload
    };

    let frame_control = LittleEndian::read_u16(&payload[0..2]);
    let version = (frame_control & 0x0003) as u8;
    if version != 0 {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let frame_type = ((frame_control >> 2) & 0x0003) as u8;
    let subtype = ((frame_control >> 4) & 0x000f) as u8;
    let flags = (frame_control >> 8) as u8;

    let mut frame = ObservedFrame {
        frame_type,
        subtype,
        to_ds: flags & FLAG_TO_DS != 0,
        from_ds: flags & FLAG_FROM_DS != 0,
        addr1: payload.get(4..).and_then(HardwareAddress::from_slice),
        addr2: payload.get(10..).and_then(HardwareAddress::from_slice),
        addr3: payload.get(16..).and_then(HardwareAddress::from_slice),
        ssid: None,
    };

    if frame_type == TYPE_MANAGEMENT {
        let header_len = if flags & FLAG_ORDER != 0 {
            MGMT_HEADER_LEN + HT_CONTROL_LEN
        } else {
            MGMT_HEADER_LEN
        };
        let body = payload.get(header_len..).unwrap_or_default();

        match subtype {
            SUBTYPE_BEACON | SUBTYPE_PROBE_RESPONSE => {
                frame.ssid = body.get(BEACON_FIXED_LEN..).and_then(find_ssid);
            }
            SUBTYPE_PROBE_REQUEST => frame.ssid = find_ssid(body),
            _ => {}
        }
    }

    Ok(frame)
}

fn find_ssid(mut elements: &[u8]) -> Option<String> {
    while elements.len() >= 2 {
        let (id, len) = (elements[0], elements[1] as usize);
        let data = elements.get(2..2 + len)?;
        if id == TAG_SSID {
            return Some(String::from_utf8_lossy(data).into_owned());
        }
        elements = &elements[2 + len..];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FrameBuilder;

    fn addr(raw: &str) -> HardwareAddress {
        raw.parse().unwrap()
    }

    #[test]
    fn decodes_beacon() {
        let bytes = FrameBuilder::beacon("de:ad:be:ef:00:01", "CoffeeShop");
        let frame = parse_frame(&bytes, false).unwrap();

        assert_eq!(frame.frame_type, TYPE_MANAGEMENT);
        assert_eq!(frame.subtype, SUBTYPE_BEACON);
        assert_eq!(frame.addr1, Some(HardwareAddress::BROADCAST));
        assert_eq!(frame.addr2, Some(addr("de:ad:be:ef:00:01")));
        assert_eq!(frame.ssid.as_deref(), Some("CoffeeShop"));
        assert!(!frame.to_ds && !frame.from_ds);
    }

    #[test]
    fn decodes_radiotap_wrapped_frame() {
        let bytes = FrameBuilder::with_radiotap(&FrameBuilder::beacon(
            "de:ad:be:ef:00:01",
            "CoffeeShop",
        ));
        let frame = decode(&bytes, LinkType::Radiotap).unwrap();
        assert_eq!(frame.subtype, SUBTYPE_BEACON);
        assert_eq!(frame.ssid.as_deref(), Some("CoffeeShop"));
    }

    #[test]
    fn strips_fcs_before_reading_elements() {
        let mut bytes = FrameBuilder::beacon("de:ad:be:ef:00:01", "Cafe");
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        let frame = parse_frame(&bytes, true).unwrap();
        assert_eq!(frame.ssid.as_deref(), Some("Cafe"));
    }

    #[test]
    fn decodes_data_direction_bits() {
        let bytes = FrameBuilder::data("de:ad:be:ef:00:01", "11:22:33:44:55:66", true, false);
        let frame = decode(&bytes, LinkType::Ieee80211).unwrap();

        assert_eq!(frame.frame_type, TYPE_DATA);
        assert!(frame.to_ds);
        assert!(!frame.from_ds);
        assert_eq!(frame.addr1, Some(addr("de:ad:be:ef:00:01")));
        assert_eq!(frame.addr2, Some(addr("11:22:33:44:55:66")));
    }

    #[test]
    fn decodes_probe_request_and_auth() {
        let probe = parse_frame(&FrameBuilder::probe_request("aa:aa:aa:aa:aa:aa", "Home"), false)
            .unwrap();
        assert_eq!(probe.subtype, SUBTYPE_PROBE_REQUEST);
        assert_eq!(probe.ssid.as_deref(), Some("Home"));

        let wildcard =
            parse_frame(&FrameBuilder::probe_request("aa:aa:aa:aa:aa:aa", ""), false).unwrap();
        assert_eq!(wildcard.ssid.as_deref(), Some(""));

        let auth = parse_frame(
            &FrameBuilder::authentication(
                "11:22:33:44:55:66",
                "de:ad:be:ef:00:01",
                "de:ad:be:ef:00:01",
                2,
            ),
            false,
        )
        .unwrap();
        assert_eq!(auth.subtype, SUBTYPE_AUTHENTICATION);
        assert_eq!(auth.addr1, Some(addr("11:22:33:44:55:66")));
        assert_eq!(auth.addr3, Some(addr("de:ad:be:ef:00:01")));
    }

    #[test]
    fn control_frames_have_partial_addresses() {
        // ACK: frame control, duration, receiver address only.
        let mut ack = vec![0xd4, 0x00, 0x00, 0x00];
        ack.extend_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let frame = parse_frame(&ack, false).unwrap();

        assert_eq!(frame.frame_type, TYPE_CONTROL);
        assert_eq!(frame.addr1, Some(addr("11:22:33:44:55:66")));
        assert_eq!(frame.addr2, None);
    }

    #[test]
    fn truncated_elements_yield_no_ssid() {
        let mut bytes = FrameBuilder::beacon("de:ad:be:ef:00:01", "CoffeeShop");
        bytes.truncate(bytes.len() - 3);
        let frame = parse_frame(&bytes, false).unwrap();
        assert_eq!(frame.ssid, None);
        assert_eq!(frame.addr2, Some(addr("de:ad:be:ef:00:01")));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_frame(&[0x80], false), Err(DecodeError::Truncated(1)));
        assert_eq!(
            parse_frame(&[0x83, 0x00], false),
            Err(DecodeError::UnsupportedVersion(3))
        );
        assert!(decode(&[0x00, 0x00], LinkType::Radiotap).is_err());
    }

    #[test]
    fn textual_fields_drop_malformed_addresses() {
        let frame = ObservedFrame::from_fields(
            TYPE_MANAGEMENT,
            SUBTYPE_ASSOC_REQUEST,
            Some("DE:AD:BE:EF:00:01"),
            Some("garbage"),
        );
        assert_eq!(frame.addr1, Some(addr("de:ad:be:ef:00:01")));
        assert_eq!(frame.addr2, None);
    }
}
