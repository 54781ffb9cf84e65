use crate::address::HardwareAddress;
use crate::dot11::{
    ObservedFrame, SUBTYPE_ASSOC_REQUEST, SUBTYPE_AUTHENTICATION, SUBTYPE_BEACON,
    SUBTYPE_PROBE_REQUEST, SUBTYPE_REASSOC_REQUEST, TYPE_DATA, TYPE_MANAGEMENT,
};

/// Shown in place of an SSID that is absent, empty or all NULs.
pub const HIDDEN_SSID: &str = "<hidden>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyUpdate {
    /// A beacon: the BSSID broadcasts `ssid`.
    UpsertAccessPoint {
        bssid: HardwareAddress,
        ssid: String,
    },
    /// A probing station; never disturbs an existing binding.
    RegisterClient {
        station: HardwareAddress,
        probe: Option<String>,
    },
    /// The station is talking to the AP.
    Bind {
        station: HardwareAddress,
        ap: HardwareAddress,
    },
}

pub fn classify(frame: &ObservedFrame) -> Option<TopologyUpdate> {
    match (frame.frame_type, frame.subtype) {
        (TYPE_MANAGEMENT, SUBTYPE_BEACON) => {
            let bssid = real_device(frame.addr2)?;
            Some(TopologyUpdate::UpsertAccessPoint {
                bssid,
                ssid: display_ssid(frame.ssid.as_deref()),
            })
        }
        (TYPE_MANAGEMENT, SUBTYPE_PROBE_REQUEST) => {
            let station = real_device(frame.addr2)?;
            let probe = frame
                .ssid
                .as_deref()
                .map(strip_nuls)
                .filter(|ssid| !ssid.is_empty());
            Some(TopologyUpdate::RegisterClient { station, probe })
        }
        (TYPE_MANAGEMENT, SUBTYPE_ASSOC_REQUEST | SUBTYPE_REASSOC_REQUEST) => {
            bind(frame.addr2, frame.addr1)
        }
        (TYPE_MANAGEMENT, SUBTYPE_AUTHENTICATION) => match frame.addr3 {
            // Both sides send every SAE message, so only the BSSID tells
            // which end is the AP.
            Some(bssid) if frame.addr2 == Some(bssid) => {
                bind(unicast(frame.addr1), frame.addr2)
            }
            _ => bind(frame.addr2, frame.addr1),
        },
        (TYPE_DATA, _) => match (frame.to_ds, frame.from_ds) {
            (true, false) => bind(frame.addr2, frame.addr1),
            (false, true) => bind(unicast(frame.addr1), frame.addr2),
            // WDS (both) or IBSS (neither); no station/AP relationship.
            _ => None,
        },
        _ => None,
    }
}

fn bind(station: Option<HardwareAddress>, ap: Option<HardwareAddress>) -> Option<TopologyUpdate> {
    let station = real_device(station)?;
    let ap = real_device(ap)?;
    if station == ap {
        return None;
    }
    Some(TopologyUpdate::Bind { station, ap })
}

/// A receiver address only names a station when it is not a group address.
fn unicast(addr: Option<HardwareAddress>) -> Option<HardwareAddress> {
    addr.filter(|addr| !addr.is_group())
}

fn real_device(addr: Option<HardwareAddress>) -> Option<HardwareAddress> {
    addr.filter(HardwareAddress::is_real_device)
}

fn strip_nuls(ssid: &str) -> String {
    ssid.replace('\0', "")
}

fn display_ssid(ssid: Option<&str>) -> String {
    match ssid.map(strip_nuls) {
        Some(ssid) if !ssid.is_empty() => ssid,
        _ => HIDDEN_SSID.to_string(),
    }
}
