use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::address::HardwareAddress;
use crate::classify::TopologyUpdate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub bssid: HardwareAddress,
    pub ssid: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    pub station: HardwareAddress,
    /// `None` until the station is seen talking to an AP.
    pub ap: Option<HardwareAddress>,
    pub probes: BTreeSet<String>,
}

#[derive(Default)]
struct Topology {
    // Insertion counter; entries remember when they were first seen.
    sequence: u64,
    access_points: HashMap<HardwareAddress, (u64, AccessPoint)>,
    clients: HashMap<HardwareAddress, (u64, ClientBinding)>,
}

impl Topology {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn client_entry(&mut self, station: HardwareAddress) -> &mut ClientBinding {
        let sequence = &mut self.sequence;
        let (_, client) = self.clients.entry(station).or_insert_with(|| {
            *sequence += 1;
            (
                *sequence,
                ClientBinding {
                    station,
                    ap: None,
                    probes: BTreeSet::new(),
                },
            )
        });
        client
    }
}

/// Access points and client bindings behind a single lock.
///
/// The capture loop is the only writer; the renderer takes snapshots. Both
/// maps are copied under the same guard, so a snapshot never mixes two
/// points in time.
#[derive(Default)]
pub struct TopologyStore {
    inner: Mutex<Topology>,
}

impl TopologyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Topology> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies one classified update. Returns whether anything observable
    /// changed.
    pub fn apply(&self, update: TopologyUpdate) -> bool {
        let mut topology = self.lock();
        match update {
            TopologyUpdate::UpsertAccessPoint { bssid, ssid } => {
                if let Some((_, ap)) = topology.access_points.get_mut(&bssid) {
                    if ap.ssid == ssid {
                        return false;
                    }
                    ap.ssid = ssid;
                    return true;
                }
                let order = topology.next_sequence();
                topology
                    .access_points
                    .insert(bssid, (order, AccessPoint { bssid, ssid }));
                true
            }
            TopologyUpdate::RegisterClient { station, probe } => {
                let is_new = !topology.clients.contains_key(&station);
                let client = topology.client_entry(station);
                let probed = match probe {
                    Some(ssid) => client.probes.insert(ssid),
                    None => false,
                };
                is_new || probed
            }
            TopologyUpdate::Bind { station, ap } => {
                let client = topology.client_entry(station);
                if client.ap == Some(ap) {
                    return false;
                }
                client.ap = Some(ap);
                true
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let topology = self.lock();

        let mut access_points: Vec<_> = topology.access_points.values().cloned().collect();
        let mut clients: Vec<_> = topology.clients.values().cloned().collect();
        drop(topology);

        access_points.sort_by_key(|(order, _)| *order);
        clients.sort_by_key(|(order, _)| *order);

        Snapshot {
            access_points: access_points.into_iter().map(|(_, ap)| ap).collect(),
            clients: clients.into_iter().map(|(_, client)| client).collect(),
        }
    }
}

/// Point-in-time copy of the store, entries in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub access_points: Vec<AccessPoint>,
    pub clients: Vec<ClientBinding>,
}

impl Snapshot {
    pub fn access_point(&self, bssid: &HardwareAddress) -> Option<&AccessPoint> {
        self.access_points.iter().find(|ap| ap.bssid == *bssid)
    }

    pub fn client(&self, station: &HardwareAddress) -> Option<&ClientBinding> {
        self.clients.iter().find(|client| client.station == *station)
    }
}
