//! Known-device roster.
//!
//! The roster is a JSON document:
//!
//! ```json
//! {
//!   "aps": { "Home": ["aa:bb:cc:11:22:33", "aa:bb:dd"] },
//!   "clients": { "11:22:33:44:55:66": "Laptop" },
//!   "Home": { "22:33:44:55:66:77": "Phone" }
//! }
//! ```
//!
//! `aps` maps an alias to addresses (or bare prefixes); only the
//! organizational prefix of each is kept. `clients` maps exact addresses to
//! aliases. Any other object-valued key is a client group and is merged into
//! the known clients. AP groups keep document order, which is the tie-break
//! when a prefix appears in more than one group.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::address::{HardwareAddress, OrganizationalPrefix};
use crate::status::MessageLog;

const AP_GROUPS_KEY: &str = "aps";
const CLIENTS_KEY: &str = "clients";

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected structure: {0}")]
    Structure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApGroup {
    pub alias: String,
    pub prefixes: BTreeSet<OrganizationalPrefix>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    clients: HashMap<HardwareAddress, String>,
    ap_groups: Vec<ApGroup>,
}

impl Roster {
    /// Loads the roster at `path`, degrading to an empty roster on failure.
    pub fn load(path: &Path, log: &MessageLog) -> Roster {
        match fs::read_to_string(path)
            .map_err(|source| RosterError::Read {
                path: path.display().to_string(),
                source,
            })
            .and_then(|document| Roster::parse(&document))
        {
            Ok((roster, skipped)) => {
                for entry in skipped {
                    log.warning(format!("Roster: skipping invalid address {entry:?}"));
                }
                log.info(format!(
                    "Loaded {} known clients and {} AP groups from {}",
                    roster.client_count(),
                    roster.ap_group_count(),
                    path.display()
                ));
                roster
            }
            Err(e) => {
                log.warning(format!("Could not load {}: {e}", path.display()));
                Roster::default()
            }
        }
    }

    /// Parses a roster document. Returns the roster plus any address strings
    /// that were skipped because they could not be parsed.
    pub fn parse(document: &str) -> Result<(Roster, Vec<String>), RosterError> {
        let root: Value = serde_json::from_str(document)?;
        let root = root
            .as_object()
            .ok_or_else(|| RosterError::Structure("top level must be an object".to_string()))?;

        let mut roster = Roster::default();
        let mut skipped = Vec::new();

        for (key, value) in root {
            if key == AP_GROUPS_KEY {
                let groups = value.as_object().ok_or_else(|| {
                    RosterError::Structure(format!("\"{AP_GROUPS_KEY}\" must be an object"))
                })?;
                for (alias, addresses) in groups {
                    let group = parse_ap_group(alias, addresses, &mut skipped)?;
                    roster.ap_groups.push(group);
                }
            } else if let Some(clients) = value.as_object() {
                parse_clients(key, clients, &mut roster.clients, &mut skipped)?;
            } else if key == CLIENTS_KEY {
                return Err(RosterError::Structure(format!(
                    "\"{CLIENTS_KEY}\" must be an object"
                )));
            }
        }

        Ok((roster, skipped))
    }

    pub fn client_alias(&self, addr: &HardwareAddress) -> Option<&str> {
        self.clients.get(addr).map(String::as_str)
    }

    /// First group, in document order, that claims the address's prefix.
    pub fn ap_group(&self, addr: &HardwareAddress) -> Option<&str> {
        let prefix = addr.prefix();
        self.ap_groups
            .iter()
            .find(|group| group.prefixes.contains(&prefix))
            .map(|group| group.alias.as_str())
    }

    pub fn ap_groups(&self) -> &[ApGroup] {
        &self.ap_groups
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn ap_group_count(&self) -> usize {
        self.ap_groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty() && self.ap_groups.is_empty()
    }
}

fn parse_ap_group(
    alias: &str,
    addresses: &Value,
    skipped: &mut Vec<String>,
) -> Result<ApGroup, RosterError> {
    let list = addresses.as_array().ok_or_else(|| {
        RosterError::Structure(format!("AP group {alias:?} must be a list of addresses"))
    })?;

    let mut prefixes = BTreeSet::new();
    for entry in list {
        let raw = entry.as_str().ok_or_else(|| {
            RosterError::Structure(format!("AP group {alias:?} contains a non-string entry"))
        })?;
        match raw.parse::<OrganizationalPrefix>() {
            Ok(prefix) => {
                prefixes.insert(prefix);
            }
            Err(_) => skipped.push(raw.to_string()),
        }
    }

    Ok(ApGroup {
        alias: alias.to_string(),
        prefixes,
    })
}

fn parse_clients(
    group: &str,
    entries: &Map<String, Value>,
    clients: &mut HashMap<HardwareAddress, String>,
    skipped: &mut Vec<String>,
) -> Result<(), RosterError> {
    for (raw, alias) in entries {
        let alias = alias.as_str().ok_or_else(|| {
            RosterError::Structure(format!("client {raw:?} in {group:?} needs a string alias"))
        })?;
        match raw.parse::<HardwareAddress>() {
            Ok(addr) => {
                clients.insert(addr, alias.to_string());
            }
            Err(_) => skipped.push(raw.clone()),
        }
    }
    Ok(())
}
