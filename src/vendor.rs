use mac_oui::Oui;
use thiserror::Error;

use crate::address::HardwareAddress;

#[derive(Debug, Error)]
pub enum VendorError {
    #[error("OUI database: {0}")]
    Database(String),
}

/// IEEE OUI registry lookups, for the `--vendors` column.
pub struct VendorDb {
    db: Oui,
}

impl VendorDb {
    pub fn load() -> Result<Self, VendorError> {
        Oui::default()
            .map(|db| VendorDb { db })
            .map_err(|e| VendorError::Database(format!("{e:?}")))
    }

    pub fn lookup(&self, addr: &HardwareAddress) -> Option<String> {
        // Locally administered addresses (randomized clients) have no OUI.
        if addr.0[0] & 0x02 != 0 {
            return None;
        }
        self.db
            .lookup_by_mac(&addr.to_string())
            .ok()
            .flatten()
            .map(|entry| entry.company_name.clone())
    }
}
