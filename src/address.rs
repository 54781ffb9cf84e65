use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("malformed hardware address: {0:?}")]
    Malformed(String),
}

/// Six octet link-layer address. Displays as lowercase, colon separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HardwareAddress(pub [u8; 6]);

impl HardwareAddress {
    pub const BROADCAST: HardwareAddress = HardwareAddress([0xff; 6]);

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = data.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    pub fn prefix(&self) -> OrganizationalPrefix {
        OrganizationalPrefix([self.0[0], self.0[1], self.0[2]])
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }

    /// Multicast or broadcast (the I/G bit of the first octet).
    pub fn is_group(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    /// Broadcast and all-zero addresses never name a single radio.
    pub fn is_real_device(&self) -> bool {
        !self.is_broadcast() && !self.is_zero()
    }
}

impl fmt::Display for HardwareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for HardwareAddress {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let octets = parse_octets(raw, 6)?;
        let mut addr = [0u8; 6];
        addr.copy_from_slice(&octets);
        Ok(Self(addr))
    }
}

/// First three octets of a hardware address (the OUI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrganizationalPrefix(pub [u8; 3]);

impl fmt::Display for OrganizationalPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for OrganizationalPrefix {
    type Err = AddressError;

    /// Accepts a full address or a bare `aa:bb:cc` prefix.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = HardwareAddress::from_str(raw) {
            return Ok(addr.prefix());
        }
        let octets = parse_octets(raw, 3)?;
        Ok(Self([octets[0], octets[1], octets[2]]))
    }
}

fn parse_octets(raw: &str, count: usize) -> Result<Vec<u8>, AddressError> {
    let malformed = || AddressError::Malformed(raw.to_string());
    let canonical = raw.trim().to_ascii_lowercase();

    let parts: Vec<&str> = canonical.split(':').collect();
    if parts.len() != count {
        return Err(malformed());
    }

    let mut octets = Vec::with_capacity(count);
    for part in parts {
        if part.len() != 2 {
            return Err(malformed());
        }
        let byte = hex::decode(part).map_err(|_| malformed())?;
        octets.push(byte[0]);
    }
    Ok(octets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let addr: HardwareAddress = " DE:AD:be:EF:00:01 ".parse().unwrap();
        assert_eq!(addr.to_string(), "de:ad:be:ef:00:01");
        assert_eq!(addr, "de:ad:be:ef:00:01".parse().unwrap());
    }

    #[test]
    fn rejects_malformed_addresses() {
        for raw in [
            "",
            "de:ad:be:ef:00",
            "de:ad:be:ef:00:01:02",
            "de-ad-be-ef-00-01",
            "de:ad:be:ef:00:1",
            "zz:ad:be:ef:00:01",
            "dead:be:ef:00:01:02",
        ] {
            assert!(
                matches!(
                    raw.parse::<HardwareAddress>(),
                    Err(AddressError::Malformed(_))
                ),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn prefix_is_first_three_octets() {
        let addr: HardwareAddress = "aa:bb:cc:11:22:33".parse().unwrap();
        assert_eq!(addr.prefix().to_string(), "aa:bb:cc");
        assert_eq!(addr.prefix(), "AA:BB:CC".parse().unwrap());
        assert_eq!(addr.prefix(), "aa:bb:cc:ff:ff:ff".parse().unwrap());
        assert_ne!(addr.prefix(), "aa:bb:dd".parse().unwrap());
    }

    #[test]
    fn real_devices() {
        assert!(HardwareAddress::BROADCAST.is_broadcast());
        assert!(!HardwareAddress::BROADCAST.is_real_device());
        assert!(!HardwareAddress([0; 6]).is_real_device());
        assert!("11:22:33:44:55:66"
            .parse::<HardwareAddress>()
            .unwrap()
            .is_real_device());
    }

    #[test]
    fn group_bit() {
        assert!(HardwareAddress::BROADCAST.is_group());
        assert!("01:00:5e:00:00:fb".parse::<HardwareAddress>().unwrap().is_group());
        assert!("33:33:00:00:00:01".parse::<HardwareAddress>().unwrap().is_group());
        assert!(!"de:ad:be:ef:00:01".parse::<HardwareAddress>().unwrap().is_group());
    }

    #[test]
    fn from_slice_needs_six_bytes() {
        assert_eq!(HardwareAddress::from_slice(&[1, 2, 3, 4, 5]), None);
        assert_eq!(
            HardwareAddress::from_slice(&[1, 2, 3, 4, 5, 6, 7]),
            Some(HardwareAddress([1, 2, 3, 4, 5, 6]))
        );
    }
}
