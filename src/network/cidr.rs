//! IPv4 address blocks in CIDR notation.
//!
//! [`AddressBlock`] is the value every subnet calculation works on. It parses
//! from and renders to `a.b.c.d/prefix`, and serializes as that same string.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::AllocationError;

/// Maximum IPv4 prefix length.
pub const MAX_PREFIX: u8 = 32;

/// An IPv4 network prefix such as `10.0.0.0/16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressBlock {
    octets: [u8; 4],
    prefix: u8,
}

impl AddressBlock {
    /// `0.0.0.0/0`.
    pub const ANYWHERE: Self = Self {
        octets: [0, 0, 0, 0],
        prefix: 0,
    };

    /// Creates a block from its octets and prefix length.
    ///
    /// # Errors
    ///
    /// Returns an error if `prefix` exceeds 32.
    pub fn new(octets: [u8; 4], prefix: u8) -> Result<Self, AllocationError> {
        if prefix > MAX_PREFIX {
            return Err(AllocationError::InvalidMask { mask: prefix });
        }
        Ok(Self { octets, prefix })
    }

    /// Returns the four octets.
    #[must_use]
    pub const fn octets(&self) -> [u8; 4] {
        self.octets
    }

    /// Returns the prefix length.
    #[must_use]
    pub const fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Returns the address part.
    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        let [a, b, c, d] = self.octets;
        Ipv4Addr::new(a, b, c, d)
    }

    /// Returns the network mask as a `u32`.
    #[must_use]
    pub const fn mask_bits(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (MAX_PREFIX - self.prefix)
        }
    }

    /// Returns the first address of the block.
    #[must_use]
    pub fn network(&self) -> u32 {
        u32::from(self.address()) & self.mask_bits()
    }

    /// Returns the last address of the block.
    #[must_use]
    pub fn broadcast(&self) -> u32 {
        self.network() | !self.mask_bits()
    }

    /// Returns true if `other` lies entirely inside this block.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        other.prefix >= self.prefix
            && other.network() >= self.network()
            && other.broadcast() <= self.broadcast()
    }

    /// Returns true if the two blocks share at least one address.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.network() <= other.broadcast() && other.network() <= self.broadcast()
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), self.prefix)
    }
}

impl FromStr for AddressBlock {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AllocationError::InvalidBlock {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected a.b.c.d/prefix"))?;

        let parts: Vec<&str> = addr.split('.').collect();
        if parts.len() != 4 {
            return Err(invalid("expected exactly four octets"));
        }

        let mut octets = [0u8; 4];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u8>()
                .map_err(|_| invalid(&format!("octet '{part}' is not in 0-255")))?;
        }

        let prefix = prefix
            .parse::<u8>()
            .map_err(|_| invalid(&format!("prefix '{prefix}' is not a number")))?;
        if prefix > MAX_PREFIX {
            return Err(invalid(&format!("prefix /{prefix} exceeds /{MAX_PREFIX}")));
        }

        Ok(Self { octets, prefix })
    }
}

impl Serialize for AddressBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AddressBlock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(s: &str) -> AddressBlock {
        s.parse().expect("valid block")
    }

    #[test]
    fn test_parse_and_display() {
        let b = block("10.0.0.0/16");
        assert_eq!(b.octets(), [10, 0, 0, 0]);
        assert_eq!(b.prefix(), 16);
        assert_eq!(b.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("10.0.0/16".parse::<AddressBlock>().is_err());
        assert!("10.0.0.0.0/16".parse::<AddressBlock>().is_err());
        assert!("10.0.0.256/16".parse::<AddressBlock>().is_err());
        assert!("10.0.0.0".parse::<AddressBlock>().is_err());
        assert!("10.0.0.0/33".parse::<AddressBlock>().is_err());
        assert!("10.0.x.0/16".parse::<AddressBlock>().is_err());
    }

    #[test]
    fn test_contains() {
        let vpc = block("10.0.0.0/16");
        assert!(vpc.contains(&block("10.0.3.0/24")));
        assert!(!vpc.contains(&block("10.1.0.0/24")));
        assert!(!block("10.0.0.0/24").contains(&vpc));
    }

    #[test]
    fn test_overlaps() {
        assert!(block("10.0.0.0/16").overlaps(&block("10.0.5.0/24")));
        assert!(!block("10.0.1.0/24").overlaps(&block("10.0.2.0/24")));
    }

    #[test]
    fn test_serde_as_string() {
        let b = block("192.168.4.0/24");
        let json = serde_json::to_string(&b).expect("serialize");
        assert_eq!(json, "\"192.168.4.0/24\"");
        let back: AddressBlock = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, b);
    }

    #[test]
    fn test_zero_prefix_covers_everything() {
        let any = block("0.0.0.0/0");
        assert!(any.contains(&block("172.16.0.0/12")));
    }
}
