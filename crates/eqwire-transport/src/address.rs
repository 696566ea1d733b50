//! Hardware addresses.

use std::fmt;
use std::str::FromStr;

use rand_core::{OsRng, RngCore};

/// A 6-byte link-layer hardware address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

/// The all-stations broadcast address `ff:ff:ff:ff:ff:ff`.
pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

impl MacAddress {
    /// Length of an address on the wire.
    pub const LEN: usize = 6;

    /// Read an address from the first six bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..Self::LEN)?.try_into().ok()?;
        Some(Self(octets))
    }

    /// Generate a random locally administered unicast address.
    ///
    /// Used by emulated links that have no burned-in hardware address.
    pub fn generate_local() -> Self {
        let mut octets = [0u8; 6];
        OsRng.fill_bytes(&mut octets);
        // locally administered, unicast
        octets[0] = (octets[0] | 0x02) & 0xFE;
        Self(octets)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == BROADCAST
    }

    /// Whether a datagram addressed to `dest` should be accepted by this station.
    pub fn accepts(&self, dest: &MacAddress) -> bool {
        dest == self || dest.is_broadcast()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

/// Error returned when parsing a `aa:bb:cc:dd:ee:ff` string fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address '{0}' (expected six hex octets like aa:bb:cc:dd:ee:ff)")]
pub struct ParseMacError(String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("broadcast") {
            return Ok(BROADCAST);
        }
        let mut octets = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let mac = MacAddress([0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]);
        assert_eq!(mac.to_string(), "24:0a:c4:00:01:ff");
        assert_eq!("24:0A:C4:00:01:FF".parse::<MacAddress>().unwrap(), mac);
        assert_eq!("24-0a-c4-00-01-ff".parse::<MacAddress>().unwrap(), mac);
    }

    #[test]
    fn parse_broadcast_keyword() {
        assert_eq!("broadcast".parse::<MacAddress>().unwrap(), BROADCAST);
        assert!(BROADCAST.is_broadcast());
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("24:0a:c4:00:01".parse::<MacAddress>().is_err());
        assert!("24:0a:c4:00:01:ff:00".parse::<MacAddress>().is_err());
        assert!("24:0a:c4:00:01:zz".parse::<MacAddress>().is_err());
        assert!("240ac40001ff".parse::<MacAddress>().is_err());
    }

    #[test]
    fn accepts_own_and_broadcast_only() {
        let me = MacAddress([1, 2, 3, 4, 5, 6]);
        let other = MacAddress([6, 5, 4, 3, 2, 1]);
        assert!(me.accepts(&me));
        assert!(me.accepts(&BROADCAST));
        assert!(!me.accepts(&other));
    }

    #[test]
    fn generated_address_is_local_unicast() {
        let mac = MacAddress::generate_local();
        assert_eq!(mac.0[0] & 0x02, 0x02);
        assert_eq!(mac.0[0] & 0x01, 0x00);
        assert!(!mac.is_broadcast());
        assert_ne!(mac, MacAddress::generate_local());
    }

    #[test]
    fn from_slice_requires_six_bytes() {
        assert_eq!(
            MacAddress::from_slice(&[1, 2, 3, 4, 5, 6, 7]),
            Some(MacAddress([1, 2, 3, 4, 5, 6]))
        );
        assert_eq!(MacAddress::from_slice(&[1, 2, 3]), None);
    }
}
