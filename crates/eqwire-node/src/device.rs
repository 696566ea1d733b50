//! Local device identity advertised in self-reports.

use std::borrow::Cow;
use std::fmt;

/// Maximum device name length in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Fixed-capacity device name. Arbitrary bytes are allowed.
pub type DeviceName = heapless::Vec<u8, MAX_NAME_LEN>;

/// Two application-chosen bytes classifying the kind of device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DeviceType {
    pub a: u8,
    pub b: u8,
}

impl DeviceType {
    pub const fn new(a: u8, b: u8) -> Self {
        Self { a, b }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}", self.a, self.b)
    }
}

/// Firmware version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Identity of a device: type, version and name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub device_type: DeviceType,
    pub version: Version,
    name: DeviceName,
}

impl DeviceInfo {
    /// Build local device info.
    ///
    /// The name is cut at the first NUL byte and at [`MAX_NAME_LEN`] bytes.
    pub fn new(name: &str, device_type: DeviceType, version: Version) -> Self {
        let bytes = name.as_bytes();
        let end = bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(bytes.len())
            .min(MAX_NAME_LEN);
        Self {
            device_type,
            version,
            name: truncated_name(&bytes[..end]),
        }
    }

    /// Build device info from a name exactly as received on the wire.
    ///
    /// Returns `None` if the name exceeds [`MAX_NAME_LEN`].
    pub fn from_wire(name: &[u8], device_type: DeviceType, version: Version) -> Option<Self> {
        Some(Self {
            device_type,
            version,
            name: DeviceName::from_slice(name).ok()?,
        })
    }

    /// Raw name bytes.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Name as text, replacing invalid UTF-8.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }
}

fn truncated_name(bytes: &[u8]) -> DeviceName {
    let mut name = DeviceName::new();
    for &b in bytes.iter().take(MAX_NAME_LEN) {
        // capacity is MAX_NAME_LEN, so this never fails
        let _ = name.push(b);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_capped_at_32_bytes() {
        let long = "x".repeat(40);
        let info = DeviceInfo::new(&long, DeviceType::new(1, 2), Version::new(1, 0, 0));
        assert_eq!(info.name().len(), MAX_NAME_LEN);
    }

    #[test]
    fn name_stops_at_nul() {
        let info = DeviceInfo::new("lamp\0garbage", DeviceType::default(), Version::default());
        assert_eq!(info.name(), b"lamp");
        assert_eq!(info.name_lossy(), "lamp");
    }

    #[test]
    fn wire_name_keeps_interior_bytes() {
        let info = DeviceInfo::from_wire(b"a\0b", DeviceType::new(3, 4), Version::new(0, 1, 2))
            .expect("short name should fit");
        assert_eq!(info.name(), b"a\0b");
        assert!(DeviceInfo::from_wire(&[b'x'; 33], DeviceType::default(), Version::default())
            .is_none());
    }

    #[test]
    fn display_formats() {
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
        assert_eq!(DeviceType::new(0x01, 0xab).to_string(), "01ab");
    }
}
