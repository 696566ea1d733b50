//! Discovery on the system command id.
//!
//! Two flags share command 0x00:
//! - `FLAG_QUERY` asks stations to report themselves; the payload is an
//!   optional filter
//! - `FLAG_SELF_REPORT` describes a station
//!
//! Self-report payload:
//! ```text
//! [typeA][typeB][major][minor][patch][nameLen][name ..][cmdCount][cmd ..]
//! ```
//!
//! Query filter payload (empty = every station answers):
//! ```text
//! [typeCount][(typeA, typeB) ..][addrCount][6-byte address ..]
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use eqwire_frame::{MAX_PAYLOAD_SIZE, SYSTEM_COMMAND};
use eqwire_transport::MacAddress;

use crate::device::{DeviceInfo, DeviceType, Version, MAX_NAME_LEN};
use crate::error::DiscoveryError;

/// Command id carrying discovery traffic.
pub const DISCOVERY_COMMAND: u8 = SYSTEM_COMMAND;

/// Flag: please report yourself.
pub const FLAG_QUERY: u8 = 0x00;

/// Flag: this is my self-report.
pub const FLAG_SELF_REPORT: u8 = 0x01;

/// type (2) + version (3) + name length (1) + command count (1).
const FIXED_FIELDS: usize = 7;

/// A decoded self-report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfReport {
    pub info: DeviceInfo,
    pub commands: Vec<u8>,
}

/// Encode a self-report that fits in one frame payload.
///
/// If everything does not fit, the command list is shortened first and the
/// name only after that.
pub fn encode_self_report(info: &DeviceInfo, commands: &[u8]) -> Result<Bytes, DiscoveryError> {
    encode_self_report_within(info, commands, MAX_PAYLOAD_SIZE)
}

fn encode_self_report_within(
    info: &DeviceInfo,
    commands: &[u8],
    budget: usize,
) -> Result<Bytes, DiscoveryError> {
    if FIXED_FIELDS > budget {
        return Err(DiscoveryError::SelfReportTooLarge { budget });
    }

    let mut name_len = info.name().len().min(MAX_NAME_LEN);
    let mut command_count = commands.len().min(usize::from(u8::MAX));

    if FIXED_FIELDS + name_len + command_count > budget {
        command_count = budget.saturating_sub(FIXED_FIELDS + name_len);
    }
    if FIXED_FIELDS + name_len + command_count > budget {
        name_len = budget.saturating_sub(FIXED_FIELDS + command_count);
    }
    if FIXED_FIELDS + name_len + command_count > budget {
        return Err(DiscoveryError::SelfReportTooLarge { budget });
    }

    let mut buf = BytesMut::with_capacity(FIXED_FIELDS + name_len + command_count);
    buf.put_u8(info.device_type.a);
    buf.put_u8(info.device_type.b);
    buf.put_u8(info.version.major);
    buf.put_u8(info.version.minor);
    buf.put_u8(info.version.patch);
    buf.put_u8(name_len as u8);
    buf.put_slice(&info.name()[..name_len]);
    buf.put_u8(command_count as u8);
    buf.put_slice(&commands[..command_count]);
    Ok(buf.freeze())
}

/// Decode a self-report payload.
///
/// Any length inconsistency rejects the whole report. Bytes after the
/// command list are ignored.
pub fn decode_self_report(payload: &[u8]) -> Result<SelfReport, DiscoveryError> {
    let Some((fixed, rest)) = payload.split_first_chunk::<6>() else {
        return Err(DiscoveryError::Truncated("header"));
    };
    let [a, b, major, minor, patch, name_len] = *fixed;
    let name_len = usize::from(name_len);
    if name_len > MAX_NAME_LEN {
        return Err(DiscoveryError::NameTooLong {
            len: name_len,
            max: MAX_NAME_LEN,
        });
    }
    if rest.len() < name_len {
        return Err(DiscoveryError::Truncated("name"));
    }
    let (name, rest) = rest.split_at(name_len);

    let (&count, rest) = rest
        .split_first()
        .ok_or(DiscoveryError::Truncated("command count"))?;
    let count = usize::from(count);
    if rest.len() < count {
        return Err(DiscoveryError::Truncated("command list"));
    }

    let info = DeviceInfo::from_wire(
        name,
        DeviceType::new(a, b),
        Version::new(major, minor, patch),
    )
    .ok_or(DiscoveryError::NameTooLong {
        len: name_len,
        max: MAX_NAME_LEN,
    })?;

    Ok(SelfReport {
        info,
        commands: rest[..count].to_vec(),
    })
}

/// Restricts which stations answer a query.
///
/// An empty list places no restriction on that attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    pub device_types: Vec<DeviceType>,
    pub addresses: Vec<MacAddress>,
}

impl QueryFilter {
    /// A filter every station matches.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_types.push(device_type);
        self
    }

    pub fn with_address(mut self, address: MacAddress) -> Self {
        self.addresses.push(address);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.device_types.is_empty() && self.addresses.is_empty()
    }

    /// Whether a station with this type and address should answer.
    pub fn matches(&self, device_type: DeviceType, address: MacAddress) -> bool {
        (self.device_types.is_empty() || self.device_types.contains(&device_type))
            && (self.addresses.is_empty() || self.addresses.contains(&address))
    }

    /// Encode as a query payload; an empty filter encodes to nothing.
    pub fn encode(&self) -> Result<Bytes, DiscoveryError> {
        if self.is_empty() {
            return Ok(Bytes::new());
        }
        if self.device_types.len() > usize::from(u8::MAX)
            || self.addresses.len() > usize::from(u8::MAX)
        {
            return Err(DiscoveryError::InvalidFilter("more than 255 entries"));
        }
        let size = 2 + 2 * self.device_types.len() + MacAddress::LEN * self.addresses.len();
        if size > MAX_PAYLOAD_SIZE {
            return Err(DiscoveryError::InvalidFilter("filter exceeds payload size"));
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.put_u8(self.device_types.len() as u8);
        for device_type in &self.device_types {
            buf.put_u8(device_type.a);
            buf.put_u8(device_type.b);
        }
        buf.put_u8(self.addresses.len() as u8);
        for address in &self.addresses {
            buf.put_slice(&address.0);
        }
        Ok(buf.freeze())
    }

    /// Decode a query payload.
    pub fn decode(payload: &[u8]) -> Result<Self, DiscoveryError> {
        if payload.is_empty() {
            return Ok(Self::any());
        }

        let (&type_count, rest) = payload
            .split_first()
            .ok_or(DiscoveryError::InvalidFilter("missing type count"))?;
        let type_bytes = 2 * usize::from(type_count);
        if rest.len() < type_bytes {
            return Err(DiscoveryError::InvalidFilter("type list truncated"));
        }
        let (types, rest) = rest.split_at(type_bytes);

        let (&addr_count, rest) = rest
            .split_first()
            .ok_or(DiscoveryError::InvalidFilter("missing address count"))?;
        let addr_bytes = MacAddress::LEN * usize::from(addr_count);
        if rest.len() < addr_bytes {
            return Err(DiscoveryError::InvalidFilter("address list truncated"));
        }

        Ok(Self {
            device_types: types
                .chunks_exact(2)
                .map(|pair| DeviceType::new(pair[0], pair[1]))
                .collect(),
            addresses: rest[..addr_bytes]
                .chunks_exact(MacAddress::LEN)
                .filter_map(MacAddress::from_slice)
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str) -> DeviceInfo {
        DeviceInfo::new(name, DeviceType::new(0x01, 0x02), Version::new(1, 4, 2))
    }

    #[test]
    fn self_report_layout() {
        let payload = encode_self_report(&info("lamp"), &[0x01, 0x10]).unwrap();
        assert_eq!(
            &payload[..],
            &[0x01u8, 0x02, 1, 4, 2, 4, b'l', b'a', b'm', b'p', 2, 0x01, 0x10]
        );

        let report = decode_self_report(&payload).unwrap();
        assert_eq!(report.info, info("lamp"));
        assert_eq!(report.commands, vec![0x01, 0x10]);
    }

    #[test]
    fn full_name_and_200_commands_fit() {
        let name = "n".repeat(MAX_NAME_LEN);
        let commands: Vec<u8> = (0..200).collect();
        let payload = encode_self_report(&info(&name), &commands).unwrap();

        assert!(payload.len() <= MAX_PAYLOAD_SIZE);
        let report = decode_self_report(&payload).unwrap();
        assert_eq!(report.info.name().len(), MAX_NAME_LEN);
        assert_eq!(report.commands, commands);
    }

    #[test]
    fn long_command_list_is_truncated_before_name() {
        let name = "n".repeat(MAX_NAME_LEN);
        let commands: Vec<u8> = (0..=255).collect();
        let payload = encode_self_report(&info(&name), &commands).unwrap();

        assert_eq!(payload.len(), MAX_PAYLOAD_SIZE);
        let report = decode_self_report(&payload).unwrap();
        assert_eq!(report.info.name().len(), MAX_NAME_LEN);
        assert_eq!(report.commands.len(), MAX_PAYLOAD_SIZE - FIXED_FIELDS - MAX_NAME_LEN);
        assert_eq!(report.commands[..], commands[..report.commands.len()]);
    }

    #[test]
    fn name_is_truncated_only_when_it_alone_overflows() {
        let payload = encode_self_report_within(&info("abcdefgh"), &[1, 2, 3], 12).unwrap();
        let report = decode_self_report(&payload).unwrap();
        assert_eq!(report.info.name(), b"abcde");
        assert!(report.commands.is_empty());
        assert_eq!(payload.len(), 12);
    }

    #[test]
    fn budget_below_fixed_fields_fails() {
        let result = encode_self_report_within(&info(""), &[], FIXED_FIELDS - 1);
        assert_eq!(
            result,
            Err(DiscoveryError::SelfReportTooLarge {
                budget: FIXED_FIELDS - 1
            })
        );
    }

    #[test]
    fn decode_rejects_name_longer_than_buffer() {
        // declares a 10-byte name but carries 3
        let payload = [0x01, 0x02, 1, 0, 0, 10, b'a', b'b', b'c'];
        assert_eq!(
            decode_self_report(&payload),
            Err(DiscoveryError::Truncated("name"))
        );
    }

    #[test]
    fn decode_rejects_name_over_cap() {
        let mut payload = vec![0x01, 0x02, 1, 0, 0, 33];
        payload.extend_from_slice(&[b'x'; 33]);
        payload.push(0);
        assert_eq!(
            decode_self_report(&payload),
            Err(DiscoveryError::NameTooLong { len: 33, max: 32 })
        );
    }

    #[test]
    fn decode_rejects_missing_or_short_command_list() {
        assert_eq!(
            decode_self_report(&[0x01, 0x02, 1, 0, 0, 1, b'a']),
            Err(DiscoveryError::Truncated("command count"))
        );
        assert_eq!(
            decode_self_report(&[0x01, 0x02, 1, 0, 0, 1, b'a', 3, 0x01]),
            Err(DiscoveryError::Truncated("command list"))
        );
        assert_eq!(
            decode_self_report(&[0x01, 0x02, 1]),
            Err(DiscoveryError::Truncated("header"))
        );
    }

    #[test]
    fn query_filter_encode_decode() {
        let mac = MacAddress([0x02, 1, 2, 3, 4, 5]);
        let filter = QueryFilter::any()
            .with_device_type(DeviceType::new(0x01, 0x02))
            .with_address(mac);
        let payload = filter.encode().unwrap();
        assert_eq!(payload.len(), 1 + 2 + 1 + 6);
        assert_eq!(QueryFilter::decode(&payload).unwrap(), filter);

        assert!(QueryFilter::any().encode().unwrap().is_empty());
        assert_eq!(QueryFilter::decode(&[]).unwrap(), QueryFilter::any());
    }

    #[test]
    fn query_filter_matching() {
        let me = MacAddress([0x02, 0, 0, 0, 0, 1]);
        let other = MacAddress([0x02, 0, 0, 0, 0, 2]);
        let lamp = DeviceType::new(0x01, 0x02);
        let speaker = DeviceType::new(0x03, 0x00);

        assert!(QueryFilter::any().matches(lamp, me));
        assert!(QueryFilter::any().with_device_type(lamp).matches(lamp, me));
        assert!(!QueryFilter::any().with_device_type(speaker).matches(lamp, me));
        assert!(!QueryFilter::any().with_address(other).matches(lamp, me));
        assert!(!QueryFilter::any()
            .with_device_type(lamp)
            .with_address(other)
            .matches(lamp, me));
    }

    #[test]
    fn query_filter_rejects_truncated_payload() {
        assert!(QueryFilter::decode(&[2, 0x01, 0x02]).is_err());
        assert!(QueryFilter::decode(&[0]).is_err());
        assert!(QueryFilter::decode(&[0, 1, 0x02, 0, 0]).is_err());
    }

    #[test]
    fn query_filter_too_large() {
        let mut filter = QueryFilter::any();
        for i in 0..41u8 {
            filter = filter.with_address(MacAddress([0x02, 0, 0, 0, 0, i]));
        }
        assert!(filter.encode().is_err());
    }
}
