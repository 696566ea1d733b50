//! Known peers, keyed by hardware address.

use std::collections::BTreeMap;

use eqwire_transport::MacAddress;

use crate::device::DeviceInfo;

/// The latest self-report seen from one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: MacAddress,
    pub info: DeviceInfo,
    /// Command ids the peer advertises.
    pub commands: Vec<u8>,
}

impl PeerRecord {
    /// Whether the peer advertises `command`.
    pub fn supports(&self, command: u8) -> bool {
        self.commands.contains(&command)
    }
}

/// Peer storage without eviction; pruning is left to the application.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: BTreeMap<MacAddress, PeerRecord>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `record.address`.
    ///
    /// Returns the previous record, if any.
    pub fn upsert(&mut self, record: PeerRecord) -> Option<PeerRecord> {
        self.peers.insert(record.address, record)
    }

    pub fn get(&self, address: &MacAddress) -> Option<&PeerRecord> {
        self.peers.get(address)
    }

    /// Snapshot of every record, ordered by address.
    pub fn list(&self) -> Vec<PeerRecord> {
        self.peers.values().cloned().collect()
    }

    pub fn remove(&mut self, address: &MacAddress) -> Option<PeerRecord> {
        self.peers.remove(address)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceType, Version};

    fn record(last: u8, name: &str) -> PeerRecord {
        PeerRecord {
            address: MacAddress([0x02, 0, 0, 0, 0, last]),
            info: DeviceInfo::new(name, DeviceType::new(1, 1), Version::new(1, 0, 0)),
            commands: vec![0x01],
        }
    }

    #[test]
    fn upsert_overwrites_and_returns_previous() {
        let mut registry = PeerRegistry::new();
        assert!(registry.upsert(record(1, "old")).is_none());
        let previous = registry.upsert(record(1, "new")).expect("previous record");
        assert_eq!(previous.info.name(), b"old");
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(&MacAddress([0x02, 0, 0, 0, 0, 1])).unwrap().info.name(),
            b"new"
        );
    }

    #[test]
    fn list_is_a_snapshot_ordered_by_address() {
        let mut registry = PeerRegistry::new();
        registry.upsert(record(9, "b"));
        registry.upsert(record(3, "a"));
        let snapshot = registry.list();
        registry.remove(&MacAddress([0x02, 0, 0, 0, 0, 3]));

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].address.0[5], 3);
        assert_eq!(snapshot[1].address.0[5], 9);
        assert_eq!(registry.len(), 1);
        assert!(snapshot[0].supports(0x01));
        assert!(!snapshot[0].supports(0x02));
    }
}
