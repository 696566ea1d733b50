//! In-process datagram bus.
//!
//! Every [`LoopbackTransport`] attached to the same [`LoopbackBus`] behaves
//! like a radio sharing one channel: broadcasts reach every other open
//! station, unicasts reach the addressed station or fail as unreachable.
//! Delivery is synchronous on the sender's thread, which stands in for the
//! link's interrupt context.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::address::MacAddress;
use crate::error::{Result, TransportError};
use crate::traits::{DeliveryHandler, Transport, LINK_MTU};

type Stations = BTreeMap<MacAddress, Option<Arc<dyn DeliveryHandler>>>;

/// Shared medium connecting loopback stations.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    stations: Arc<Mutex<Stations>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a station with the given hardware address.
    ///
    /// The station does not receive anything until [`Transport::open`] is called.
    pub fn attach(&self, address: MacAddress) -> LoopbackTransport {
        lock(&self.stations).insert(address, None);
        LoopbackTransport {
            address,
            stations: Arc::clone(&self.stations),
        }
    }

    /// Number of attached stations.
    pub fn station_count(&self) -> usize {
        lock(&self.stations).len()
    }
}

impl std::fmt::Debug for LoopbackBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackBus")
            .field("stations", &lock(&self.stations).keys().collect::<Vec<_>>())
            .finish()
    }
}

/// One station on a [`LoopbackBus`].
pub struct LoopbackTransport {
    address: MacAddress,
    stations: Arc<Mutex<Stations>>,
}

impl Transport for LoopbackTransport {
    fn open(&mut self, handler: Arc<dyn DeliveryHandler>) -> Result<()> {
        lock(&self.stations).insert(self.address, Some(handler));
        debug!(address = %self.address, "loopback station open");
        Ok(())
    }

    fn transmit(&self, dest: &MacAddress, data: &[u8]) -> Result<()> {
        if data.len() > LINK_MTU {
            return Err(TransportError::DatagramTooLarge {
                size: data.len(),
                max: LINK_MTU,
            });
        }

        let receivers: Vec<Arc<dyn DeliveryHandler>> = {
            let stations = lock(&self.stations);
            match stations.get(&self.address) {
                Some(Some(_)) => {}
                _ => return Err(TransportError::NotOpen),
            }
            if dest.is_broadcast() {
                stations
                    .iter()
                    .filter(|(address, _)| **address != self.address)
                    .filter_map(|(_, handler)| handler.clone())
                    .collect()
            } else {
                match stations.get(dest) {
                    Some(Some(handler)) => vec![Arc::clone(handler)],
                    _ => return Err(TransportError::Unreachable(*dest)),
                }
            }
        };

        trace!(
            from = %self.address,
            to = %dest,
            len = data.len(),
            receivers = receivers.len(),
            "loopback transmit"
        );
        for handler in receivers {
            handler.on_receive(self.address, data);
        }
        Ok(())
    }

    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn transport_name(&self) -> &'static str {
        "loopback"
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        lock(&self.stations).remove(&self.address);
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("address", &self.address)
            .finish()
    }
}

fn lock(stations: &Mutex<Stations>) -> MutexGuard<'_, Stations> {
    stations.lock().unwrap_or_else(PoisonError::into_inner)
}
