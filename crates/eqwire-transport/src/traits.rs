use std::sync::Arc;

use crate::address::MacAddress;
use crate::error::Result;

/// Maximum datagram size carried by the link, in bytes.
pub const LINK_MTU: usize = 250;

/// Receives datagrams from a link.
///
/// `on_receive` may be invoked from an interrupt handler or a link-owned
/// thread. Implementations must not block for long and must not call back
/// into the transport.
pub trait DeliveryHandler: Send + Sync {
    /// Called once per received datagram.
    fn on_receive(&self, source: MacAddress, data: &[u8]);
}

/// A connectionless, unordered datagram link.
pub trait Transport: Send {
    /// Bring the link up and register the delivery handler.
    ///
    /// The handler is an explicit handle: a link never reaches engine state
    /// through anything other than what was passed here.
    fn open(&mut self, handler: Arc<dyn DeliveryHandler>) -> Result<()>;

    /// Send one datagram to `dest` (possibly [`BROADCAST`](crate::BROADCAST)).
    fn transmit(&self, dest: &MacAddress, data: &[u8]) -> Result<()>;

    /// This station's hardware address.
    fn local_address(&self) -> MacAddress;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, handler: Arc<dyn DeliveryHandler>) -> Result<()> {
        (**self).open(handler)
    }

    fn transmit(&self, dest: &MacAddress, data: &[u8]) -> Result<()> {
        (**self).transmit(dest, data)
    }

    fn local_address(&self) -> MacAddress {
        (**self).local_address()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
