//! Datagram link abstraction for eqwire.
//!
//! The protocol engine talks to the radio through two primitives only:
//! - [`Transport::transmit`] sends one datagram to a hardware address
//! - [`DeliveryHandler::on_receive`] is called by the link, possibly from an
//!   interrupt or foreign thread, for every datagram that arrives
//!
//! This is the lowest layer of eqwire. Two links are provided:
//! - [`LoopbackBus`]: in-process bus for tests and simulations
//! - [`UdpTransport`]: UDP broadcast emulation of the radio on a LAN

pub mod address;
pub mod error;
pub mod loopback;
pub mod traits;
pub mod udp;

pub use address::{MacAddress, ParseMacError, BROADCAST};
pub use error::{Result, TransportError};
pub use loopback::{LoopbackBus, LoopbackTransport};
pub use traits::{DeliveryHandler, Transport, LINK_MTU};
pub use udp::{UdpConfig, UdpTransport, DEFAULT_PORT};
