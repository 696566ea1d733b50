//! Point-to-multipoint datagram protocol with command dispatch and device discovery.
//!
//! eqwire frames small commands for a shared broadcast link (an ESP-NOW style
//! radio, or a LAN emulating one), routes inbound frames to per-command
//! handlers, correlates requests with replies and lets stations discover each
//! other.
//!
//! # Crate Structure
//!
//! - [`transport`]: link abstraction, hardware addresses, loopback and UDP links
//! - [`frame`]: frame codec and the command-name table
//! - [`node`]: the protocol engine (dispatch, requests, discovery, peers)

/// Re-export transport types.
pub mod transport {
    pub use eqwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eqwire_frame::*;
}

/// Re-export protocol engine types.
pub mod node {
    pub use eqwire_node::*;
}
