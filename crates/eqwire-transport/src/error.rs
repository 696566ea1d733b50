use crate::address::MacAddress;

/// Errors that can occur in link transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the link socket.
    #[error("failed to bind port {port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    /// The datagram exceeds the link MTU.
    #[error("datagram too large ({size} bytes, max {max})")]
    DatagramTooLarge { size: usize, max: usize },

    /// No station with this address is reachable on the link.
    #[error("destination {0} unreachable")]
    Unreachable(MacAddress),

    /// The transport was used before [`Transport::open`](crate::Transport::open).
    #[error("transport not open")]
    NotOpen,

    /// The transport is already open.
    #[error("transport already open")]
    AlreadyOpen,

    /// An I/O error occurred on the link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link stopped after a receive failure.
    #[error("transport shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, TransportError>;
