/// Errors that can occur in node operations.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Transport-level error, including a rejected transmit.
    #[error("transport error: {0}")]
    Transport(#[from] eqwire_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] eqwire_frame::FrameError),

    /// Discovery payload could not be built.
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

/// Errors raised while encoding or decoding discovery payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiscoveryError {
    /// The payload ended before the named field.
    #[error("self-report truncated at {0}")]
    Truncated(&'static str),

    /// The declared name length exceeds the name cap.
    #[error("device name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Even an empty name and command list do not fit.
    #[error("self-report does not fit in {budget} bytes")]
    SelfReportTooLarge { budget: usize },

    /// A query filter list is malformed or too large.
    #[error("invalid query filter: {0}")]
    InvalidFilter(&'static str),
}

pub type Result<T> = std::result::Result<T, NodeError>;
