/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    /// The frame does not start with the "EQW" magic prefix.
    #[error("invalid frame magic (expected 0x455157 \"EQW\")")]
    InvalidMagic,

    /// The datagram is shorter than the fixed header.
    #[error("frame too short ({len} bytes, header is {header})")]
    TooShort { len: usize, header: usize },

    /// The payload exceeds the maximum size that fits in one datagram.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
