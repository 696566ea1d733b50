//! Datagram framing for eqwire.
//!
//! Every frame carries a fixed 7-byte header followed by the payload:
//! - A 3-byte magic prefix ("EQW") that rejects foreign traffic on the channel
//! - A 1-byte command id
//! - A 1-byte flag selecting a command-specific sub-operation
//! - A 2-byte big-endian request id correlating replies with requests
//!
//! One frame is always exactly one datagram; there is no reassembly.

pub mod codec;
pub mod command;
pub mod error;

pub use codec::{
    decode_frame, encode_frame, Frame, HEADER_SIZE, MAGIC, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE,
};
pub use command::{
    command_name, is_user_command, CommandTable, BUILTIN_COMMANDS, INVALID_COMMAND, SYSTEM_COMMAND,
    USER_COMMAND_END, USER_COMMAND_START,
};
pub use error::{FrameError, Result};
