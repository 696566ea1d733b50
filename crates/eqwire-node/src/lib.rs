//! Protocol engine for eqwire.
//!
//! This is the layer applications talk to. A [`Node`] owns a transport,
//! binds handlers to command ids, correlates requests with replies, answers
//! discovery queries and remembers every peer that reported itself.
//!
//! Inbound datagrams are only queued by the transport's delivery callback;
//! all protocol work happens inside [`Node::process`], which the host calls
//! from its main loop.

pub mod config;
pub mod device;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod inbox;
pub mod node;
pub mod outbox;
pub mod registry;
pub mod tracker;

pub use config::{NodeConfig, DEFAULT_REPLY_TIMEOUT};
pub use device::{DeviceInfo, DeviceName, DeviceType, Version, MAX_NAME_LEN};
pub use discovery::{
    decode_self_report, encode_self_report, QueryFilter, SelfReport, DISCOVERY_COMMAND,
    FLAG_QUERY, FLAG_SELF_REPORT,
};
pub use dispatch::{DispatchTable, Handler, Message, Route};
pub use error::{DiscoveryError, NodeError, Result};
pub use inbox::{QueuedMessage, ReceiveBuffer, INBOX_CAPACITY};
pub use node::{DiscoveryCallback, Node};
pub use outbox::Outbox;
pub use registry::{PeerRecord, PeerRegistry};
pub use tracker::{PendingReply, ReplyHandler, RequestTracker};
