//! Command id → handler table.

use std::collections::BTreeSet;

use eqwire_transport::MacAddress;
use tracing::trace;

use crate::discovery::DISCOVERY_COMMAND;
use crate::outbox::Outbox;

/// An inbound frame as seen by handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message<'a> {
    /// Hardware address of the sender.
    pub source: MacAddress,
    pub command: u8,
    pub flag: u8,
    /// Correlation token; 0 when the sender expects no reply.
    pub request_id: u16,
    pub payload: &'a [u8],
}

/// A command handler.
pub type Handler = Box<dyn FnMut(&Message<'_>, &mut Outbox<'_>) + Send>;

/// Where [`DispatchTable::dispatch`] sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A bound handler ran.
    Handled,
    /// No handler is bound to the discovery id; the built-in handler applies.
    Discovery,
    /// Nothing is bound; the frame is ignored.
    Ignored,
}

/// One handler slot per command id, plus the set of ids advertised in
/// self-reports.
pub struct DispatchTable {
    handlers: [Option<Handler>; 256],
    registered: BTreeSet<u8>,
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
            registered: BTreeSet::new(),
        }
    }

    /// Bind `handler` to `command`, replacing any previous handler.
    ///
    /// Returns true if a handler was replaced.
    pub fn register(&mut self, command: u8, handler: Handler) -> bool {
        self.registered.insert(command);
        self.handlers[usize::from(command)]
            .replace(handler)
            .is_some()
    }

    /// Ids advertised as supported, ascending.
    pub fn registered(&self) -> &BTreeSet<u8> {
        &self.registered
    }

    /// Route a message to its handler.
    pub fn dispatch(&mut self, message: &Message<'_>, outbox: &mut Outbox<'_>) -> Route {
        match self.handlers[usize::from(message.command)].as_mut() {
            Some(handler) => {
                trace!(command = message.command, source = %message.source, "dispatching");
                handler(message, outbox);
                Route::Handled
            }
            None if message.command == DISCOVERY_COMMAND => Route::Discovery,
            None => {
                trace!(command = message.command, "no handler bound; ignoring frame");
                Route::Ignored
            }
        }
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registered", &self.registered)
            .finish()
    }
}
