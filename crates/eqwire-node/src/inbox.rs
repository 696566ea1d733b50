//! Hand-off queue between the transport's delivery context and `process()`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use eqwire_transport::{DeliveryHandler, MacAddress, LINK_MTU};
use heapless::Deque;
use tracing::{debug, trace};

/// Number of datagrams held between two processing cycles.
pub const INBOX_CAPACITY: usize = 10;

/// One datagram waiting for the next processing cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub source: MacAddress,
    pub data: heapless::Vec<u8, LINK_MTU>,
}

/// Bounded, thread-safe receive queue.
///
/// `push` is called from the delivery context, `drain_all` from the
/// processing context. When the queue is full new datagrams are dropped.
pub struct ReceiveBuffer {
    queue: Mutex<Deque<QueuedMessage, INBOX_CAPACITY>>,
}

impl Default for ReceiveBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Deque::new()),
        }
    }

    /// Queue a datagram. Returns `false` if it was dropped.
    pub fn push(&self, source: MacAddress, data: &[u8]) -> bool {
        let Ok(data) = heapless::Vec::<u8, LINK_MTU>::from_slice(data) else {
            debug!(%source, len = data.len(), "dropping oversized datagram");
            return false;
        };
        match self.lock().push_back(QueuedMessage { source, data }) {
            Ok(()) => true,
            Err(dropped) => {
                debug!(source = %dropped.source, "receive buffer full; dropping datagram");
                false
            }
        }
    }

    /// Take every queued datagram, oldest first, leaving the buffer empty.
    pub fn drain_all(&self) -> Deque<QueuedMessage, INBOX_CAPACITY> {
        let drained = std::mem::replace(&mut *self.lock(), Deque::new());
        if !drained.is_empty() {
            trace!(count = drained.len(), "drained receive buffer");
        }
        drained
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Deque<QueuedMessage, INBOX_CAPACITY>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeliveryHandler for ReceiveBuffer {
    fn on_receive(&self, source: MacAddress, data: &[u8]) {
        self.push(source, data);
    }
}

impl std::fmt::Debug for ReceiveBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReceiveBuffer")
            .field("queued", &self.len())
            .field("capacity", &INBOX_CAPACITY)
            .finish()
    }
}
