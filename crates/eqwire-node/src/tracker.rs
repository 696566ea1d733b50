//! Request/reply correlation.
//!
//! Every request gets a non-zero 16-bit id. The reply is recognized by
//! carrying the same id; replies that never arrive are swept once they are
//! older than the reply timeout. Ids wrap after 65535 and an id still
//! pending from a previous cycle would be overwritten; with the default
//! timeout that needs 65535 requests in ten seconds.
//!
//! Correlation is by request id alone, not by peer. Every node starts at
//! id 1, so a fresh request from another station that happens to carry a
//! pending id is consumed as the reply to that pending request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use eqwire_transport::{MacAddress, Transport};
use tracing::debug;

use crate::config::DEFAULT_REPLY_TIMEOUT;
use crate::dispatch::Message;
use crate::error::Result;
use crate::outbox::{transmit_frame, Outbox};

/// Callback run with the reply to a request.
pub type ReplyHandler = Box<dyn FnOnce(&Message<'_>, &mut Outbox<'_>) + Send>;

/// What to do when the reply arrives.
pub enum PendingReply {
    /// Run an application callback.
    Handler(ReplyHandler),
    /// Feed the reply to the built-in discovery handler.
    Discovery,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PendingReply::Handler(_) => f.write_str("Handler(..)"),
            PendingReply::Discovery => f.write_str("Discovery"),
        }
    }
}

struct PendingRequest {
    reply: PendingReply,
    issued_at: Instant,
    dest: MacAddress,
    command: u8,
}

/// Outstanding requests keyed by request id.
pub struct RequestTracker {
    pending: HashMap<u16, PendingRequest>,
    next_id: u16,
    timeout: Duration,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_TIMEOUT)
    }
}

impl RequestTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 1,
            timeout,
        }
    }

    /// Next request id: 1, 2, .., 65535, 1, ..; never 0.
    pub fn allocate_id(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = match self.next_id.wrapping_add(1) {
            0 => 1,
            next => next,
        };
        id
    }

    /// Send a request and remember it until the reply or the timeout.
    ///
    /// Nothing is recorded if the transmit fails.
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        &mut self,
        transport: &dyn Transport,
        dest: &MacAddress,
        command: u8,
        flag: u8,
        payload: &[u8],
        reply: PendingReply,
        now: Instant,
    ) -> Result<u16> {
        let request_id = self.allocate_id();
        transmit_frame(transport, dest, command, flag, request_id, payload)?;
        self.pending.insert(
            request_id,
            PendingRequest {
                reply,
                issued_at: now,
                dest: *dest,
                command,
            },
        );
        debug!(request_id, to = %dest, command, "request issued");
        Ok(request_id)
    }

    /// Claim the pending request matching an inbound frame's id, if any.
    pub fn take(&mut self, request_id: u16) -> Option<PendingReply> {
        if request_id == 0 {
            return None;
        }
        let pending = self.pending.remove(&request_id)?;
        debug!(
            request_id,
            to = %pending.dest,
            command = pending.command,
            "reply correlated"
        );
        Some(pending.reply)
    }

    /// Forget requests older than the timeout. Returns how many were dropped.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.pending.len();
        self.pending.retain(|request_id, pending| {
            let expired = now.saturating_duration_since(pending.issued_at) > timeout;
            if expired {
                debug!(request_id, to = %pending.dest, "request timed out");
            }
            !expired
        });
        before - self.pending.len()
    }

    pub fn is_pending(&self, request_id: u16) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

impl std::fmt::Debug for RequestTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTracker")
            .field("pending", &self.pending.len())
            .field("next_id", &self.next_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use eqwire_transport::{LoopbackBus, TransportError, BROADCAST};

    use super::*;
    use crate::error::NodeError;
    use crate::inbox::ReceiveBuffer;

    const A: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0xa]);

    fn open_station(bus: &LoopbackBus) -> eqwire_transport::LoopbackTransport {
        let mut station = bus.attach(A);
        station
            .open(Arc::new(ReceiveBuffer::new()))
            .expect("loopback open should succeed");
        station
    }

    #[test]
    fn ids_start_at_one_and_skip_zero_on_wrap() {
        let mut tracker = RequestTracker::default();
        assert_eq!(tracker.allocate_id(), 1);
        assert_eq!(tracker.allocate_id(), 2);

        tracker.next_id = u16::MAX;
        assert_eq!(tracker.allocate_id(), u16::MAX);
        assert_eq!(tracker.allocate_id(), 1);
    }

    #[test]
    fn take_removes_entry_once() {
        let bus = LoopbackBus::new();
        let station = open_station(&bus);
        let mut tracker = RequestTracker::default();

        let id = tracker
            .issue(&station, &BROADCAST, 0x01, 0, b"", PendingReply::Discovery, Instant::now())
            .expect("broadcast issue should succeed");
        assert!(tracker.is_pending(id));
        assert!(matches!(tracker.take(id), Some(PendingReply::Discovery)));
        assert!(tracker.take(id).is_none());
        assert!(tracker.take(0).is_none());
    }

    #[test]
    fn failed_transmit_records_nothing() {
        let bus = LoopbackBus::new();
        let station = open_station(&bus);
        let mut tracker = RequestTracker::default();

        let missing = MacAddress([0x02, 9, 9, 9, 9, 9]);
        let result = tracker.issue(
            &station,
            &missing,
            0x01,
            0,
            b"",
            PendingReply::Discovery,
            Instant::now(),
        );
        assert!(matches!(
            result,
            Err(NodeError::Transport(TransportError::Unreachable(_)))
        ));
        assert!(tracker.is_empty());
    }

    #[test]
    fn oversized_payload_is_rejected_before_transmit() {
        let bus = LoopbackBus::new();
        let station = open_station(&bus);
        let mut tracker = RequestTracker::default();
        let result = tracker.issue(
            &station,
            &BROADCAST,
            0x01,
            0,
            &[0u8; 244],
            PendingReply::Discovery,
            Instant::now(),
        );
        assert!(matches!(result, Err(NodeError::Frame(_))));
        assert!(tracker.is_empty());
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let bus = LoopbackBus::new();
        let station = open_station(&bus);
        let mut tracker = RequestTracker::new(Duration::from_millis(100));
        let start = Instant::now();

        let old = tracker
            .issue(&station, &BROADCAST, 1, 0, b"", PendingReply::Discovery, start)
            .unwrap();
        let fresh = tracker
            .issue(
                &station,
                &BROADCAST,
                1,
                0,
                b"",
                PendingReply::Discovery,
                start + Duration::from_millis(80),
            )
            .unwrap();

        // exactly at the timeout is not yet expired
        assert_eq!(tracker.sweep(start + Duration::from_millis(100)), 0);
        assert_eq!(tracker.sweep(start + Duration::from_millis(101)), 1);
        assert!(!tracker.is_pending(old));
        assert!(tracker.is_pending(fresh));
    }
}
