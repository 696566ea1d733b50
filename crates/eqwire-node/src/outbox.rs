//! Sending from inside handlers.

use std::time::Instant;

use bytes::BytesMut;
use eqwire_frame::{encode_frame, MAX_FRAME_SIZE};
use eqwire_transport::{MacAddress, Transport};
use tracing::trace;

use crate::dispatch::Message;
use crate::error::Result;
use crate::tracker::{PendingReply, RequestTracker};

/// Send capability handed to command and reply handlers.
pub struct Outbox<'a> {
    transport: &'a dyn Transport,
    tracker: &'a mut RequestTracker,
    now: Instant,
}

impl<'a> Outbox<'a> {
    pub(crate) fn new(
        transport: &'a dyn Transport,
        tracker: &'a mut RequestTracker,
        now: Instant,
    ) -> Self {
        Self {
            transport,
            tracker,
            now,
        }
    }

    /// This station's hardware address.
    pub fn local_address(&self) -> MacAddress {
        self.transport.local_address()
    }

    /// Send one frame.
    pub fn send(
        &self,
        dest: &MacAddress,
        command: u8,
        flag: u8,
        payload: &[u8],
        request_id: u16,
    ) -> Result<()> {
        transmit_frame(self.transport, dest, command, flag, request_id, payload)
    }

    /// Answer `message`: same command, same request id, back to its sender.
    pub fn reply(&self, message: &Message<'_>, flag: u8, payload: &[u8]) -> Result<()> {
        self.send(
            &message.source,
            message.command,
            flag,
            payload,
            message.request_id,
        )
    }

    /// Issue a correlated request from inside a handler.
    pub fn request<F>(
        &mut self,
        dest: &MacAddress,
        command: u8,
        flag: u8,
        payload: &[u8],
        on_reply: F,
    ) -> Result<u16>
    where
        F: FnOnce(&Message<'_>, &mut Outbox<'_>) + Send + 'static,
    {
        self.tracker.issue(
            self.transport,
            dest,
            command,
            flag,
            payload,
            PendingReply::Handler(Box::new(on_reply)),
            self.now,
        )
    }
}

/// Encode a frame and hand it to the transport.
pub(crate) fn transmit_frame(
    transport: &dyn Transport,
    dest: &MacAddress,
    command: u8,
    flag: u8,
    request_id: u16,
    payload: &[u8],
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);
    encode_frame(command, flag, request_id, payload, &mut buf)?;
    transport.transmit(dest, &buf)?;
    trace!(to = %dest, command, flag, request_id, len = buf.len(), "frame sent");
    Ok(())
}
