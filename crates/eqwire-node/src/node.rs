use std::sync::Arc;
use std::time::{Duration, Instant};

use eqwire_frame::{decode_frame, CommandTable};
use eqwire_transport::{DeliveryHandler, MacAddress, Transport};
use tracing::{debug, info, trace, warn};

use crate::config::NodeConfig;
use crate::device::{DeviceInfo, DeviceType, Version};
use crate::discovery::{
    decode_self_report, encode_self_report, QueryFilter, DISCOVERY_COMMAND, FLAG_QUERY,
    FLAG_SELF_REPORT,
};
use crate::dispatch::{DispatchTable, Message, Route};
use crate::error::Result;
use crate::inbox::ReceiveBuffer;
use crate::outbox::{transmit_frame, Outbox};
use crate::registry::{PeerRecord, PeerRegistry};
use crate::tracker::{PendingReply, RequestTracker};

/// Callback run for every decoded self-report, with the frame's request id
/// (0 for unsolicited announcements).
pub type DiscoveryCallback = Box<dyn FnMut(&PeerRecord, u16) + Send>;

/// A protocol endpoint on one transport.
///
/// ```ignore
/// let mut node = Node::new(transport);
/// node.begin("lamp", DeviceType::new(0x01, 0x02), Version::new(1, 0, 0))?;
/// node.on(0x01, |msg, out| {
///     let _ = out.reply(msg, 0x00, b"ok");
/// });
/// loop {
///     node.process();
/// }
/// ```
pub struct Node<T: Transport> {
    transport: T,
    inbox: Arc<ReceiveBuffer>,
    dispatch: DispatchTable,
    tracker: RequestTracker,
    peers: PeerRegistry,
    device: DeviceInfo,
    commands: CommandTable,
    config: NodeConfig,
    on_discovery: Option<DiscoveryCallback>,
    open: bool,
}

impl<T: Transport> Node<T> {
    /// Create a node with default configuration and the built-in command table.
    pub fn new(transport: T) -> Self {
        let config = NodeConfig::default();
        Self {
            transport,
            inbox: Arc::new(ReceiveBuffer::new()),
            dispatch: DispatchTable::new(),
            tracker: RequestTracker::new(config.reply_timeout),
            peers: PeerRegistry::new(),
            device: DeviceInfo::default(),
            commands: CommandTable::new(),
            config,
            on_discovery: None,
            open: false,
        }
    }

    /// Override node behavior config.
    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.tracker.set_timeout(config.reply_timeout);
        self.config = config;
        self
    }

    /// Use a command table that includes application-defined names.
    pub fn with_command_table(mut self, commands: CommandTable) -> Self {
        self.commands = commands;
        self
    }

    /// Set the local identity and bring the transport up.
    ///
    /// Calling `begin` again replaces the identity; the transport is only
    /// opened once.
    pub fn begin(&mut self, name: &str, device_type: DeviceType, version: Version) -> Result<()> {
        self.device = DeviceInfo::new(name, device_type, version);
        if !self.open {
            let handler: Arc<dyn DeliveryHandler> = self.inbox.clone();
            self.transport.open(handler)?;
            self.open = true;
        }
        info!(
            name = %self.device.name_lossy(),
            device_type = %device_type,
            version = %version,
            address = %self.transport.local_address(),
            transport = self.transport.transport_name(),
            "node started"
        );
        Ok(())
    }

    /// Bind a handler to a command id, replacing any previous one.
    pub fn on<F>(&mut self, command: u8, handler: F)
    where
        F: FnMut(&Message<'_>, &mut Outbox<'_>) + Send + 'static,
    {
        if self.dispatch.register(command, Box::new(handler)) {
            debug!(command, "replaced command handler");
        }
    }

    /// Bind a handler by command name.
    ///
    /// Unknown names are ignored.
    pub fn on_named<F>(&mut self, name: &str, handler: F)
    where
        F: FnMut(&Message<'_>, &mut Outbox<'_>) + Send + 'static,
    {
        match self.commands.id_for_name(name) {
            Some(command) => self.on(command, handler),
            None => warn!(name, "unknown command name; handler not registered"),
        }
    }

    /// Send one frame; `request_id` 0 means no reply is expected.
    pub fn send(
        &self,
        dest: &MacAddress,
        command: u8,
        flag: u8,
        payload: &[u8],
        request_id: u16,
    ) -> Result<()> {
        transmit_frame(&self.transport, dest, command, flag, request_id, payload)
    }

    /// Send a request and run `on_reply` with the first frame carrying its id.
    ///
    /// Returns the request id. If no reply arrives within the reply timeout
    /// the request is dropped silently.
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
            &self.transport,
            dest,
            command,
            flag,
            payload,
            PendingReply::Handler(Box::new(on_reply)),
            Instant::now(),
        )
    }

    /// Ask stations matching `filter` to report themselves.
    ///
    /// Replies update the peer registry and fire the discovery callback.
    pub fn query_devices(&mut self, dest: &MacAddress, filter: &QueryFilter) -> Result<u16> {
        let payload = filter.encode()?;
        self.tracker.issue(
            &self.transport,
            dest,
            DISCOVERY_COMMAND,
            FLAG_QUERY,
            &payload,
            PendingReply::Discovery,
            Instant::now(),
        )
    }

    /// Send an unsolicited self-report (request id 0).
    pub fn announce(&self, dest: &MacAddress) -> Result<()> {
        self.send_self_report(dest, 0)
    }

    /// Register the callback run for every decoded self-report.
    pub fn on_discovery<F>(&mut self, callback: F)
    where
        F: FnMut(&PeerRecord, u16) + Send + 'static,
    {
        self.on_discovery = Some(Box::new(callback));
    }

    pub fn set_reply_timeout(&mut self, timeout: Duration) {
        self.config.reply_timeout = timeout;
        self.tracker.set_timeout(timeout);
    }

    /// Run one processing cycle. Call this regularly from the main loop.
    ///
    /// Returns the number of datagrams taken from the receive buffer.
    pub fn process(&mut self) -> usize {
        self.process_at(Instant::now())
    }

    /// Run one processing cycle as if the current time were `now`.
    pub fn process_at(&mut self, now: Instant) -> usize {
        let mut queued = self.inbox.drain_all();
        let mut drained = 0;
        while let Some(message) = queued.pop_front() {
            self.handle_datagram(message.source, &message.data, now);
            drained += 1;
        }
        let expired = self.tracker.sweep(now);
        if expired > 0 {
            debug!(expired, "swept timed-out requests");
        }
        drained
    }

    pub fn peer(&self, address: &MacAddress) -> Option<&PeerRecord> {
        self.peers.get(address)
    }

    /// Snapshot of every known peer.
    pub fn peers(&self) -> Vec<PeerRecord> {
        self.peers.list()
    }

    /// Insert or overwrite a peer record directly.
    pub fn store_peer(&mut self, record: PeerRecord) {
        self.peers.upsert(record);
    }

    pub fn pending_requests(&self) -> usize {
        self.tracker.len()
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device
    }

    /// Command ids advertised in self-reports, ascending.
    pub fn registered_commands(&self) -> impl Iterator<Item = u8> + '_ {
        self.dispatch.registered().iter().copied()
    }

    pub fn command_table(&self) -> &CommandTable {
        &self.commands
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn local_address(&self) -> MacAddress {
        self.transport.local_address()
    }

    /// The receive buffer the transport delivers into.
    pub fn inbox(&self) -> Arc<ReceiveBuffer> {
        Arc::clone(&self.inbox)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn handle_datagram(&mut self, source: MacAddress, data: &[u8], now: Instant) {
        let frame = match decode_frame(data) {
            Ok(frame) => frame,
            Err(err) => {
                trace!(%source, %err, "dropping undecodable frame");
                return;
            }
        };
        let message = Message {
            source,
            command: frame.command,
            flag: frame.flag,
            request_id: frame.request_id,
            payload: &frame.payload,
        };

        if let Some(pending) = self.tracker.take(message.request_id) {
            match pending {
                PendingReply::Handler(on_reply) => {
                    let mut outbox = Outbox::new(&self.transport, &mut self.tracker, now);
                    on_reply(&message, &mut outbox);
                }
                PendingReply::Discovery => self.handle_discovery(&message),
            }
            return;
        }

        let mut outbox = Outbox::new(&self.transport, &mut self.tracker, now);
        if self.dispatch.dispatch(&message, &mut outbox) == Route::Discovery {
            self.handle_discovery(&message);
        }
    }

    fn handle_discovery(&mut self, message: &Message<'_>) {
        if message.command != DISCOVERY_COMMAND {
            debug!(
                command = message.command,
                request_id = message.request_id,
                "non-discovery reply to a discovery query; ignoring"
            );
            return;
        }
        match message.flag {
            FLAG_QUERY => self.answer_query(message),
            FLAG_SELF_REPORT => self.ingest_self_report(message),
            flag => trace!(flag, "unknown discovery flag; ignoring"),
        }
    }

    fn answer_query(&self, message: &Message<'_>) {
        if !self.config.answer_queries {
            return;
        }
        let filter = match QueryFilter::decode(message.payload) {
            Ok(filter) => filter,
            Err(err) => {
                debug!(source = %message.source, %err, "dropping malformed query");
                return;
            }
        };
        if !filter.matches(self.device.device_type, self.transport.local_address()) {
            trace!(source = %message.source, "query filter excludes this device");
            return;
        }
        if let Err(err) = self.send_self_report(&message.source, message.request_id) {
            debug!(to = %message.source, %err, "self-report reply failed");
        }
    }

    fn ingest_self_report(&mut self, message: &Message<'_>) {
        let report = match decode_self_report(message.payload) {
            Ok(report) => report,
            Err(err) => {
                debug!(source = %message.source, %err, "dropping malformed self-report");
                return;
            }
        };
        debug!(
            source = %message.source,
            name = %report.info.name_lossy(),
            request_id = message.request_id,
            "peer reported"
        );
        self.peers.upsert(PeerRecord {
            address: message.source,
            info: report.info,
            commands: report.commands,
        });
        if let (Some(callback), Some(record)) =
            (self.on_discovery.as_mut(), self.peers.get(&message.source))
        {
            callback(record, message.request_id);
        }
    }

    fn send_self_report(&self, dest: &MacAddress, request_id: u16) -> Result<()> {
        let commands: Vec<u8> = self.registered_commands().collect();
        let payload = encode_self_report(&self.device, &commands)?;
        transmit_frame(
            &self.transport,
            dest,
            DISCOVERY_COMMAND,
            FLAG_SELF_REPORT,
            request_id,
            &payload,
        )
    }
}

impl<T: Transport> std::fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.transport.local_address())
            .field("device", &self.device)
            .field("dispatch", &self.dispatch)
            .field("tracker", &self.tracker)
            .field("peers", &self.peers.len())
            .field("open", &self.open)
            .finish()
    }
}
