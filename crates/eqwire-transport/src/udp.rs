//! UDP broadcast emulation of the radio link.
//!
//! Every station binds the same UDP port and sends every datagram to the
//! IPv4 broadcast address, so the LAN behaves like one shared radio channel.
//! Each UDP datagram carries a 12-byte link header in front of the frame:
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────────┐
//! │ Dest (6B)    │ Source (6B)  │ Frame (≤ 250B)   │
//! └──────────────┴──────────────┴──────────────────┘
//! ```
//!
//! Stations drop datagrams that are neither addressed to them nor broadcast,
//! and their own datagrams looped back by the kernel.

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::address::MacAddress;
use crate::error::{Result, TransportError};
use crate::traits::{DeliveryHandler, Transport, LINK_MTU};

/// Default UDP port shared by all stations.
pub const DEFAULT_PORT: u16 = 47_474;

const LINK_HEADER_SIZE: usize = 2 * MacAddress::LEN;
const MAX_DATAGRAM: usize = LINK_HEADER_SIZE + LINK_MTU;

/// Configuration for [`UdpTransport`].
#[derive(Debug, Clone)]
pub struct UdpConfig {
    /// UDP port shared by every station on the emulated channel.
    pub port: u16,
    /// IPv4 broadcast address datagrams are sent to.
    pub broadcast: Ipv4Addr,
    /// This station's hardware address.
    pub address: MacAddress,
    /// Poll interval of the receive thread; bounds shutdown latency.
    pub read_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            broadcast: Ipv4Addr::BROADCAST,
            address: MacAddress::generate_local(),
            read_timeout: Duration::from_millis(200),
        }
    }
}

/// Emulated radio link over UDP broadcast.
pub struct UdpTransport {
    config: UdpConfig,
    socket: Option<Arc<UdpSocket>>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl UdpTransport {
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            socket: None,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Whether the receive thread is running.
    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }
}

impl Transport for UdpTransport {
    fn open(&mut self, handler: Arc<dyn DeliveryHandler>) -> Result<()> {
        if self.socket.is_some() {
            return Err(TransportError::AlreadyOpen);
        }

        let port = self.config.port;
        let bind_err = |source| TransportError::Bind { port, source };
        let socket = bind_shared(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).map_err(bind_err)?;
        socket.set_broadcast(true).map_err(bind_err)?;
        socket
            .set_read_timeout(Some(self.config.read_timeout))
            .map_err(bind_err)?;
        let socket = Arc::new(socket);

        self.running.store(true, Ordering::SeqCst);
        let rx_socket = Arc::clone(&socket);
        let running = Arc::clone(&self.running);
        let local = self.config.address;
        let worker = std::thread::Builder::new()
            .name("eqwire-udp-rx".to_string())
            .spawn(move || receive_loop(&rx_socket, local, &running, handler.as_ref()))?;

        info!(port, address = %local, "udp link open");
        self.socket = Some(socket);
        self.worker = Some(worker);
        Ok(())
    }

    fn transmit(&self, dest: &MacAddress, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotOpen)?;
        if !self.running.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown);
        }
        if data.len() > LINK_MTU {
            return Err(TransportError::DatagramTooLarge {
                size: data.len(),
                max: LINK_MTU,
            });
        }

        let mut datagram = [0u8; MAX_DATAGRAM];
        datagram[..6].copy_from_slice(&dest.0);
        datagram[6..12].copy_from_slice(&self.config.address.0);
        datagram[LINK_HEADER_SIZE..LINK_HEADER_SIZE + data.len()].copy_from_slice(data);
        let len = LINK_HEADER_SIZE + data.len();

        socket.send_to(
            &datagram[..len],
            SocketAddrV4::new(self.config.broadcast, self.config.port),
        )?;
        trace!(to = %dest, len = data.len(), "udp transmit");
        Ok(())
    }

    fn local_address(&self) -> MacAddress {
        self.config.address
    }

    fn transport_name(&self) -> &'static str {
        "udp-broadcast"
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("udp receive thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

fn receive_loop(
    socket: &UdpSocket,
    local: MacAddress,
    running: &AtomicBool,
    handler: &dyn DeliveryHandler,
) {
    let mut buf = [0u8; MAX_DATAGRAM + 1];
    while running.load(Ordering::SeqCst) {
        let len = match socket.recv_from(&mut buf) {
            Ok((len, _)) => len,
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock
                        | std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue
            }
            Err(err) => {
                warn!(%err, "udp receive failed; stopping link");
                running.store(false, Ordering::SeqCst);
                break;
            }
        };

        if let Some((source, frame)) = accept_datagram(&buf[..len], local) {
            handler.on_receive(source, frame);
        }
    }
    debug!("udp receive thread exiting");
}

/// Strip the link header and apply address filtering.
fn accept_datagram(datagram: &[u8], local: MacAddress) -> Option<(MacAddress, &[u8])> {
    if datagram.len() < LINK_HEADER_SIZE || datagram.len() > MAX_DATAGRAM {
        trace!(len = datagram.len(), "dropping malformed udp datagram");
        return None;
    }
    let dest = MacAddress::from_slice(&datagram[..6])?;
    let source = MacAddress::from_slice(&datagram[6..12])?;
    if source == local || !local.accepts(&dest) {
        return None;
    }
    Some((source, &datagram[LINK_HEADER_SIZE..]))
}

/// Bind a UDP socket that several processes on one host can share.
#[cfg(any(target_os = "linux", target_os = "macos"))]
fn bind_shared(addr: SocketAddrV4) -> std::io::Result<UdpSocket> {
    use std::os::fd::FromRawFd;

    // SAFETY: plain socket(2) call; the returned descriptor is checked below.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: `fd` is a freshly created socket owned by nobody else; the
    // UdpSocket takes ownership and closes it on drop (including error paths).
    let socket = unsafe { UdpSocket::from_raw_fd(fd) };

    let one: libc::c_int = 1;
    for option in [libc::SO_REUSEADDR, libc::SO_REUSEPORT] {
        // SAFETY: `one` is a valid c_int for the duration of the call and the
        // length matches its size.
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                option,
                (&one as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
    let mut sin: libc::sockaddr_in = unsafe { std::mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = addr.port().to_be();
    sin.sin_addr = libc::in_addr {
        s_addr: u32::from(*addr.ip()).to_be(),
    };
    // SAFETY: `sin` is a fully initialized sockaddr_in and the length matches.
    let rc = unsafe {
        libc::bind(
            fd,
            (&sin as *const libc::sockaddr_in).cast::<libc::sockaddr>(),
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(socket)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn bind_shared(addr: SocketAddrV4) -> std::io::Result<UdpSocket> {
    UdpSocket::bind(addr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::BROADCAST;

    const LOCAL: MacAddress = MacAddress([0x02, 1, 1, 1, 1, 1]);
    const OTHER: MacAddress = MacAddress([0x02, 2, 2, 2, 2, 2]);

    fn datagram(dest: MacAddress, source: MacAddress, frame: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&dest.0);
        out.extend_from_slice(&source.0);
        out.extend_from_slice(frame);
        out
    }

    #[test]
    fn accepts_broadcast_and_unicast_to_self() {
        let bcast = datagram(BROADCAST, OTHER, b"frame");
        assert_eq!(
            accept_datagram(&bcast, LOCAL),
            Some((OTHER, b"frame".as_ref()))
        );

        let unicast = datagram(LOCAL, OTHER, b"x");
        assert_eq!(accept_datagram(&unicast, LOCAL), Some((OTHER, b"x".as_ref())));
    }

    #[test]
    fn drops_foreign_unicast_and_own_echo() {
        let foreign = datagram(MacAddress([0x02, 9, 9, 9, 9, 9]), OTHER, b"x");
        assert_eq!(accept_datagram(&foreign, LOCAL), None);

        let echo = datagram(BROADCAST, LOCAL, b"x");
        assert_eq!(accept_datagram(&echo, LOCAL), None);
    }

    #[test]
    fn drops_short_and_oversized_datagrams() {
        assert_eq!(accept_datagram(&[0u8; 11], LOCAL), None);
        let big = datagram(BROADCAST, OTHER, &[0u8; LINK_MTU + 1]);
        assert_eq!(accept_datagram(&big, LOCAL), None);
    }

    #[test]
    fn transmit_before_open_fails() {
        let transport = UdpTransport::new(UdpConfig {
            address: LOCAL,
            ..UdpConfig::default()
        });
        assert!(matches!(
            transport.transmit(&BROADCAST, b"x"),
            Err(TransportError::NotOpen)
        ));
        assert_eq!(transport.local_address(), LOCAL);
    }
}
