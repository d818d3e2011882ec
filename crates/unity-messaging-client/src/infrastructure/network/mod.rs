//! tokio socket implementation of the transport ports.
//!
//! # Shape
//!
//! [`UdpTransportFactory::open`] binds one ephemeral UDP socket per connection
//! and spawns a receive task that turns every datagram into a
//! [`TransportEvent::Datagram`].  The task ends, emitting
//! [`TransportEvent::Closed`], on the first socket error that is not
//! transient; it is aborted when the transport is closed or dropped.
//!
//! # Why an unconnected socket?
//!
//! The editor answers from its listening port, but large-message coordination
//! can arrive from any address the editor chooses.  Keeping the socket
//! unconnected lets every datagram through and leaves origin checks to the
//! client.
//!
//! # Windows and ICMP
//!
//! On Windows, sending to a port nobody listens on makes the *next*
//! `recv_from` fail with `ConnectionReset`.  That happens routinely while an
//! editor is still starting, so it is treated as transient rather than as the
//! socket closing.

pub mod mock;
pub mod tcp_fallback;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use unity_messaging_core::TcpCoordination;

use crate::application::{
    settings::ClientSettings,
    transport::{OpenedTransport, Transport, TransportError, TransportEvent, TransportFactory},
};

/// Largest datagram the receive loop accepts.
const RECV_BUFFER_BYTES: usize = 64 * 1024;

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Factory ───────────────────────────────────────────────────────────────────

/// Opens [`UdpTransport`]s bound to `bind_ip` on an ephemeral port.
#[derive(Debug, Clone)]
pub struct UdpTransportFactory {
    bind_ip: IpAddr,
    tcp_timeout: Duration,
}

impl UdpTransportFactory {
    pub fn new(bind_ip: IpAddr, tcp_timeout: Duration) -> Self {
        Self {
            bind_ip,
            tcp_timeout,
        }
    }

    /// Binds loopback for a loopback editor, otherwise every interface of
    /// the editor's address family.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let bind_ip = match settings.peer_host {
            host if host.is_loopback() => host,
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        Self::new(bind_ip, settings.tcp_timeout)
    }
}

#[async_trait]
impl TransportFactory for UdpTransportFactory {
    async fn open(&self, peer: SocketAddr) -> Result<OpenedTransport, TransportError> {
        let addr = SocketAddr::new(self.bind_ip, 0);
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::BindFailed { addr, source })?;
        let socket = Arc::new(socket);
        if let Ok(local) = socket.local_addr() {
            info!(%local, %peer, "messaging socket bound");
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let receiver = tokio::spawn(receive_loop(Arc::clone(&socket), tx));

        let transport = UdpTransport {
            socket,
            peer,
            bind_ip: self.bind_ip,
            tcp_timeout: self.tcp_timeout,
            receiver,
            closed: AtomicBool::new(false),
        };
        Ok(OpenedTransport {
            transport: Arc::new(transport),
            events: rx,
        })
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

/// One UDP socket towards one editor, plus its TCP fallback.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    bind_ip: IpAddr,
    tcp_timeout: Duration,
    receiver: JoinHandle<()>,
    closed: AtomicBool,
}

impl UdpTransport {
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send_datagram(&self, frame: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.socket
            .send_to(frame, self.peer)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::SendFailed {
                peer: self.peer,
                source,
            })
    }

    async fn send_large(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.ensure_open()?;
        tcp_fallback::serve_frame(&self.socket, self.peer, self.bind_ip, frame, self.tcp_timeout)
            .await
    }

    async fn fetch_large(
        &self,
        origin: SocketAddr,
        coordination: TcpCoordination,
    ) -> Result<Vec<u8>, TransportError> {
        self.ensure_open()?;
        tcp_fallback::fetch_frame(
            origin,
            coordination,
            self.tcp_timeout,
            tcp_fallback::MAX_FETCH_BYTES,
        )
        .await
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(peer = %self.peer, "closing messaging socket");
            self.receiver.abort();
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}

// ── Receive loop ──────────────────────────────────────────────────────────────

async fn receive_loop(socket: Arc<UdpSocket>, events: mpsc::Sender<TransportEvent>) {
    let mut buf = vec![0u8; RECV_BUFFER_BYTES];

    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, origin)) => {
                let event = TransportEvent::Datagram {
                    bytes: buf[..len].to_vec(),
                    origin,
                };
                if events.send(event).await.is_err() {
                    // Receiver dropped: the client has moved on.
                    break;
                }
            }
            Err(e) if is_transient_recv_error(&e) => {
                debug!("ignoring transient recv error: {e}");
            }
            Err(e) => {
                warn!("messaging socket failed: {e}");
                let _ = events
                    .send(TransportEvent::Closed {
                        reason: Some(e.to_string()),
                    })
                    .await;
                break;
            }
        }
    }
}

/// Returns `true` for recv errors that do not mean the socket is gone.
fn is_transient_recv_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use unity_messaging_core::{decode_message, encode_message, Message, MessageType};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn factory() -> UdpTransportFactory {
        UdpTransportFactory::new(LOCALHOST, Duration::from_secs(5))
    }

    #[test]
    fn test_is_transient_recv_error_accepts_connection_reset() {
        // Arrange
        let e = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "icmp");

        // Act / Assert
        assert!(is_transient_recv_error(&e));
    }

    #[test]
    fn test_is_transient_recv_error_rejects_other_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!is_transient_recv_error(&e));
    }

    #[test]
    fn test_from_settings_binds_loopback_for_loopback_peer() {
        let f = UdpTransportFactory::from_settings(&ClientSettings::default());
        assert_eq!(f.bind_ip, LOCALHOST);
    }

    #[tokio::test]
    async fn test_datagrams_flow_both_ways() {
        // Arrange
        let editor = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let editor_addr = editor.local_addr().unwrap();
        let OpenedTransport {
            transport,
            mut events,
        } = factory().open(editor_addr).await.unwrap();

        // Act: client -> editor
        let ping = encode_message(&Message::new(MessageType::Ping, "")).unwrap();
        transport.send_datagram(&ping).await.unwrap();
        let mut buf = [0u8; 64];
        let (len, client_addr) = editor.recv_from(&mut buf).await.unwrap();

        // Act: editor -> client
        let pong = encode_message(&Message::new(MessageType::Pong, "")).unwrap();
        editor.send_to(&pong, client_addr).await.unwrap();
        let event = events.recv().await.unwrap();

        // Assert
        assert_eq!(decode_message(&buf[..len]).unwrap().0.message_type, MessageType::Ping);
        match event {
            TransportEvent::Datagram { bytes, origin } => {
                assert_eq!(bytes, pong);
                assert_eq!(origin, editor_addr);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(transport.peer_addr(), editor_addr);
    }

    #[tokio::test]
    async fn test_closed_transport_refuses_to_send() {
        let editor = UdpSocket::bind((LOCALHOST, 0)).await.unwrap();
        let opened = factory().open(editor.local_addr().unwrap()).await.unwrap();

        opened.transport.close();
        let result = opened.transport.send_datagram(&[0; 8]).await;

        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
