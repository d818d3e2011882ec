//! Recording transport for tests.
//!
//! [`RecordingTransportFactory`] hands out [`RecordingTransport`]s that keep
//! every outbound frame in memory instead of touching a socket.  Tests drive
//! the inbound side with [`RecordingTransport::inject`] and inspect what the
//! client sent with [`RecordingTransport::sent`].
//!
//! ```ignore
//! let factory = Arc::new(RecordingTransportFactory::new());
//! let client = MessagingClient::spawn(settings, &liveness, factory.clone());
//! liveness.report_running(1234);
//!
//! let transport = factory.last_transport().unwrap();
//! transport.inject(Message::new(MessageType::Pong, "")).await;
//! assert_eq!(transport.sent_types(), vec![MessageType::Ping]);
//! ```
//!
//! # Failure flags
//!
//! `fail_sends`, `fail_large` and the factory's `should_fail` switch the
//! corresponding call to an error so callers' failure paths can be exercised.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use unity_messaging_core::{decode_message, encode_message, Message, MessageType, TcpCoordination};

use crate::application::transport::{
    OpenedTransport, Transport, TransportError, TransportEvent, TransportFactory,
};

/// A transport that records instead of sending.
#[derive(Debug)]
pub struct RecordingTransport {
    peer: SocketAddr,
    events: mpsc::Sender<TransportEvent>,
    /// Every frame passed to `send_datagram`, in order.
    pub datagrams: Mutex<Vec<Vec<u8>>>,
    /// Every frame passed to `send_large`, in order.
    pub large_frames: Mutex<Vec<Vec<u8>>>,
    /// Every `(origin, coordination)` passed to `fetch_large`.
    pub fetches: Mutex<Vec<(SocketAddr, TcpCoordination)>>,
    fetch_responses: Mutex<VecDeque<Vec<u8>>>,
    /// When `true`, `send_datagram` and the coordination step of
    /// `send_large` fail with `SendFailed`.
    pub fail_sends: AtomicBool,
    /// When `true`, `send_large` fails with `TcpTimeout`.
    pub fail_large: AtomicBool,
    closed: AtomicBool,
}

impl RecordingTransport {
    fn new(peer: SocketAddr, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            peer,
            events,
            datagrams: Mutex::new(Vec::new()),
            large_frames: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
            fetch_responses: Mutex::new(VecDeque::new()),
            fail_sends: AtomicBool::new(false),
            fail_large: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Decoded datagrams sent so far.
    pub fn sent(&self) -> Vec<Message> {
        self.datagrams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|frame| decode_message(frame).ok().map(|(message, _)| message))
            .collect()
    }

    pub fn sent_types(&self) -> Vec<MessageType> {
        self.sent().into_iter().map(|m| m.message_type).collect()
    }

    /// Number of datagrams of `message_type` sent so far.
    pub fn count(&self, message_type: MessageType) -> usize {
        self.sent()
            .iter()
            .filter(|m| m.message_type == message_type)
            .count()
    }

    /// Delivers `message` to the client as if the peer had sent it.
    pub async fn inject(&self, message: Message) {
        if let Ok(bytes) = encode_message(&message) {
            self.inject_raw(bytes).await;
        }
    }

    /// Delivers raw bytes, which need not be a valid frame.
    pub async fn inject_raw(&self, bytes: Vec<u8>) {
        let _ = self
            .events
            .send(TransportEvent::Datagram {
                bytes,
                origin: self.peer,
            })
            .await;
    }

    /// Simulates the socket failing underneath the client.
    pub async fn close_from_peer(&self, reason: &str) {
        let _ = self
            .events
            .send(TransportEvent::Closed {
                reason: Some(reason.to_string()),
            })
            .await;
    }

    /// Queues the bytes the next `fetch_large` returns.
    pub fn push_fetch_response(&self, frame: Vec<u8>) {
        self.fetch_responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(frame);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_datagram(&self, frame: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                peer: self.peer,
                source: std::io::Error::other("simulated send failure"),
            });
        }
        self.datagrams
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame.to_vec());
        Ok(())
    }

    async fn send_large(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        // The coordination datagram shares the primary socket.
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed {
                peer: self.peer,
                source: std::io::Error::other("simulated send failure"),
            });
        }
        if self.fail_large.load(Ordering::SeqCst) {
            return Err(TransportError::TcpTimeout(Duration::from_secs(5)));
        }
        self.large_frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(frame);
        Ok(())
    }

    async fn fetch_large(
        &self,
        origin: SocketAddr,
        coordination: TcpCoordination,
    ) -> Result<Vec<u8>, TransportError> {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((origin, coordination));
        self.fetch_responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .ok_or(TransportError::ShortRead {
                expected: coordination.length,
                received: 0,
            })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory that records every address it was asked to open.
#[derive(Debug, Default)]
pub struct RecordingTransportFactory {
    /// Peer addresses passed to `open`, in order.
    pub opened: Mutex<Vec<SocketAddr>>,
    /// When `true`, `open` fails with `BindFailed`.
    pub should_fail: AtomicBool,
    transports: Mutex<Vec<Arc<RecordingTransport>>>,
}

impl RecordingTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently opened transport.
    pub fn last_transport(&self) -> Option<Arc<RecordingTransport>> {
        self.transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait]
impl TransportFactory for RecordingTransportFactory {
    async fn open(&self, peer: SocketAddr) -> Result<OpenedTransport, TransportError> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(peer);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(TransportError::BindFailed {
                addr: peer,
                source: std::io::Error::other("simulated bind failure"),
            });
        }

        let (tx, rx) = mpsc::channel(64);
        let transport = Arc::new(RecordingTransport::new(peer, tx));
        self.transports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::clone(&transport));
        Ok(OpenedTransport {
            transport,
            events: rx,
        })
    }
}
