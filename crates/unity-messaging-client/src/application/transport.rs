//! Transport ports used by the messaging client.
//!
//! The client never touches a socket directly.  It asks a [`TransportFactory`]
//! to open a [`Transport`] towards the editor's derived address and then
//! consumes [`TransportEvent`]s from the returned channel.  The tokio socket
//! implementation lives in `infrastructure::network`; tests inject recording
//! or `mockall` doubles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use unity_messaging_core::{ProtocolError, TcpCoordination};

/// Errors raised by the socket layer and the TCP fallback exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The local UDP socket could not be bound.
    #[error("failed to bind messaging socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A datagram could not be handed to the OS.
    #[error("failed to send datagram to {peer}: {source}")]
    SendFailed {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The TCP peer did not connect or finish streaming in time.
    #[error("TCP fallback timed out after {0:?}")]
    TcpTimeout(Duration),

    /// Listening, connecting, reading or writing on the TCP path failed.
    #[error("TCP fallback failed: {0}")]
    TcpFailed(#[source] std::io::Error),

    /// The TCP stream ended before the announced length arrived.
    #[error("TCP fallback short read: expected {expected} bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// The frame header on the TCP stream disagrees with the announced length.
    #[error("TCP fallback frame declares {declared:?} bytes but {announced} were announced")]
    LengthMismatch {
        announced: usize,
        declared: Option<usize>,
    },

    /// An announced large frame exceeds what the client is willing to buffer.
    #[error("announced frame of {0} bytes exceeds the TCP fallback limit")]
    FrameTooLarge(usize),

    /// The coordination frame could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The transport was closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// `true` when the primary UDP socket itself refused a datagram, which
    /// ends the connection.
    pub fn is_primary_send_failure(&self) -> bool {
        matches!(self, Self::SendFailed { .. })
    }
}

/// Something the transport observed on the primary socket.
#[derive(Debug)]
pub enum TransportEvent {
    /// One inbound datagram, undecoded.
    Datagram { bytes: Vec<u8>, origin: SocketAddr },
    /// The socket failed or was closed; the connection is gone.
    Closed { reason: Option<String> },
}

/// An open path to one editor process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one frame as a single datagram to the peer.
    async fn send_datagram(&self, frame: &[u8]) -> Result<(), TransportError>;

    /// Delivers a frame too large for a datagram over the TCP fallback.
    ///
    /// Announces a listener with a coordination frame and resolves once the
    /// peer has connected and the whole frame was written.
    async fn send_large(&self, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Connects to a listener announced by the peer and reads exactly the
    /// announced number of bytes.
    async fn fetch_large(
        &self,
        origin: SocketAddr,
        coordination: TcpCoordination,
    ) -> Result<Vec<u8>, TransportError>;

    /// Address frames are sent to.
    fn peer_addr(&self) -> SocketAddr;

    /// Stops the receive loop and releases the socket.
    fn close(&self);
}

/// A freshly opened transport together with its inbound event stream.
pub struct OpenedTransport {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Opens transports towards a peer address.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self, peer: SocketAddr) -> Result<OpenedTransport, TransportError>;
}
