//! Error type surfaced by every public [`MessagingClient`] operation.
//!
//! [`MessagingClient`]: crate::application::messaging_client::MessagingClient

use std::time::Duration;

use thiserror::Error;
use unity_messaging_core::{MessageType, ProtocolError};

use crate::application::transport::TransportError;

/// Why a send or request did not complete.
///
/// `RateLimited` is an intentional discard and is kept distinct from
/// transport failures so callers can tell "the editor never saw this" apart
/// from "we chose not to send this".
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The message type was sent too recently; this attempt was dropped.
    #[error("{message_type} discarded by rate limit; retry in {retry_after:?}")]
    RateLimited {
        message_type: MessageType,
        retry_after: Duration,
    },

    /// No editor process is connected, so the frame had nowhere to go.
    #[error("not connected to an editor process")]
    NotConnected,

    /// The socket or the TCP fallback failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The frame could not be encoded or a fetched frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The client was disposed before the operation settled.
    #[error("messaging client has been disposed")]
    Disposed,
}

impl MessagingError {
    /// `true` for the rate-limit discard outcome.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, MessagingError::RateLimited { .. })
    }
}
