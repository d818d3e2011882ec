//! Binary codec for encoding and decoding Unity messaging frames.
//!
//! Wire format:
//! ```text
//! [type:4][payload_len:4][payload:N]
//! ```
//! Total header size: 8 bytes.  Both integers are signed 32-bit little-endian;
//! the payload is the UTF-8 encoding of the message value.
//!
//! The codec is pure: it never touches a socket and never allocates more than
//! the single output buffer.

use thiserror::Error;
use tracing::trace;

use crate::protocol::messages::{Message, MessageType, HEADER_SIZE};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the fixed header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared payload length exceeds the bytes that follow the header.
    #[error("payload length mismatch: header says {declared}, available is {available}")]
    PayloadLengthMismatch { declared: usize, available: usize },

    /// The header declares a negative payload length.
    #[error("negative payload length: {0}")]
    NegativeLength(i32),

    /// The payload bytes are not valid UTF-8.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The value is too long to be described by a 32-bit length field.
    #[error("payload of {0} bytes does not fit in a frame")]
    PayloadTooLarge(usize),

    /// A `Tcp` coordination value is not `"<port>:<length>"`.
    #[error("malformed TCP coordination value: {0:?}")]
    MalformedCoordination(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Message`] into a frame including the 8-byte header.
///
/// The `origin` field is never serialised.
///
/// # Errors
///
/// Returns [`ProtocolError::PayloadTooLarge`] if the value is longer than
/// `i32::MAX` bytes.
///
/// # Examples
///
/// ```rust
/// use unity_messaging_core::{decode_message, encode_message, Message, MessageType};
///
/// let msg = Message::new(MessageType::Ping, "");
/// let bytes = encode_message(&msg).unwrap();
/// assert_eq!(bytes.len(), 8);
/// let (decoded, consumed) = decode_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let payload = msg.value.as_bytes();
    let payload_len =
        i32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge(payload.len()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&msg.message_type.code().to_le_bytes());
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Decodes one [`Message`] from the beginning of `bytes`.
///
/// Returns the decoded message and the number of bytes consumed
/// (header + payload).  Trailing bytes are left for the caller.  Tags outside
/// the known table decode as [`MessageType::Unknown`].
///
/// # Errors
///
/// Returns [`ProtocolError`] when the buffer is shorter than the header,
/// shorter than the declared payload, or the payload is not UTF-8.
pub fn decode_message(bytes: &[u8]) -> Result<(Message, usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let code = read_i32_le(bytes, 0);
    let declared = read_i32_le(bytes, 4);
    let payload_len =
        usize::try_from(declared).map_err(|_| ProtocolError::NegativeLength(declared))?;

    let available = bytes.len() - HEADER_SIZE;
    if available < payload_len {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared: payload_len,
            available,
        });
    }

    let payload = &bytes[HEADER_SIZE..HEADER_SIZE + payload_len];
    let value = std::str::from_utf8(payload)
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?
        .to_string();

    let message_type = MessageType::from_code(code);
    if message_type.is_unknown() {
        trace!("decoded frame with unknown message type {code}");
    }

    Ok((
        Message {
            message_type,
            value,
            origin: None,
        },
        HEADER_SIZE + payload_len,
    ))
}

/// Reads the declared total frame length from a header without decoding it.
///
/// The TCP fallback reader uses it to check a stream's header against the
/// length announced in the coordination message.
pub fn peek_frame_len(header: &[u8]) -> Option<usize> {
    if header.len() < HEADER_SIZE {
        return None;
    }
    usize::try_from(read_i32_le(header, 4))
        .ok()
        .map(|len| HEADER_SIZE + len)
}

fn read_i32_le(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
