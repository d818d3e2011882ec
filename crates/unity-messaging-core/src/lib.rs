//! # unity-messaging-core
//!
//! Shared library for the Unity messaging client containing the binary wire
//! codec, the message type table, and the pure domain helpers (port
//! derivation, liveness payloads, test-mode encoding).
//!
//! It has zero dependencies on sockets or an async runtime, so everything in
//! here can be unit tested without touching the network.
//!
//! # Architecture overview (for beginners)
//!
//! The messaging client talks to a running Unity editor process over UDP on
//! localhost.  The editor listens on a port derived from its own process id,
//! so the client never needs a configured address: once it knows the process
//! id it knows where to send.
//!
//! - **`protocol`** – How bytes travel over the wire.  Every datagram is a
//!   single frame: a 4-byte message type, a 4-byte payload length, and a
//!   UTF-8 payload.  Frames that would not fit in one datagram are moved over
//!   a short-lived TCP connection announced by a small coordination frame.
//!
//! - **`domain`** – Protocol-adjacent data with no I/O: the port formula, the
//!   process liveness payload delivered by the editor detector, and the
//!   `"<mode>:<name>"` encoding used by the test-runner messages.

pub mod domain;
pub mod protocol;

// Re-export the most-used items at the crate root so callers can write
// `unity_messaging_core::Message` instead of the full module path.
pub use domain::ports::{
    detector_port, messaging_port, peer_port, DETECTOR_BASE_PORT, MESSAGING_BASE_PORT,
};
pub use domain::process::{ProcessFlags, ProcessState};
pub use domain::test_mode::TestMode;
pub use protocol::codec::{decode_message, encode_message, ProtocolError};
pub use protocol::messages::{Message, MessageType, TcpCoordination};
