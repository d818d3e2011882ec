//! unity-messaging-client library entry point.
//!
//! Re-exports the public modules so that integration tests in `tests/` and
//! the probe binary in `main.rs` share the same module tree.
//!
//! # What does the client do?
//!
//! A Unity editor listens for UDP messages on a port derived from its own
//! process id.  This crate keeps a session with that editor alive:
//!
//! 1. An external detector reports the editor's process id through a
//!    [`LivenessSource`](application::liveness::LivenessSource).
//! 2. The client opens a UDP socket towards `56000 + pid % 1000` and pings it,
//!    aggressively at first, then at a relaxed pace once the editor answers.
//! 3. Sends issued before the editor is online are queued and flushed in
//!    order as soon as it answers.  Expensive commands are rate limited.
//! 4. Frames too large for a datagram travel over a short-lived TCP
//!    connection announced with a small coordination datagram.
//! 5. Inbound messages are routed to typed handlers; connection and online
//!    transitions are published to observers.

/// Application layer: the messaging client, its state machines and ports.
pub mod application;

/// Infrastructure layer: sockets, liveness adapter and config file.
pub mod infrastructure;

pub use application::error::MessagingError;
pub use application::events::Subscription;
pub use application::messaging_client::{ConnectionStatus, MessagingClient};
pub use application::settings::ClientSettings;
