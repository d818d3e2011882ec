//! Application layer of the messaging client.
//!
//! # What lives here?
//!
//! - **`messaging_client`** – The public [`MessagingClient`] facade and the
//!   actor task that owns every piece of mutable connection state.
//!
//! - **`heartbeat`**, **`rate_limit`**, **`queue`**, **`pending`** – The small
//!   state machines the actor drives.  None of them touch a clock or a socket
//!   on their own; they are handed `Instant`s and return decisions, which keeps
//!   them trivially testable.
//!
//! - **`events`** – Typed observers with RAII subscriptions.
//!
//! - **`transport`**, **`liveness`** – Ports.  The actor talks to sockets and
//!   to the process detector only through these traits; the infrastructure
//!   layer implements them.
//!
//! **Dependency rule**: this layer depends on `unity_messaging_core` only and
//! MUST NOT import `infrastructure`.
//!
//! [`MessagingClient`]: messaging_client::MessagingClient

pub mod error;
pub mod events;
pub mod heartbeat;
pub mod liveness;
pub mod messaging_client;
pub mod pending;
pub mod queue;
pub mod rate_limit;
pub mod settings;
pub mod transport;
