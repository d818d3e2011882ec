//! Infrastructure layer of the messaging client.
//!
//! Contains the OS-facing adapters for the application ports:
//!
//! - **`network`** – tokio UDP transport with the TCP fallback, plus a
//!   recording transport for tests and dry runs.
//! - **`liveness`** – A [`LivenessSource`](crate::application::liveness::LivenessSource)
//!   fed by explicit reports from whatever detects the editor process.
//! - **`storage`** – TOML configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `unity_messaging_core`, but MUST NOT be imported by the application layer.

pub mod liveness;
pub mod network;
pub mod storage;
