//! Port for the external process detector.
//!
//! Only the detector can tell a dead editor from one that is merely busy
//! recompiling, so the client never reconnects on its own: every connect is
//! driven by a `running` state arriving through this port.

use tokio::sync::mpsc;
use unity_messaging_core::ProcessState;

/// Publishes editor process lifecycle changes.
pub trait LivenessSource: Send + Sync {
    /// Returns a receiver that yields every reported state, in order.
    ///
    /// The first item is the state current at subscription time; the client
    /// applies it as its initial state.  Reports are never coalesced, so a
    /// quick "gone" followed by "running" is seen as two transitions.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProcessState>;
}
