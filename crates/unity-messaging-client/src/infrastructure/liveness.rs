//! A liveness source driven by explicit reports.
//!
//! Real process detection (scanning the editor's process table or listening
//! on the detector port) is outside this crate.  Whatever performs it pushes
//! its findings into a [`ManualLivenessSource`]; tests do the same by hand.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;
use unity_messaging_core::ProcessState;

use crate::application::liveness::LivenessSource;

#[derive(Debug)]
struct Inner {
    current: ProcessState,
    subscribers: Vec<mpsc::UnboundedSender<ProcessState>>,
}

/// Fans every reported [`ProcessState`] out to all subscribers.
#[derive(Debug)]
pub struct ManualLivenessSource {
    inner: Mutex<Inner>,
}

impl ManualLivenessSource {
    /// Starts with the editor reported as not running.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                current: ProcessState::stopped(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Publishes `state` to every live subscriber.
    ///
    /// Each report is delivered separately, even if it equals the previous
    /// state, so re-reporting a running editor after a socket failure
    /// triggers a reconnect.
    pub fn report(&self, state: ProcessState) {
        debug!(?state, "liveness reported");
        let mut inner = self.lock();
        inner.current = state;
        inner.subscribers.retain(|tx| tx.send(state).is_ok());
    }

    pub fn report_running(&self, process_id: u32) {
        self.report(ProcessState::running(process_id));
    }

    pub fn report_stopped(&self) {
        self.report(ProcessState::stopped());
    }

    pub fn current(&self) -> ProcessState {
        self.lock().current
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualLivenessSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessSource for ManualLivenessSource {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ProcessState> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Cannot fail: `rx` is still held here.
        let _ = tx.send(inner.current);
        inner.subscribers.push(tx);
        rx
    }
}
