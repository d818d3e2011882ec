//! Per-message-type send throttle.
//!
//! Commands such as an asset refresh or a test run are expensive for the
//! editor.  A burst of them is discarded rather than deferred: a deferred
//! refresh would only arrive after the state it was meant to refresh has
//! already moved on.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use unity_messaging_core::MessageType;

/// Throttle state for one message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub min_interval: Duration,
    pub last_send: Option<Instant>,
}

impl RateLimitEntry {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_send: None,
        }
    }

    /// Time left before another send is allowed, if any.
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_send?;
        let ready_at = last + self.min_interval;
        (now < ready_at).then(|| ready_at - now)
    }
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: HashMap<MessageType, RateLimitEntry>,
}

impl RateLimiter {
    pub fn new<I>(policies: I) -> Self
    where
        I: IntoIterator<Item = (MessageType, Duration)>,
    {
        let entries = policies
            .into_iter()
            .map(|(message_type, interval)| (message_type, RateLimitEntry::new(interval)))
            .collect();
        Self { entries }
    }

    /// Claims a send slot for `message_type` at `now`.
    ///
    /// On success the send timestamp is recorded, whatever happens to the
    /// message afterwards.  A discarded attempt leaves the timestamp alone and
    /// returns how long the caller would have had to wait.
    pub fn try_acquire(&mut self, message_type: MessageType, now: Instant) -> Result<(), Duration> {
        let Some(entry) = self.entries.get_mut(&message_type) else {
            return Ok(());
        };
        if let Some(retry_after) = entry.remaining(now) {
            return Err(retry_after);
        }
        entry.last_send = Some(now);
        Ok(())
    }

    /// `true` when a policy exists for `message_type`.
    #[cfg(test)]
    pub fn is_limited(&self, message_type: MessageType) -> bool {
        self.entries.contains_key(&message_type)
    }

    #[cfg(test)]
    pub fn entry(&self, message_type: MessageType) -> Option<&RateLimitEntry> {
        self.entries.get(&message_type)
    }
}
