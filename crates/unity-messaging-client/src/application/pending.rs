//! Correlation table for `request_state` round trips.
//!
//! Each entry is settled exactly once: by a matching reply, by its deadline
//! passing, or by disposal.  Settling removes the entry, so a late reply for an
//! expired id finds nothing and is ignored.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::application::error::MessagingError;

/// Completion channel for one `request_state`.
pub type StateReply = oneshot::Sender<Result<Option<String>, MessagingError>>;

#[derive(Debug)]
struct PendingRequest {
    deadline: Instant,
    reply: StateReply,
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    entries: HashMap<u64, PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, request_id: u64, deadline: Instant, reply: StateReply) {
        self.entries
            .insert(request_id, PendingRequest { deadline, reply });
    }

    /// Resolves `request_id` with `state`.  Returns `false` for unknown ids.
    pub fn resolve(&mut self, request_id: u64, state: &str) -> bool {
        match self.entries.remove(&request_id) {
            Some(pending) => {
                let _ = pending.reply.send(Ok(Some(state.to_owned())));
                true
            }
            None => false,
        }
    }

    /// Whether `request_id` is still waiting for a reply.
    pub fn contains(&self, request_id: u64) -> bool {
        self.entries.contains_key(&request_id)
    }

    /// Resolves every request whose deadline is at or before `now` with
    /// `None`.  Returns how many expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<u64> = self
            .entries
            .iter()
            .filter(|(_, pending)| pending.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(pending) = self.entries.remove(id) {
                let _ = pending.reply.send(Ok(None));
            }
        }
        expired.len()
    }

    /// Earliest deadline among outstanding requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|pending| pending.deadline).min()
    }

    /// Rejects every outstanding request with an error built by `error`.
    pub fn reject_all(&mut self, error: impl Fn() -> MessagingError) {
        for (_, pending) in self.entries.drain() {
            let _ = pending.reply.send(Err(error()));
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits an `IsPlaying` reply value `"<requestId>:<state>"`.
pub fn parse_state_reply(value: &str) -> Option<(u64, &str)> {
    let (id, state) = value.split_once(':')?;
    let id = id.trim().parse().ok()?;
    Some((id, state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_state_reply_splits_id_and_state() {
        assert_eq!(parse_state_reply("7:true"), Some((7, "true")));
        assert_eq!(parse_state_reply("12:a:b"), Some((12, "a:b")));
        assert_eq!(parse_state_reply("3:"), Some((3, "")));
    }

    #[test]
    fn test_parse_state_reply_rejects_malformed_values() {
        assert_eq!(parse_state_reply("true"), None);
        assert_eq!(parse_state_reply("x:true"), None);
        assert_eq!(parse_state_reply(""), None);
    }

    #[tokio::test]
    async fn test_resolve_settles_matching_request_once() {
        // Arrange
        let mut pending = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        pending.insert(1, Instant::now() + Duration::from_secs(1), tx);

        // Act
        let first = pending.resolve(1, "playing");
        let second = pending.resolve(1, "stopped");

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(rx.await.unwrap().unwrap(), Some("playing".to_owned()));
    }

    #[tokio::test]
    async fn test_expire_resolves_only_due_requests_with_none() {
        let mut pending = PendingRequests::new();
        let t0 = Instant::now();
        let (due_tx, due_rx) = oneshot::channel();
        let (later_tx, _later_rx) = oneshot::channel();
        pending.insert(1, t0 + Duration::from_millis(50), due_tx);
        pending.insert(2, t0 + Duration::from_millis(500), later_tx);

        let expired = pending.expire(t0 + Duration::from_millis(50));

        assert_eq!(expired, 1);
        assert!(!pending.contains(1));
        assert!(pending.contains(2));
        assert_eq!(due_rx.await.unwrap().unwrap(), None);
        assert_eq!(pending.next_deadline(), Some(t0 + Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_reject_all_empties_table() {
        let mut pending = PendingRequests::new();
        let (tx, rx) = oneshot::channel();
        pending.insert(9, Instant::now(), tx);

        pending.reject_all(|| MessagingError::Disposed);

        assert!(pending.is_empty());
        assert!(matches!(rx.await.unwrap(), Err(MessagingError::Disposed)));
    }
}
