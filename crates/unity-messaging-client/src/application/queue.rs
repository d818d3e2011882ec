//! FIFO buffer of sends deferred while the editor is not online.

use std::collections::VecDeque;

use tokio::sync::oneshot;
use unity_messaging_core::Message;

use crate::application::error::MessagingError;

/// Completion channel for one `send`.
pub type SendReply = oneshot::Sender<Result<(), MessagingError>>;

/// Settles `reply` if the caller is still waiting.
pub fn complete(reply: Option<SendReply>, outcome: Result<(), MessagingError>) {
    if let Some(reply) = reply {
        // The caller may have stopped waiting; that is not an error here.
        let _ = reply.send(outcome);
    }
}

/// A non-heartbeat message waiting for the peer to come online.
#[derive(Debug)]
pub struct QueuedMessage {
    pub message: Message,
    pub reply: Option<SendReply>,
    /// Set for state probes; the probe is worthless once this request settles.
    pub request_id: Option<u64>,
}

#[derive(Debug, Default)]
pub struct MessageQueue {
    items: VecDeque<QueuedMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: QueuedMessage) {
        self.items.push_back(item);
    }

    /// Empties the queue, returning its items oldest first.
    pub fn take_all(&mut self) -> VecDeque<QueuedMessage> {
        std::mem::take(&mut self.items)
    }

    /// Removes and returns the items matching `remove`; the rest keep their order.
    pub fn take_where(&mut self, remove: impl Fn(&QueuedMessage) -> bool) -> Vec<QueuedMessage> {
        let (removed, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.items).into_iter().partition(|item| remove(item));
        self.items = kept.into();
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unity_messaging_core::MessageType;

    fn queued(value: &str) -> QueuedMessage {
        QueuedMessage {
            message: Message::new(MessageType::Refresh, value),
            reply: None,
            request_id: None,
        }
    }

    fn probe(request_id: u64) -> QueuedMessage {
        QueuedMessage {
            message: Message::new(MessageType::IsPlaying, request_id.to_string()),
            reply: None,
            request_id: Some(request_id),
        }
    }

    #[test]
    fn test_take_all_preserves_fifo_order_and_empties_queue() {
        let mut queue = MessageQueue::new();
        queue.push(queued("a"));
        queue.push(queued("b"));
        queue.push(queued("c"));

        let values: Vec<String> = queue
            .take_all()
            .into_iter()
            .map(|item| item.message.value)
            .collect();

        assert_eq!(values, ["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_where_removes_matching_items_and_keeps_order() {
        // Arrange
        let mut queue = MessageQueue::new();
        queue.push(queued("a"));
        queue.push(probe(1));
        queue.push(queued("b"));
        queue.push(probe(2));

        // Act
        let removed = queue.take_where(|item| item.request_id == Some(1));

        // Assert
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].request_id, Some(1));
        let values: Vec<String> = queue
            .take_all()
            .into_iter()
            .map(|item| item.message.value)
            .collect();
        assert_eq!(values, ["a", "b", "2"]);
    }

    #[tokio::test]
    async fn test_complete_delivers_outcome_to_waiting_caller() {
        let (tx, rx) = oneshot::channel();

        complete(Some(tx), Err(MessagingError::Disposed));

        assert!(matches!(rx.await, Ok(Err(MessagingError::Disposed))));
    }

    #[test]
    fn test_complete_tolerates_dropped_receiver() {
        let (tx, rx) = oneshot::channel();
        drop(rx);

        complete(Some(tx), Ok(()));
        complete(None, Ok(()));
    }
}
