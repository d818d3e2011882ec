//! Typed observers for status transitions and inbound messages.
//!
//! Every registration returns a [`Subscription`].  Dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the observer, so a consumer that
//! goes away can never be called afterwards.
//!
//! Observers are invoked from the client's actor task.  The observer list is
//! snapshotted before invocation, so an observer may subscribe or unsubscribe
//! from inside its own callback without deadlocking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use unity_messaging_core::{Message, MessageType};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Callback invoked for an inbound message of a registered type.
pub type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // An observer that panicked must not take the whole client down with it.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Subscription ──────────────────────────────────────────────────────────────

/// Handle that keeps an observer registered.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Removes the observer now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keeps the observer registered for the lifetime of its subject.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// ── Subject ───────────────────────────────────────────────────────────────────

struct Observers<T> {
    next_id: u64,
    entries: Vec<(u64, Observer<T>)>,
}

/// A typed event with any number of observers.
pub struct Subject<T> {
    inner: Arc<Mutex<Observers<T>>>,
}

impl<T: 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Observers {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `observer` until the returned [`Subscription`] is dropped.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut observers = lock(&self.inner);
            let id = observers.next_id;
            observers.next_id += 1;
            observers.entries.push((id, Arc::new(observer)));
            id
        };

        let weak: Weak<Mutex<Observers<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Calls every current observer with `value`, in registration order.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = lock(&self.inner)
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }

    /// Drops every observer.  Outstanding subscriptions become no-ops.
    pub fn clear(&self) {
        lock(&self.inner).entries.clear();
    }

    #[cfg(test)]
    pub fn observer_count(&self) -> usize {
        lock(&self.inner).entries.len()
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// ── HandlerRegistry ───────────────────────────────────────────────────────────

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_type: HashMap<MessageType, (u64, MessageHandler)>,
}

/// One handler per message type; the most recent registration wins.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    inner: Arc<Mutex<Handlers>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `message_type`, replacing any previous one.
    ///
    /// Dropping the returned subscription removes the handler only if it has
    /// not been replaced in the meantime.
    pub fn register<F>(&self, message_type: MessageType, handler: F) -> Subscription
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        let id = {
            let mut handlers = lock(&self.inner);
            let id = handlers.next_id;
            handlers.next_id += 1;
            handlers
                .by_type
                .insert(message_type, (id, Arc::new(handler)));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                let mut handlers = lock(&inner);
                if matches!(handlers.by_type.get(&message_type), Some((current, _)) if *current == id)
                {
                    handlers.by_type.remove(&message_type);
                }
            }
        })
    }

    /// Returns the handler currently registered for `message_type`.
    pub fn get(&self, message_type: MessageType) -> Option<MessageHandler> {
        lock(&self.inner)
            .by_type
            .get(&message_type)
            .map(|(_, handler)| Arc::clone(handler))
    }

    pub fn clear(&self) {
        lock(&self.inner).by_type.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
