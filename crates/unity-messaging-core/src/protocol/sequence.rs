//! Monotonic request-id source for correlated state queries.
//!
//! A request id only has to be unique among the requests currently waiting
//! for a reply from one editor process, so a process-local counter is enough.
//! Ids start at 1 so that `0` never appears on the wire as a valid id.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter for request ids.
///
/// # Examples
///
/// ```rust
/// use unity_messaging_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU64,
}

impl SequenceCounter {
    /// Creates a new counter whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(1),
        }
    }

    /// Returns the next id.
    ///
    /// `Relaxed` is sufficient: the id orders nothing but itself.
    pub fn next(&self) -> u64 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the id the next call to [`next`](Self::next) will hand out.
    #[cfg(test)]
    pub fn peek(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
