//! Cooperative cancellation signal.
//!
//! Cancellation is checked at node-lifecycle boundaries: before validation
//! starts and between a retry's backoff and its next attempt. An executor
//! invocation already in flight is never interrupted; its result is
//! discarded when the signal was raised before it returned.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
}

/// A cloneable cancellation signal shared by an execution and its node
/// runners.
///
/// Raising is idempotent; the first reason wins.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    /// Creates an unraised signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal with a reason. Only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .inner
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.inner.reason.write() = Some(reason.into());
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if raised.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_not_cancelled() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.reason().is_none());
    }

    #[test]
    fn test_first_reason_wins() {
        let signal = CancelSignal::new();
        signal.cancel("operator request");
        signal.cancel("second request");

        assert!(signal.is_cancelled());
        assert_eq!(signal.reason(), Some("operator request".to_string()));
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancelSignal::new();
        let clone = signal.clone();
        clone.cancel("shared");
        assert!(signal.is_cancelled());
    }
}
