//! # Shutdown Broadcast
//!
//! One-shot signal delivered synchronously to every subscribed listener.
//!
//! Workers subscribe once when they are built and unsubscribe when their
//! [`ShutdownSubscription`] is dropped. Firing twice is a no-op; subscribing
//! after the broadcast fired delivers the signal immediately.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Receiver of the shutdown broadcast.
pub trait ShutdownListener: Send + Sync {
    /// Called exactly once, on the thread that fired the broadcast.
    fn on_shutdown(&self);
}

struct Inner {
    fired: AtomicBool,
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Weak<dyn ShutdownListener>)>>,
}

/// Cheaply clonable handle to a shared shutdown broadcast.
#[derive(Clone)]
pub struct ShutdownBroadcast {
    inner: Arc<Inner>,
}

impl ShutdownBroadcast {
    /// Creates a broadcast that has not fired yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                fired: AtomicBool::new(false),
                next_id: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Subscribes `listener` until the returned subscription is dropped.
    ///
    /// Only a weak reference is kept, so the broadcast never extends the
    /// listener's lifetime.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, listener: Arc<dyn ShutdownListener>) -> ShutdownSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let already_fired = {
            let mut listeners = self.inner.listeners.lock();
            listeners.push((id, Arc::downgrade(&listener)));
            self.inner.fired.load(Ordering::Acquire)
        };
        if already_fired {
            listener.on_shutdown();
        }
        ShutdownSubscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Fires the broadcast. Returns false if it had already fired.
    pub fn fire(&self) -> bool {
        let listeners: Vec<Arc<dyn ShutdownListener>> = {
            let listeners = self.inner.listeners.lock();
            if self.inner.fired.swap(true, Ordering::AcqRel) {
                return false;
            }
            listeners.iter().filter_map(|(_, l)| l.upgrade()).collect()
        };
        tracing::debug!(listeners = listeners.len(), "shutdown broadcast fired");
        for listener in listeners {
            listener.on_shutdown();
        }
        true
    }

    /// Returns true once the broadcast has fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.inner.fired.load(Ordering::Acquire)
    }

    /// Number of current subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }
}

impl Default for ShutdownBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShutdownBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownBroadcast")
            .field("fired", &self.is_fired())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Keeps a listener subscribed; unsubscribes on drop.
#[derive(Debug)]
pub struct ShutdownSubscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for ShutdownSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ShutdownListener for Counter {
        fn on_shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fire_reaches_every_listener_once() {
        let broadcast = ShutdownBroadcast::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let _sa = broadcast.subscribe(a.clone());
        let _sb = broadcast.subscribe(b.clone());

        assert!(broadcast.fire());
        assert!(!broadcast.fire());

        assert_eq!(a.0.load(Ordering::SeqCst), 1);
        assert_eq!(b.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropped_subscription_is_not_notified() {
        let broadcast = ShutdownBroadcast::new();
        let listener = Arc::new(Counter::default());
        let subscription = broadcast.subscribe(listener.clone());
        assert_eq!(broadcast.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(broadcast.subscriber_count(), 0);

        broadcast.fire();
        assert_eq!(listener.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_late_subscriber_is_notified_immediately() {
        let broadcast = ShutdownBroadcast::new();
        broadcast.fire();

        let listener = Arc::new(Counter::default());
        let _subscription = broadcast.subscribe(listener.clone());
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let broadcast = ShutdownBroadcast::new();
        let clone = broadcast.clone();
        clone.fire();
        assert!(broadcast.is_fired());
    }
}
