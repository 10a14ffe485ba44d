//! # Concurrent Queue
//!
//! Unbounded, internally synchronized FIFO shared between pipeline stages.
//!
//! ## Wake-up hints
//!
//! Every successful `enqueue` and `try_dequeue` notifies the watchers
//! registered for that event. A watcher is a [`tokio::sync::Notify`]; a
//! notification stores at most one permit, so bursts of events coalesce into
//! a single wake-up. The notification carries no payload: whoever wakes up
//! must re-check the real state (queue length, backlog) before acting.
//!
//! ```text
//!   producer ──enqueue──> [ unbounded channel ] ──try_dequeue──> consumer
//!                  │                                     │
//!                  └── notify Enqueued watchers          └── notify Dequeued watchers
//! ```

use std::sync::{Arc, Weak};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Queue mutation a watcher can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueEvent {
    /// An item was appended.
    Enqueued,
    /// An item was removed from the head.
    Dequeued,
}

/// Registered wake-up targets for one event.
#[derive(Default)]
struct Watchers {
    list: Mutex<Vec<Weak<Notify>>>,
}

impl Watchers {
    fn add(&self, notify: &Arc<Notify>) {
        self.list.lock().push(Arc::downgrade(notify));
    }

    fn remove(&self, notify: &Arc<Notify>) {
        let target = Arc::downgrade(notify);
        self.list.lock().retain(|w| !w.ptr_eq(&target) && w.strong_count() > 0);
    }

    /// Notifies live watchers and forgets dropped ones.
    fn fire(&self) {
        self.list.lock().retain(|watcher| match watcher.upgrade() {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        });
    }

    fn len(&self) -> usize {
        self.list.lock().len()
    }
}

/// Thread-safe FIFO with enqueue/dequeue wake-up hints.
///
/// `count` is advisory: by the time a caller acts on it another consumer may
/// already have taken the item, so a `None` from [`try_dequeue`] means
/// "someone else took it", never an error.
///
/// [`try_dequeue`]: ConcurrentQueue::try_dequeue
pub struct ConcurrentQueue<T> {
    /// Queue name, used in logs.
    name: String,
    /// Producer side. Never disconnected: the queue owns both ends.
    sender: Sender<T>,
    /// Consumer side, head first.
    receiver: Receiver<T>,
    on_enqueue: Watchers,
    on_dequeue: Watchers,
}

impl<T> ConcurrentQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self {
            name: name.into(),
            sender,
            receiver,
            on_enqueue: Watchers::default(),
            on_dequeue: Watchers::default(),
        }
    }

    /// Returns the queue name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an item and wakes the enqueue watchers.
    pub fn enqueue(&self, item: T) {
        if self.sender.send(item).is_err() {
            // Unreachable while `self` holds the receiver.
            return;
        }
        self.on_enqueue.fire();
    }

    /// Removes the head item if there is one and wakes the dequeue watchers.
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.receiver.try_recv().ok()?;
        self.on_dequeue.fire();
        Some(item)
    }

    /// Number of items currently held. May be stale by the time it is used.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true when the queue currently holds nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Registers `notify` to be woken after every `event`.
    ///
    /// The queue only keeps a weak reference; dropping the `Notify` is enough
    /// to unsubscribe.
    pub fn watch(&self, event: QueueEvent, notify: &Arc<Notify>) {
        match event {
            QueueEvent::Enqueued => self.on_enqueue.add(notify),
            QueueEvent::Dequeued => self.on_dequeue.add(notify),
        }
    }

    /// Removes a watcher registered with [`watch`](Self::watch).
    pub fn unwatch(&self, event: QueueEvent, notify: &Arc<Notify>) {
        match event {
            QueueEvent::Enqueued => self.on_enqueue.remove(notify),
            QueueEvent::Dequeued => self.on_dequeue.remove(notify),
        }
    }

    /// Number of registered watchers for `event`, dropped ones included until
    /// the next notification prunes them.
    #[must_use]
    pub fn watcher_count(&self, event: QueueEvent) -> usize {
        match event {
            QueueEvent::Enqueued => self.on_enqueue.len(),
            QueueEvent::Dequeued => self.on_dequeue.len(),
        }
    }
}

impl<T> std::fmt::Debug for ConcurrentQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentQueue")
            .field("name", &self.name)
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
