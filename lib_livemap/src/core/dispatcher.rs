//! # Zero-Copy Message Dispatcher
//!
//! The `Dispatcher` is the fan-out primitive shared by the location feed and the
//! line selection bus. It takes one item from a producer and hands it to every
//! currently registered subscriber.
//!
//! ## Core Design Principles:
//!
//! 1.  **Zero-Copy Fan-out**: An item is wrapped in an `Arc` once. Each
//!     subscriber receives a new `Arc` pointer to the *same* allocation.
//!
//! 2.  **Hot Delivery**: Only subscribers registered at the time of a broadcast
//!     receive it. Nothing is buffered for late subscribers and a broadcast with
//!     no subscribers is dropped.
//!
//! 3.  **No Backpressure**: Every subscriber owns an unbounded queue, so a
//!     broadcast never waits and never skips an item. Each subscriber sees items
//!     in broadcast order, exactly once.
//!
//! 4.  **Self-Cleaning**: A subscriber whose receiver was dropped is removed on
//!     the next broadcast.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;

/// # Subscriber Handle
///
/// Internal record of one registered subscriber.
struct SubscriberHandle<T> {
    /// Unique id, used in log lines.
    id: u64,
    /// Human readable label of the owner (e.g. `"vehicle-tracker"`).
    label: String,
    /// The sending half of the subscriber's unbounded queue.
    sender: mpsc::UnboundedSender<Arc<T>>,
}

/// # Dispatcher
///
/// Manages registration and broadcasting to all subscribers.
pub struct Dispatcher<T> {
    subscribers: Mutex<Vec<SubscriberHandle<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Dispatcher<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SubscriberHandle<T>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// # Subscribe
    ///
    /// Registers a new subscriber and returns its receiving half. The subscriber
    /// sees every item broadcast from now on, and nothing broadcast before.
    pub fn subscribe(&self, label: &str) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.lock().push(SubscriberHandle {
            id,
            label: label.to_string(),
            sender: tx,
        });
        log::debug!("Subscriber '{}' (#{}) registered", label, id);

        Subscription { receiver: rx }
    }

    /// # Broadcast
    ///
    /// Wraps `item` in an `Arc` and sends a clone of the pointer to every
    /// subscriber. Subscribers whose receiver is gone are removed via `retain`.
    ///
    /// # Returns
    /// The number of subscribers the item was delivered to. Zero means the item
    /// was dropped.
    pub fn broadcast(&self, item: T) -> usize {
        let item = Arc::new(item);
        let mut subscribers = self.lock();

        subscribers.retain(|subscriber| match subscriber.sender.send(Arc::clone(&item)) {
            Ok(()) => true,
            Err(_) => {
                log::debug!(
                    "Subscriber '{}' (#{}) went away. Removing from dispatcher.",
                    subscriber.label,
                    subscriber.id
                );
                false
            }
        });

        subscribers.len()
    }

    /// Drops every subscriber. All receivers see end of stream once drained.
    pub fn close(&self) {
        let removed = std::mem::take(&mut *self.lock());
        if !removed.is_empty() {
            log::debug!("Dispatcher closed, released {} subscriber(s)", removed.len());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

/// # Subscription
///
/// Receiving half handed out by [`Dispatcher::subscribe`]. Dropping it
/// unsubscribes. Also usable as a [`Stream`].
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::UnboundedReceiver<Arc<T>>,
}

impl<T> Subscription<T> {
    /// Waits for the next item. `None` once the dispatcher dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<T>> {
        self.receiver.recv().await
    }

    /// Returns an already queued item without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<T>> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Arc<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_without_subscribers_is_dropped() {
        let dispatcher = Dispatcher::<u32>::new();
        assert_eq!(dispatcher.broadcast(1), 0);

        // A subscriber registered afterwards never sees the dropped item.
        let mut late = dispatcher.subscribe("late");
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_every_subscriber_sees_items_in_order() {
        let dispatcher = Dispatcher::<u32>::new();
        let mut first = dispatcher.subscribe("first");
        let mut second = dispatcher.subscribe("second");

        for n in 1..=3 {
            assert_eq!(dispatcher.broadcast(n), 2);
        }

        for subscription in [&mut first, &mut second] {
            let seen: Vec<u32> = std::iter::from_fn(|| subscription.try_recv())
                .map(|item| *item)
                .collect();
            assert_eq!(seen, vec![1, 2, 3]);
        }
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let dispatcher = Dispatcher::<u32>::new();
        let _kept = dispatcher.subscribe("kept");
        let dropped = dispatcher.subscribe("dropped");
        assert_eq!(dispatcher.subscriber_count(), 2);

        drop(dropped);
        assert_eq!(dispatcher.broadcast(7), 1);
        assert_eq!(dispatcher.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_close_ends_every_subscription() {
        let dispatcher = Dispatcher::<u32>::new();
        let mut subscription = dispatcher.subscribe("one");
        dispatcher.broadcast(5);
        dispatcher.close();

        assert_eq!(subscription.recv().await.as_deref(), Some(&5));
        assert!(subscription.recv().await.is_none());
    }
}
