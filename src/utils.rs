use std::{
    collections::BTreeMap,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{channel::mpsc::UnboundedReceiver, Stream};

use crate::Subscription;

/// Ordered observer registry.
///
/// Keys are handed out from a monotonic counter, so iteration follows
/// registration order even after removals. A slab would reuse freed keys
/// and break that ordering.
pub(crate) struct Slots<T> {
    entries: BTreeMap<u64, T>,
    next_key: u64,
}

impl<T> Slots<T> {
    pub fn new() -> Self {
        Slots {
            entries: BTreeMap::new(),
            next_key: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.entries.insert(key, value);
        key
    }

    pub fn remove(&mut self, key: u64) -> Option<T> {
        self.entries.remove(&key)
    }

    /// The current entries in registration order, detached from the
    /// registry so callers can iterate while observers register or remove
    /// themselves.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.entries.values().cloned().collect()
    }
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Slots::new()
    }
}

/// A stream fed by an observer registration; dropping the stream drops the
/// subscription.
pub(crate) struct SubscriberStream<T> {
    receiver: UnboundedReceiver<T>,
    _subscription: Subscription,
}

impl<T> SubscriberStream<T> {
    pub fn new(receiver: UnboundedReceiver<T>, subscription: Subscription) -> Self {
        SubscriberStream {
            receiver,
            _subscription: subscription,
        }
    }
}

impl<T> Stream for SubscriberStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}
