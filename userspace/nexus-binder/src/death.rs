// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Death notification registry: one-shot subscriber lists keyed by
//! the holding side's reference.
//!
//! Subscribers observe a remote object's demise without owning it. Delivery
//! is exactly-once per `(reference, subscriber)` pair; repeated death
//! signals and unlink-after-delivery are no-ops, not errors.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Handle;

/// Identity of one death subscription, used to unlink it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

/// Callback notified when the owning process of a watched object
/// terminates or its handle becomes invalid.
pub trait DeathRecipient: Send + Sync {
    /// Called exactly once per linked subscription.
    fn object_died(&self, handle: Handle);
}

impl<F> DeathRecipient for F
where
    F: Fn(Handle) + Send + Sync,
{
    fn object_died(&self, handle: Handle) {
        self(handle)
    }
}

struct Subscription {
    id: SubscriptionId,
    recipient: Arc<dyn DeathRecipient>,
}

/// Per-process table of death subscriptions.
#[derive(Default)]
pub struct DeathRegistry {
    subscriptions: Mutex<HashMap<Handle, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl DeathRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Links `recipient` to the death of the object behind `handle`.
    pub fn link(&self, handle: Handle, recipient: Arc<dyn DeathRecipient>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions
            .lock()
            .entry(handle)
            .or_default()
            .push(Subscription { id, recipient });
        id
    }

    /// Removes a subscription before it fires.
    ///
    /// Returns `false` when the subscription was already delivered or
    /// unlinked.
    pub fn unlink(&self, handle: Handle, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let Some(list) = subscriptions.get_mut(&handle) else {
            return false;
        };
        let before = list.len();
        list.retain(|sub| sub.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            subscriptions.remove(&handle);
        }
        removed
    }

    /// Fires and removes every subscription linked to `handle`.
    ///
    /// Recipients run outside the registry lock so they may link or unlink
    /// other subscriptions. Idempotent: a second signal finds no
    /// subscriptions and does nothing.
    pub fn notify_object_dead(&self, handle: Handle) {
        let fired = match self.subscriptions.lock().remove(&handle) {
            Some(list) => list,
            None => return,
        };
        for sub in fired {
            sub.recipient.object_died(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counting_recipient() -> (Arc<dyn DeathRecipient>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let probe = Arc::clone(&count);
        let recipient: Arc<dyn DeathRecipient> =
            Arc::new(move |_handle: Handle| {
                probe.fetch_add(1, Ordering::SeqCst);
            });
        (recipient, count)
    }

    #[test]
    fn delivery_is_exactly_once_per_subscription() {
        let registry = DeathRegistry::new();
        let handle = Handle::new(1);
        let (recipient, count) = counting_recipient();
        registry.link(handle, Arc::clone(&recipient));
        registry.link(handle, recipient);

        registry.notify_object_dead(handle);
        registry.notify_object_dead(handle);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unlink_before_delivery_suppresses_it() {
        let registry = DeathRegistry::new();
        let handle = Handle::new(1);
        let (recipient, count) = counting_recipient();
        let id = registry.link(handle, recipient);

        assert!(registry.unlink(handle, id));
        registry.notify_object_dead(handle);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unlink_after_delivery_returns_false() {
        let registry = DeathRegistry::new();
        let handle = Handle::new(1);
        let (recipient, _count) = counting_recipient();
        let id = registry.link(handle, recipient);

        registry.notify_object_dead(handle);
        assert!(!registry.unlink(handle, id));
        assert!(!registry.unlink(handle, id));
    }

    #[test]
    fn subscriptions_on_other_handles_are_untouched() {
        let registry = DeathRegistry::new();
        let (recipient, count) = counting_recipient();
        registry.link(Handle::new(1), Arc::clone(&recipient));
        registry.link(Handle::new(2), recipient);

        registry.notify_object_dead(Handle::new(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        registry.notify_object_dead(Handle::new(2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
