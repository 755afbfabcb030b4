//! Taxonomy change notifications

use crate::taxonomy::TaxonomyTree;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Listener = Arc<dyn Fn(&TaxonomyTree) + Send + Sync>;

struct BusInner {
    // BTreeMap keyed by subscription id keeps delivery in subscription order
    listeners: RwLock<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
}

/// Process-wide, synchronous, fire-and-forget publish/subscribe channel
/// for taxonomy changes.
///
/// Publish delivers to every currently-registered listener, in
/// subscription order, on the caller's thread; there is no queueing and no
/// retroactive delivery. Listeners must stay non-blocking and hand heavy
/// work to the runtime.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl Default for BusInner {
    fn default() -> Self {
        Self {
            listeners: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for every subsequent publish. Dropping the
    /// returned [`Subscription`] unregisters it, so a disposed consumer is
    /// never notified.
    pub fn subscribe(
        &self,
        listener: impl Fn(&TaxonomyTree) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().insert(id, Arc::new(listener));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `tree` to all current subscribers.
    pub fn publish(&self, tree: &TaxonomyTree) {
        // Snapshot outside the lock so a listener may subscribe/unsubscribe
        let listeners: Vec<Listener> = self.inner.listeners.read().values().cloned().collect();
        for listener in listeners {
            listener(tree);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

/// Handle tying a listener's lifetime to its consumer.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.write().remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn tree_with(name: &str) -> TaxonomyTree {
        let mut tree = TaxonomyTree::default();
        tree.add_type(name).unwrap();
        tree
    }

    #[test]
    fn test_publish_reaches_subscriber_once() {
        let bus = ChangeBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let _sub = bus.subscribe(move |tree| {
            seen_clone.lock().push(tree.clone());
        });

        let tree = tree_with("Service");
        bus.publish(&tree);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains_type("Service"));
    }

    #[test]
    fn test_dropped_subscription_receives_nothing() {
        let bus = ChangeBus::new();
        let count = Arc::new(Mutex::new(0u32));

        let count_clone = count.clone();
        let sub = bus.subscribe(move |_| *count_clone.lock() += 1);
        assert_eq!(bus.listener_count(), 1);

        drop(sub);
        assert_eq!(bus.listener_count(), 0);

        bus.publish(&tree_with("Service"));
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_delivery_in_subscription_order() {
        let bus = ChangeBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = order.clone();
        let _a = bus.subscribe(move |_| order_a.lock().push("a"));
        let order_b = order.clone();
        let _b = bus.subscribe(move |_| order_b.lock().push("b"));

        bus.publish(&TaxonomyTree::default());
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_late_subscriber_misses_earlier_publish() {
        let bus = ChangeBus::new();
        bus.publish(&tree_with("Service"));

        let count = Arc::new(Mutex::new(0u32));
        let count_clone = count.clone();
        let _sub = bus.subscribe(move |_| *count_clone.lock() += 1);

        assert_eq!(*count.lock(), 0);
    }
}
