//! Subscriber callbacks invoked after each published reload.

use crate::core::Snapshot;
use parking_lot::RwLock;
use std::sync::Arc;

type Callback = Arc<dyn Fn(&Snapshot) + Send + Sync>;

/// Handle for a subscription that can be dropped to unsubscribe.
///
/// When the handle is dropped, the subscription is removed immediately.
pub struct SubscriptionHandle {
    id: usize,
    registry: Arc<RwLock<SubscriberRegistryInner>>,
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let id = self.id;
        self.registry
            .write()
            .subscribers
            .retain(|(sub_id, _)| *sub_id != id);
    }
}

/// Internal subscriber registry state.
#[derive(Default)]
struct SubscriberRegistryInner {
    subscribers: Vec<(usize, Callback)>,
    next_id: usize,
}

/// Registry of callbacks interested in newly published snapshots.
///
/// Callbacks run synchronously on whichever thread published the snapshot:
/// the reload chain's blocking worker or the caller of a manual reload. Keep
/// them short. The registry lock is released before any callback runs, so a
/// callback may subscribe, unsubscribe, or trigger another reload.
///
/// # Examples
///
/// ```rust
/// use reloadable_sql_config::core::Snapshot;
/// use reloadable_sql_config::notify::SubscriberRegistry;
///
/// let registry = SubscriberRegistry::new();
/// let handle = registry.subscribe(|snapshot| {
///     println!("{} settings loaded", snapshot.len());
/// });
///
/// registry.notify_all(&Snapshot::default());
///
/// // Unsubscribe by dropping the handle
/// drop(handle);
/// assert_eq!(registry.subscriber_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    inner: Arc<RwLock<SubscriberRegistryInner>>,
}

impl SubscriberRegistry {
    /// Create a new subscriber registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Returns a handle that can be dropped to unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionHandle
    where
        F: Fn(&Snapshot) + Send + Sync + 'static,
    {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, Arc::new(callback)));

        SubscriptionHandle {
            id,
            registry: Arc::clone(&self.inner),
        }
    }

    /// Call every subscriber, in subscription order, with `snapshot`.
    ///
    /// Subscribers registered while this runs are first called on the next
    /// publish.
    pub fn notify_all(&self, snapshot: &Snapshot) {
        let callbacks: Vec<Callback> = self
            .inner
            .read()
            .subscribers
            .iter()
            .map(|(_id, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(snapshot);
        }
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.read().subscribers.len()
    }
}
