use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;

use crate::formats::{FlatToc, TocTree};

type Listener<T> = Box<dyn Fn(&Arc<T>) + Send + Sync>;

struct Shared<T> {
    slot: watch::Sender<Option<Arc<T>>>,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
}

impl<T> Shared<T> {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A latest-value channel: one slot plus listeners notified synchronously on
/// every publish.
///
/// Listeners run while the listener list is locked, so they must not
/// subscribe to or publish on the same channel.
pub struct LatestChannel<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LatestChannel<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + Sync + 'static> Default for LatestChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> LatestChannel<T> {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                slot,
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn latest(&self) -> Option<Arc<T>> {
        self.shared.slot.borrow().clone()
    }

    pub fn publish(&self, value: Arc<T>) {
        // The slot is replaced under the listener lock so a concurrent
        // subscriber sees the new value either on subscribe or from this
        // publish, never both.
        let listeners = self.shared.listeners();
        self.shared.slot.send_replace(Some(Arc::clone(&value)));
        for (_, listener) in listeners.iter() {
            listener(&value);
        }
    }

    /// Registers `listener`, calling it right away with the latest value if
    /// anything has been published yet.
    pub fn subscribe(&self, listener: impl Fn(&Arc<T>) + Send + Sync + 'static) -> Subscription {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut listeners = self.shared.listeners();
        if let Some(latest) = self.latest() {
            listener(&latest);
        }
        listeners.push((id, Box::new(listener)));
        drop(listeners);

        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.listeners().retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Receiver for async consumers; it starts out holding the latest value.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<T>>> {
        self.shared.slot.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners().len()
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for LatestChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestChannel")
            .field("listeners", &self.listener_count())
            .field("has_value", &self.shared.slot.borrow().is_some())
            .finish()
    }
}

/// Removes its listener when dropped.
#[must_use = "dropping a subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// The two TOC channels: the current tree and its flattened form.
#[derive(Debug, Clone, Default)]
pub struct TocBroadcaster {
    pub tree: LatestChannel<TocTree>,
    pub flattened: LatestChannel<FlatToc>,
}

impl TocBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, tree: Arc<TocTree>, flattened: Arc<FlatToc>) {
        tracing::debug!(
            collection_id = %tree.collection_id,
            order = %tree.order,
            entries = flattened.children.len(),
            "broadcast toc"
        );
        self.tree.publish(tree);
        self.flattened.publish(flattened);
    }
}
