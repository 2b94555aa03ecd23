use std::sync::Arc;

pub(crate) mod notifier;

pub(crate) type EvictionListener<K, V> = Arc<dyn Fn(K, V, RemovalCause) + Send + Sync + 'static>;

/// Indicates the reason why an entry was removed from an
/// [`ExpiringMap`](./struct.ExpiringMap.html).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalCause {
    /// The entry's time-to-live has elapsed.
    Expired,
    /// The lifetime scope given when the entry was inserted (or one of its
    /// ancestors) has been cancelled.
    Cancelled,
    /// The entry was manually removed by the user, with `remove` or `clear`.
    Explicit,
    /// The entry was replaced by a `put` for the same key.
    Replaced,
}

impl RemovalCause {
    /// Returns `true` if the entry was removed by its lifetime watcher rather
    /// than by a user operation.
    pub fn was_evicted(&self) -> bool {
        matches!(self, Self::Expired | Self::Cancelled)
    }
}
