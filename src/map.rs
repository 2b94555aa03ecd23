use crate::{
    common::time,
    notification::{notifier::RemovalNotifier, EvictionListener, RemovalCause},
    Error, ExpiringMapBuilder, LifetimeScope,
};

use parking_lot::RwLock;
use std::{
    borrow::Borrow,
    collections::HashMap,
    fmt,
    hash::Hash,
    sync::Arc,
    time::Duration,
};
use tokio::runtime::Handle;

mod watcher;

use watcher::Watcher;

/// A concurrent map whose entries expire individually.
///
/// Every entry is given a time-to-live (TTL) when it is inserted: either the
/// default TTL of the map, or an explicit one passed to the `*_with_ttl`
/// methods. When the TTL elapses, the entry is removed by a lightweight
/// background task (a _lifetime watcher_) that is spawned for it on a Tokio
/// runtime. No periodic sweep is involved.
///
/// Each insert also takes a [`LifetimeScope`][scope-struct]. Cancelling that
/// scope removes the entries inserted under it right away, which is handy to
/// tie entries to the lifetime of a request or a connection.
///
/// Replacing an entry never lets the watcher of the old entry remove the new
/// one: watchers check the identity of the entry they were created for before
/// removing anything.
///
/// `ExpiringMap` is cheap to clone; clones share the same entries. When the last
/// clone is dropped, all pending watchers are cancelled.
///
/// # Examples
///
/// ```rust
/// use ttlmap::{ExpiringMap, LifetimeScope};
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ttlmap::Error> {
/// let map = ExpiringMap::new(Duration::from_secs(30))?;
/// let scope = LifetimeScope::new();
///
/// // Stays for 30 seconds (the default TTL).
/// map.put(&scope, "session-1".to_string(), 1);
///
/// // Stays for 5 seconds.
/// map.put_with_ttl(&scope, "session-2".to_string(), 2, Duration::from_secs(5))?;
///
/// // Inserts only if the key is absent.
/// assert!(!map.test_and_put(&scope, "session-1".to_string(), 10));
/// assert_eq!(map.get("session-1"), Some(1));
///
/// // Removes both entries.
/// scope.cancel();
/// # Ok(())
/// # }
/// ```
///
/// [scope-struct]: ./struct.LifetimeScope.html
pub struct ExpiringMap<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for ExpiringMap<K, V> {
    /// Makes a clone of this shared map.
    ///
    /// This operation is cheap as it only creates thread-safe reference counted
    /// pointers to the shared internal data structures.
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for ExpiringMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.inner.table.read();
        let mut d = f.debug_map();
        for (key, entry) in &table.entries {
            d.entry(key, &entry.value);
        }
        d.finish()
    }
}

impl<K, V> ExpiringMap<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Constructs a new, empty `ExpiringMap<K, V>` whose entries live for
    /// `default_ttl` unless a TTL is given at insertion.
    ///
    /// The lifetime watchers run on the Tokio runtime this method is called from.
    /// To adjust other configuration knobs, use the
    /// [`ExpiringMapBuilder`][builder-struct].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTtl`] if `default_ttl` is zero, and
    /// [`Error::NoRuntime`] if called outside of a Tokio runtime.
    ///
    /// [builder-struct]: ./struct.ExpiringMapBuilder.html
    pub fn new(default_ttl: Duration) -> Result<Self, Error> {
        ExpiringMapBuilder::new(default_ttl).build()
    }

    /// Returns a [`ExpiringMapBuilder`][builder-struct], which can build an
    /// `ExpiringMap` with various configuration knobs.
    ///
    /// [builder-struct]: ./struct.ExpiringMapBuilder.html
    pub fn builder(default_ttl: Duration) -> ExpiringMapBuilder<K, V> {
        ExpiringMapBuilder::new(default_ttl)
    }

    pub(crate) fn with_everything(
        name: Option<String>,
        default_ttl: Duration,
        initial_capacity: Option<usize>,
        max_jitter: Option<Duration>,
        runtime: Handle,
        eviction_listener: Option<EvictionListener<K, V>>,
    ) -> Self {
        let notifier = eviction_listener.map(|l| RemovalNotifier::new(l, name.clone()));
        let entries = HashMap::with_capacity(initial_capacity.unwrap_or_default());
        Self {
            inner: Arc::new(Inner {
                name,
                default_ttl,
                max_jitter,
                runtime,
                notifier,
                table: RwLock::new(Table {
                    entries,
                    next_id: 0,
                }),
            }),
        }
    }

    /// Returns the name of this map, if one was given to the builder.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Returns the TTL used by [`put`](#method.put) and
    /// [`test_and_put`](#method.test_and_put).
    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Returns a _clone_ of the value corresponding to the key.
    ///
    /// Reading an entry does not extend its lifetime.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.inner
            .table
            .read()
            .entries
            .get(key)
            .map(|entry| entry.value.clone())
    }

    /// Returns `true` if the map contains a value for the key.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.table.read().entries.contains_key(key)
    }

    /// Returns the number of entries in this map.
    ///
    /// The count may include entries whose lifetime watcher has woken up but has
    /// not yet removed them, so treat it as an approximation while entries are
    /// expiring.
    pub fn len(&self) -> usize {
        self.inner.table.read().entries.len()
    }

    /// Returns `true` if this map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a key-value pair with the default TTL, replacing any existing
    /// entry for the key.
    ///
    /// The entry is also removed when `scope` is cancelled.
    pub fn put(&self, scope: &LifetimeScope, key: K, value: V) {
        self.insert(scope, key, value, self.inner.default_ttl);
    }

    /// Inserts a key-value pair with the given TTL, replacing any existing entry
    /// for the key.
    ///
    /// The entry is also removed when `scope` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTtl`] if `ttl` is zero. The map is left unchanged.
    pub fn put_with_ttl(
        &self,
        scope: &LifetimeScope,
        key: K,
        value: V,
        ttl: Duration,
    ) -> Result<(), Error> {
        let ttl = time::ensure_positive(ttl)?;
        self.insert(scope, key, value, ttl);
        Ok(())
    }

    /// Inserts a key-value pair with the default TTL only if the key is absent.
    ///
    /// Returns `false` without touching the map if the key is present.
    pub fn test_and_put(&self, scope: &LifetimeScope, key: K, value: V) -> bool {
        self.insert_if_absent(scope, key, value, self.inner.default_ttl)
    }

    /// Inserts a key-value pair with the given TTL only if the key is absent.
    ///
    /// Returns `Ok(false)` without touching the map if the key is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTtl`] if `ttl` is zero. The map is left unchanged.
    pub fn test_and_put_with_ttl(
        &self,
        scope: &LifetimeScope,
        key: K,
        value: V,
        ttl: Duration,
    ) -> Result<bool, Error> {
        let ttl = time::ensure_positive(ttl)?;
        Ok(self.insert_if_absent(scope, key, value, ttl))
    }

    /// Removes an entry and returns its value, if the key is present.
    ///
    /// The entry's lifetime watcher is cancelled.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        let (key, entry) = {
            let mut table = self.inner.table.write();
            let (key, entry) = table.entries.remove_entry(key)?;
            entry.scope.cancel();
            (key, entry)
        };

        if let Some(notifier) = &self.inner.notifier {
            notifier.notify(key, entry.value.clone(), RemovalCause::Explicit);
        }
        Some(entry.value)
    }

    /// Removes all entries and cancels their lifetime watchers.
    ///
    /// The map is empty once this method returns. Watchers that wake up later
    /// find nothing to remove.
    pub fn clear(&self) {
        let cleared = {
            let mut table = self.inner.table.write();
            for entry in table.entries.values() {
                entry.scope.cancel();
            }
            std::mem::take(&mut table.entries)
        };

        if let Some(notifier) = &self.inner.notifier {
            notifier.notify_all(
                cleared.into_iter().map(|(k, entry)| (k, entry.value)),
                RemovalCause::Explicit,
            );
        }
    }

    fn insert(&self, scope: &LifetimeScope, key: K, value: V, ttl: Duration) {
        let (id, entry_scope, replaced) = {
            let mut table = self.inner.table.write();
            let (id, entry) = table.new_entry(scope, value);
            let entry_scope = entry.scope.clone();
            let replaced = table.entries.insert(key.clone(), entry);
            if let Some(old) = &replaced {
                // The old watcher may still wake up later. It will find our id.
                old.scope.cancel();
            }
            (id, entry_scope, replaced)
        };

        if let (Some(notifier), Some(old)) = (&self.inner.notifier, replaced) {
            notifier.notify(key.clone(), old.value, RemovalCause::Replaced);
        }
        self.spawn_watcher(key, id, entry_scope, ttl);
    }

    fn insert_if_absent(&self, scope: &LifetimeScope, key: K, value: V, ttl: Duration) -> bool {
        let (id, entry_scope) = {
            let mut table = self.inner.table.write();
            if table.entries.contains_key(&key) {
                return false;
            }
            let (id, entry) = table.new_entry(scope, value);
            let entry_scope = entry.scope.clone();
            table.entries.insert(key.clone(), entry);
            (id, entry_scope)
        };

        self.spawn_watcher(key, id, entry_scope, ttl);
        true
    }

    fn spawn_watcher(&self, key: K, id: EntryId, scope: LifetimeScope, ttl: Duration) {
        let delay = time::watcher_delay(ttl, self.inner.max_jitter);
        let watcher = Watcher::new(Arc::downgrade(&self.inner), key, id);
        // If the runtime has shut down, the task is dropped right away and the
        // watcher removes the entry on drop.
        self.inner.runtime.spawn(watcher.watch(scope, delay));
    }
}

#[cfg(test)]
impl<K, V> ExpiringMap<K, V>
where
    K: Hash + Eq,
{
    fn entry_id(&self, key: &K) -> Option<EntryId> {
        self.inner.table.read().entries.get(key).map(|e| e.id)
    }

    fn inner_weak(&self) -> std::sync::Weak<Inner<K, V>> {
        Arc::downgrade(&self.inner)
    }
}

/// The identity of an entry. Ids are never reused within a map, not even
/// across `clear`, so a stale watcher can never match a newer entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EntryId(u64);

struct Entry<V> {
    id: EntryId,
    value: V,
    scope: LifetimeScope,
}

struct Table<K, V> {
    entries: HashMap<K, Entry<V>>,
    next_id: u64,
}

impl<K, V> Table<K, V> {
    fn new_entry(&mut self, scope: &LifetimeScope, value: V) -> (EntryId, Entry<V>) {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        let entry = Entry {
            id,
            value,
            scope: scope.child(),
        };
        (id, entry)
    }
}

pub(crate) struct Inner<K, V> {
    name: Option<String>,
    default_ttl: Duration,
    max_jitter: Option<Duration>,
    runtime: Handle,
    notifier: Option<RemovalNotifier<K, V>>,
    table: RwLock<Table<K, V>>,
}

impl<K, V> Inner<K, V>
where
    K: Hash + Eq,
{
    /// Removes the entry under `key` only if it is still the entry identified by
    /// `id`. Called by lifetime watchers after they wake up.
    pub(crate) fn remove_if_current(&self, key: K, id: EntryId, cause: RemovalCause) {
        let removed = {
            let mut table = self.table.write();
            let is_current = table.entries.get(&key).is_some_and(|e| e.id == id);
            if is_current {
                table.entries.remove(&key)
            } else {
                None
            }
        };

        match removed {
            Some(entry) => {
                #[cfg(feature = "logging")]
                log::trace!(
                    "{}Removed entry {:?} ({:?})",
                    self.log_prefix(),
                    entry.id,
                    cause
                );
                if let Some(notifier) = &self.notifier {
                    notifier.notify(key, entry.value, cause);
                }
            }
            None => {
                #[cfg(feature = "logging")]
                log::trace!(
                    "{}Entry {:?} was already superseded or removed",
                    self.log_prefix(),
                    id
                );
            }
        }
    }

    #[cfg(feature = "logging")]
    fn log_prefix(&self) -> String {
        crate::common::log_prefix(self.name.as_deref())
    }
}

impl<K, V> Drop for Inner<K, V> {
    fn drop(&mut self) {
        // Wake up the remaining watchers so they do not linger until their TTL.
        for entry in self.table.get_mut().entries.values() {
            entry.scope.cancel();
        }
    }
}
