use std::{hash::Hash, sync::Weak, time::Duration};

use super::{EntryId, Inner};
use crate::{notification::RemovalCause, LifetimeScope};

/// The lifetime watcher of a single entry.
///
/// A watcher removes its entry exactly once, if it is still the one identified
/// by `id`. It is created before it is handed to the runtime, so that a task
/// dropped without ever finishing (the runtime shut down, or was already shut
/// down at spawn time) still removes the entry instead of leaving it in the map
/// forever.
pub(crate) struct Watcher<K, V>
where
    K: Hash + Eq,
{
    map: Weak<Inner<K, V>>,
    // `None` once the watcher is done.
    key: Option<K>,
    id: EntryId,
}

impl<K, V> Watcher<K, V>
where
    K: Hash + Eq,
{
    pub(crate) fn new(map: Weak<Inner<K, V>>, key: K, id: EntryId) -> Self {
        Self {
            map,
            key: Some(key),
            id,
        }
    }

    /// Sleeps until either `delay` elapses or the entry's scope is cancelled
    /// (replacement, `remove`, `clear`, the caller's scope, or the map being
    /// dropped), then removes the entry. There is no retry.
    pub(crate) async fn watch(mut self, scope: LifetimeScope, delay: Duration) {
        let cause = tokio::select! {
            _ = scope.cancelled() => RemovalCause::Cancelled,
            _ = tokio::time::sleep(delay) => RemovalCause::Expired,
        };
        self.finish(cause);
    }

    fn finish(&mut self, cause: RemovalCause) {
        let Some(key) = self.key.take() else {
            return;
        };
        // The map is gone, along with the entry.
        let Some(map) = self.map.upgrade() else {
            return;
        };
        map.remove_if_current(key, self.id, cause);
    }
}

impl<K, V> Drop for Watcher<K, V>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        // Only does something when the task was dropped by the runtime.
        self.finish(RemovalCause::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use crate::{ExpiringMap, LifetimeScope, RemovalCause};

    use parking_lot::Mutex;
    use std::{sync::Arc, time::Duration};
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn jittered_watchers_expire_within_bounds() {
        let map = ExpiringMap::builder(Duration::from_secs(1))
            .expiry_jitter(Duration::from_millis(100))
            .build()
            .unwrap();
        let scope = LifetimeScope::new();

        for i in 0..200u32 {
            map.put(&scope, i, i);
        }

        sleep(Duration::from_millis(999)).await;
        assert_eq!(map.len(), 200);

        sleep(Duration::from_millis(102)).await;
        assert!(map.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_map_leaves_caller_scope_alone() {
        let scope = LifetimeScope::new();
        let handle = {
            let map = ExpiringMap::new(Duration::from_secs(1)).unwrap();
            map.put(&scope, "k", 1);
            tokio::spawn(async move {
                sleep(Duration::from_millis(500)).await;
                drop(map);
            })
        };

        handle.await.unwrap();
        sleep(Duration::from_secs(2)).await;
        // Only the entry's own scope was cancelled.
        assert!(!scope.is_cancelled());
    }

    #[test]
    fn entries_do_not_outlive_the_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let causes: Arc<Mutex<Vec<(&'static str, RemovalCause)>>> = Default::default();
        let map: ExpiringMap<&'static str, u32> = {
            let causes = Arc::clone(&causes);
            ExpiringMap::builder(Duration::from_secs(60))
                .runtime(runtime.handle().clone())
                .eviction_listener(move |k, _v, cause| causes.lock().push((k, cause)))
                .build()
                .unwrap()
        };
        let scope = LifetimeScope::new();

        map.put(&scope, "before", 1);
        assert_eq!(map.len(), 1);

        // Shutting down drops the pending watchers.
        drop(runtime);
        assert!(map.is_empty());

        // Nothing can watch this entry anymore.
        map.put(&scope, "after", 2);
        assert_eq!(map.get("after"), None);

        assert_eq!(
            *causes.lock(),
            vec![
                ("before", RemovalCause::Cancelled),
                ("after", RemovalCause::Cancelled),
            ]
        );
    }
}
