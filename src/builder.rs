use crate::{
    common::time, notification::EvictionListener, Error, ExpiringMap, RemovalCause,
};

use std::{fmt, hash::Hash, sync::Arc, time::Duration};
use tokio::runtime::Handle;

/// Builds an [`ExpiringMap`][map-struct] with various configuration knobs.
///
/// [map-struct]: ./struct.ExpiringMap.html
///
/// # Examples
///
/// ```rust
/// use ttlmap::{ExpiringMap, LifetimeScope, RemovalCause};
///
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), ttlmap::Error> {
/// let map = ExpiringMap::builder(Duration::from_secs(60))
///     .name("pending-requests")
///     .initial_capacity(1_024)
///     // Spread the expiry of entries inserted in the same instant over 50ms.
///     .expiry_jitter(Duration::from_millis(50))
///     .eviction_listener(|key: u64, _value: String, cause| {
///         if cause == RemovalCause::Expired {
///             println!("request {key} timed out");
///         }
///     })
///     .build()?;
///
/// map.put(&LifetimeScope::new(), 42, "GET /".to_string());
/// assert_eq!(map.name(), Some("pending-requests"));
/// # Ok(())
/// # }
/// ```
///
#[must_use]
pub struct ExpiringMapBuilder<K, V> {
    name: Option<String>,
    default_ttl: Duration,
    initial_capacity: Option<usize>,
    max_jitter: Option<Duration>,
    runtime: Option<Handle>,
    eviction_listener: Option<EvictionListener<K, V>>,
}

impl<K, V> ExpiringMapBuilder<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Construct a new `ExpiringMapBuilder` that will be used to build an
    /// `ExpiringMap` whose entries live for `default_ttl` unless a TTL is given
    /// at insertion.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            name: None,
            default_ttl,
            initial_capacity: None,
            max_jitter: None,
            runtime: None,
            eviction_listener: None,
        }
    }

    /// Builds an `ExpiringMap<K, V>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTtl`] if the default TTL is zero, and
    /// [`Error::NoRuntime`] if no runtime handle was given and this method is
    /// called outside of a Tokio runtime.
    pub fn build(self) -> Result<ExpiringMap<K, V>, Error> {
        let default_ttl = time::ensure_positive(self.default_ttl)?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };

        Ok(ExpiringMap::with_everything(
            self.name,
            default_ttl,
            self.initial_capacity,
            self.max_jitter,
            runtime,
            self.eviction_listener,
        ))
    }

    /// Sets the name of the map. The name is used in log messages when the
    /// `logging` feature is enabled.
    pub fn name(self, name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..self
        }
    }

    /// Sets the initial capacity (number of entries) of the map.
    pub fn initial_capacity(self, number_of_entries: usize) -> Self {
        Self {
            initial_capacity: Some(number_of_entries),
            ..self
        }
    }

    /// Adds a uniformly random delay in `[0, max)` to the lifetime of every
    /// entry.
    ///
    /// This lowers write-lock contention when many entries are inserted at the
    /// same instant, since their watchers no longer wake up together. It never
    /// shortens a lifetime.
    pub fn expiry_jitter(self, max: Duration) -> Self {
        Self {
            max_jitter: Some(max),
            ..self
        }
    }

    /// Sets the Tokio runtime that lifetime watchers are spawned on.
    ///
    /// By default the runtime `build` is called from is used.
    ///
    /// Entries cannot outlive the runtime. Once it shuts down, the entries that
    /// were waiting on it are removed with [`RemovalCause::Cancelled`], and an
    /// entry inserted afterward is removed before the insert returns.
    ///
    /// [`RemovalCause::Cancelled`]: ./enum.RemovalCause.html#variant.Cancelled
    pub fn runtime(self, handle: Handle) -> Self {
        Self {
            runtime: Some(handle),
            ..self
        }
    }

    /// Sets the eviction listener closure of the map.
    ///
    /// The closure is called with the key, the value and the
    /// [`RemovalCause`][removal-cause] every time an entry leaves the map. It is
    /// called without holding any lock on the map, either from the thread that
    /// performed the removal (`put`, `remove`, `clear`) or from a lifetime
    /// watcher task (expiry and cancellation).
    ///
    /// # Panics
    ///
    /// If the listener panics, the panic is caught and the listener is disabled
    /// for the rest of the map's life. With the `logging` feature enabled, an
    /// error is logged.
    ///
    /// [removal-cause]: ./enum.RemovalCause.html
    pub fn eviction_listener<F>(self, listener: F) -> Self
    where
        F: Fn(K, V, RemovalCause) + Send + Sync + 'static,
    {
        Self {
            eviction_listener: Some(Arc::new(listener)),
            ..self
        }
    }
}

impl<K, V> fmt::Debug for ExpiringMapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringMapBuilder")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("initial_capacity", &self.initial_capacity)
            .field("max_jitter", &self.max_jitter)
            .field("has_eviction_listener", &self.eviction_listener.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ExpiringMapBuilder;
    use crate::{Error, ExpiringMap, LifetimeScope};

    use std::time::Duration;

    #[tokio::test]
    async fn build_map() {
        // ExpiringMap<char, String>
        let map = ExpiringMapBuilder::new(Duration::from_secs(45 * 60))
            .name("test")
            .initial_capacity(100)
            .build()
            .unwrap();

        assert_eq!(map.default_ttl(), Duration::from_secs(45 * 60));
        assert_eq!(map.name(), Some("test"));

        map.put(&LifetimeScope::new(), 'a', "Alice".to_string());
        assert_eq!(map.get(&'a'), Some("Alice".to_string()));
    }

    #[test]
    fn build_fails_without_runtime() {
        let result = ExpiringMap::<u32, u32>::builder(Duration::from_secs(1)).build();
        assert!(matches!(result, Err(Error::NoRuntime)));
    }

    #[test]
    fn build_fails_with_zero_ttl() {
        let result = ExpiringMap::<u32, u32>::builder(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::InvalidTtl(ttl)) if ttl.is_zero()));
    }

    #[test]
    fn build_with_explicit_runtime() -> anyhow::Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()?;

        // Built and used outside of the runtime context.
        let map = ExpiringMap::builder(Duration::from_secs(1))
            .runtime(runtime.handle().clone())
            .build()?;
        let scope = LifetimeScope::new();
        map.put(&scope, "k", 1);
        assert_eq!(map.get("k"), Some(1));

        // The sleep must be created inside the runtime context.
        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(1001)).await });
        assert_eq!(map.get("k"), None);
        Ok(())
    }
}
