use std::sync::atomic::{AtomicBool, Ordering};

use crate::notification::{EvictionListener, RemovalCause};

pub(crate) struct RemovalNotifier<K, V> {
    listener: EvictionListener<K, V>,
    is_enabled: AtomicBool,
    #[cfg(feature = "logging")]
    map_name: Option<String>,
}

impl<K, V> RemovalNotifier<K, V> {
    pub(crate) fn new(listener: EvictionListener<K, V>, _map_name: Option<String>) -> Self {
        Self {
            listener,
            is_enabled: AtomicBool::new(true),
            #[cfg(feature = "logging")]
            map_name: _map_name,
        }
    }

    /// Must be called without holding the table lock.
    pub(crate) fn notify(&self, key: K, value: V, cause: RemovalCause) {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        if !self.is_enabled.load(Ordering::Acquire) {
            return;
        }

        // Unwind safety holds because a listener that panicked is never called
        // again.
        let result = catch_unwind(AssertUnwindSafe(|| (self.listener)(key, value, cause)));
        if let Err(_payload) = result {
            self.is_enabled.store(false, Ordering::Release);
            #[cfg(feature = "logging")]
            log_panic(&*_payload, self.map_name.as_deref());
        }
    }

    pub(crate) fn notify_all(&self, removed: impl IntoIterator<Item = (K, V)>, cause: RemovalCause) {
        for (key, value) in removed {
            self.notify(key, value, cause);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_enabled(&self) -> bool {
        self.is_enabled.load(Ordering::Acquire)
    }
}

#[cfg(feature = "logging")]
fn log_panic(payload: &(dyn std::any::Any + Send + 'static), map_name: Option<&str>) {
    let prefix = crate::common::log_prefix(map_name);
    if let Some(reason) = payload.downcast_ref::<&str>() {
        log::error!("{prefix}Eviction listener panicked ({reason}); it will not be called again");
    } else if let Some(reason) = payload.downcast_ref::<String>() {
        log::error!("{prefix}Eviction listener panicked ({reason}); it will not be called again");
    } else {
        log::error!("{prefix}Eviction listener panicked; it will not be called again");
    }
}
