use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
};

use event_listener::Event;
use parking_lot::Mutex;

/// A cancellation token that bounds the lifetime of map entries.
///
/// Every `put` call takes a `LifetimeScope`. The map derives a [child][child]
/// scope for the new entry, so cancelling the scope given by the caller (for
/// example because an upstream request was aborted) removes every entry that
/// was inserted under it, exactly as if their time-to-live had elapsed.
///
/// Scopes form a tree. Cancelling a scope cancels all of its live descendants,
/// while cancelling a child leaves its parent untouched. Cloning a scope gives
/// another handle to the same scope.
///
/// # Examples
///
/// ```rust
/// use ttlmap::LifetimeScope;
///
/// let request = LifetimeScope::new();
/// let step = request.child();
///
/// step.cancel();
/// assert!(step.is_cancelled());
/// assert!(!request.is_cancelled());
///
/// let other_step = request.child();
/// request.cancel();
/// assert!(other_step.is_cancelled());
/// ```
///
/// [child]: #method.child
#[derive(Clone, Default)]
pub struct LifetimeScope {
    inner: Arc<ScopeInner>,
}

#[derive(Default)]
struct ScopeInner {
    is_cancelled: AtomicBool,
    // Children keep their ancestors alive, never the other way around. This way a
    // dropped intermediate scope does not cut its descendants off the root.
    parent: Option<Arc<ScopeInner>>,
    children: Mutex<Vec<Weak<ScopeInner>>>,
    on_cancel: Event,
}

impl LifetimeScope {
    /// Creates a new root scope that is only cancelled by calling
    /// [`cancel`](#method.cancel) on it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives a child scope.
    ///
    /// The child is cancelled when this scope is cancelled, and can also be
    /// cancelled on its own. A child of an already cancelled scope is born
    /// cancelled.
    pub fn child(&self) -> Self {
        let child = Arc::new(ScopeInner {
            is_cancelled: AtomicBool::new(false),
            parent: Some(Arc::clone(&self.inner)),
            children: Mutex::new(Vec::new()),
            on_cancel: Event::new(),
        });
        {
            let mut children = self.inner.children.lock();
            if self.inner.is_cancelled.load(Ordering::Acquire) {
                child.is_cancelled.store(true, Ordering::Release);
            } else {
                // Prune dropped children only when the vector is about to grow,
                // which keeps `child` amortized O(1).
                if children.len() == children.capacity() {
                    children.retain(|c| c.strong_count() > 0);
                }
                children.push(Arc::downgrade(&child));
            }
        }
        Self { inner: child }
    }

    /// Cancels this scope and all of its live descendants, and wakes up every
    /// task waiting on [`cancelled`](#method.cancelled). Calling it more than
    /// once has no further effect.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` if this scope has been cancelled, either directly or
    /// through one of its ancestors.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled.load(Ordering::Acquire)
    }

    /// Waits until this scope is cancelled. Returns immediately if it already
    /// is.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let listener = self.inner.on_cancel.listen();
            // Re-check after registering the listener so that a `cancel` racing
            // with us cannot be missed.
            if self.is_cancelled() {
                break;
            }
            listener.await;
        }
    }
}

impl ScopeInner {
    // Walks the descendants with an explicit stack, so the depth of the tree is
    // not bounded by the thread's stack size.
    fn cancel(&self) {
        let mut pending = self.mark_cancelled();
        while let Some(child) = pending.pop() {
            if let Some(child) = child.upgrade() {
                pending.extend(child.mark_cancelled());
            }
        }
    }

    /// Flips the flag and wakes up the waiters. Returns the children to cancel
    /// next, or nothing if this scope was already cancelled.
    fn mark_cancelled(&self) -> Vec<Weak<ScopeInner>> {
        let children = {
            // The flag is flipped under the children lock so that `child` either
            // registers before us or observes the cancellation.
            let mut children = self.children.lock();
            if self.is_cancelled.swap(true, Ordering::AcqRel) {
                return Vec::new();
            }
            std::mem::take(&mut *children)
        };

        self.on_cancel.notify(usize::MAX);
        children
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        // Unlink the ancestors one at a time. Letting the fields drop on their own
        // would recurse once per level of nesting.
        let mut parent = self.parent.take();
        while let Some(scope) = parent {
            parent = match Arc::into_inner(scope) {
                Some(mut scope) => scope.parent.take(),
                // Still in use elsewhere.
                None => None,
            };
        }
    }
}

impl fmt::Debug for LifetimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeScope")
            .field("is_cancelled", &self.is_cancelled())
            .finish()
    }
}
