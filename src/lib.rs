#![warn(clippy::all)]
#![warn(rust_2018_idioms)]

//! `ttlmap` is a concurrent key-value map whose entries expire individually.
//!
//! Every entry carries its own time-to-live (TTL) and is removed automatically
//! when it elapses. There is no periodic sweep: each entry gets a lightweight
//! _lifetime watcher_ task on a [Tokio][tokio-crate] runtime, which removes the
//! entry when its deadline is reached or when the entry's
//! [`LifetimeScope`][scope-struct] is cancelled.
//!
//! The map fits short-lived tables where entries must expire on their own and
//! can be replaced at any time: deduplication windows, rate-limit markers,
//! pending-request trackers and the like.
//!
//! [tokio-crate]: https://crates.io/crates/tokio
//! [scope-struct]: ./struct.LifetimeScope.html
//!
//! # Features
//!
//! - Thread-safe and cheap to clone: all clones share the same entries.
//! - A default TTL per map, and an optional TTL per insert.
//! - Conditional insert (`test_and_put`) for test-and-set semantics.
//! - Early removal by cancelling a [`LifetimeScope`][scope-struct]. Scopes form a
//!   tree, so a request-level scope can bound every entry inserted on behalf of
//!   that request.
//! - Race-safe replacement: the watcher of a replaced entry can never remove the
//!   entry that replaced it.
//! - An optional eviction listener that is told why each entry left the map.
//!
//! # Example
//!
//! ```rust
//! use ttlmap::{ExpiringMap, LifetimeScope};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), ttlmap::Error> {
//!     // Message ids seen in the last 200 milliseconds.
//!     let seen = ExpiringMap::new(Duration::from_millis(200))?;
//!     let scope = LifetimeScope::new();
//!
//!     assert!(seen.test_and_put(&scope, "msg-1".to_string(), ()));
//!     // A duplicate within the window is rejected.
//!     assert!(!seen.test_and_put(&scope, "msg-1".to_string(), ()));
//!
//!     tokio::time::sleep(Duration::from_millis(300)).await;
//!     // The window has passed.
//!     assert!(seen.test_and_put(&scope, "msg-1".to_string(), ()));
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! Enable the `logging` feature to get log records through the [`log`][log-crate]
//! facade: `trace` records when watchers remove entries, and an `error` record
//! when an eviction listener panics.
//!
//! [log-crate]: https://crates.io/crates/log

mod builder;
mod common;
mod error;
mod map;
mod notification;
mod scope;

pub use builder::ExpiringMapBuilder;
pub use error::Error;
pub use map::ExpiringMap;
pub use notification::RemovalCause;
pub use scope::LifetimeScope;
