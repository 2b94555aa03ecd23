use std::time::Duration;

/// The error type for building an [`ExpiringMap`][map-struct] and for inserting
/// entries with an explicit time-to-live.
///
/// [map-struct]: ./struct.ExpiringMap.html
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The given time-to-live was zero. Both the default TTL of a map and the TTL
    /// passed to the `*_with_ttl` methods must be strictly positive.
    #[error("time-to-live must be greater than zero (got {0:?})")]
    InvalidTtl(Duration),

    /// The map was built outside of a Tokio runtime and no runtime handle was
    /// given to the builder.
    ///
    /// Either build the map from within a runtime, or pass a handle by calling
    /// the [`ExpiringMapBuilder::runtime`][builder-runtime] method.
    ///
    /// [builder-runtime]: ./struct.ExpiringMapBuilder.html#method.runtime
    #[error(
        "No Tokio runtime is available to run the lifetime watchers. \
    Please build the map from within a runtime, or pass a runtime handle \
    to the runtime method of the builder"
    )]
    NoRuntime,
}
