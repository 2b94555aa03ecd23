use std::time::Duration;

use rand::Rng;

use crate::Error;

/// Checks that a time-to-live is strictly positive.
pub(crate) fn ensure_positive(ttl: Duration) -> Result<Duration, Error> {
    if ttl.is_zero() {
        Err(Error::InvalidTtl(ttl))
    } else {
        Ok(ttl)
    }
}

/// Returns how long a lifetime watcher should sleep before its entry expires.
///
/// When `max_jitter` is set, a uniformly random extra delay in `[0, max_jitter)`
/// is added so that entries inserted at the same instant do not all wake up and
/// contend for the write lock together.
pub(crate) fn watcher_delay(ttl: Duration, max_jitter: Option<Duration>) -> Duration {
    match max_jitter {
        Some(max) if !max.is_zero() => {
            // Jitter bounds above ~584 years are clamped.
            let max_nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
            let extra = rand::thread_rng().gen_range(0..max_nanos);
            ttl.saturating_add(Duration::from_nanos(extra))
        }
        _ => ttl,
    }
}
