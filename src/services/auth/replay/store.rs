use std::{future::Future, pin::Pin};

use crate::services::cache::CacheError;

/// "Seen this proof before?" with TTL-bound memory.
pub trait ReplayStore: Send + Sync {
    /// Atomic insert-if-absent.
    ///
    /// - `Ok(true)`: first sighting, now remembered for `ttl_secs`
    /// - `Ok(false)`: replay
    /// - `Err(_)`: the store could not answer; the proof must be rejected
    ///
    /// Of two concurrent calls with the same key at most one gets `Ok(true)`.
    fn check_and_store<'a>(
        &'a self,
        key: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ReplayError>> + Send + 'a>>;
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("replay cache is full ({capacity} live entries)")]
    CapacityExceeded { capacity: usize },

    #[error("replay store timed out")]
    Timeout,
}
