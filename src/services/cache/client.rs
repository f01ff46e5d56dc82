//! Key/value surface shared by the Valkey-backed stores (DPoP replay, PAR).
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Transport or command failure.
///
/// Callers map both variants to "storage unavailable", never to "not found".
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
}

/// Atomic primitives:
/// - insert-if-absent with expiry (replay keys, PAR handles, parked messages)
/// - read-and-delete (PAR consume)
/// - plain read (parked messages)
///
/// Implementations must be cheap to clone.
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;

    /// `Ok(true)` if the key was stored, `Ok(false)` if it already existed.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool>;

    /// `None` when the key is absent or already expired.
    async fn get_del(&self, key: &str) -> CacheResult<Option<String>>;

    /// Like `get_del` but leaves the key in place.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
}

/// Backend TTL for a value that must outlive `expires_at`, measured from
/// `now`. Rounded up to whole seconds, never below one.
pub fn ttl_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    let remaining_ms = (expires_at - now).num_milliseconds().max(0) as u64;
    Duration::from_secs(remaining_ms.div_ceil(1000).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn ttl_rounds_up_and_never_reaches_zero() {
        let now = Utc::now();
        assert_eq!(ttl_until(now + ChronoDuration::milliseconds(1500), now), Duration::from_secs(2));
        assert_eq!(ttl_until(now + ChronoDuration::seconds(60), now), Duration::from_secs(60));
        assert_eq!(ttl_until(now - ChronoDuration::seconds(5), now), Duration::from_secs(1));
    }
}
