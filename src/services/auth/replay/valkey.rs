use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use crate::services::auth::replay::store::{ReplayError, ReplayStore};
use crate::services::cache::CacheClient;

/// Replay keys in Valkey. The backend TTL is the only expiry mechanism, so
/// nothing here needs sweeping.
pub struct ValkeyReplayStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl<C: CacheClient> ValkeyReplayStore<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }
}

impl<C: CacheClient> ReplayStore for ValkeyReplayStore<C> {
    fn check_and_store<'a>(
        &'a self,
        key: &'a str,
        ttl_secs: u64,
    ) -> Pin<Box<dyn Future<Output = Result<bool, ReplayError>> + Send + 'a>> {
        Box::pin(async move {
            let first_seen = self
                .cache
                .set_if_absent_with_ttl(
                    &format!("{}:{key}", self.prefix),
                    "1",
                    Duration::from_secs(ttl_secs),
                )
                .await?;

            tracing::trace!(backend = self.cache.backend_name(), first_seen, "replay check");
            Ok(first_seen)
        })
    }
}
