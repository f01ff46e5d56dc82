use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::cache::{CacheClient, ttl_until};
use crate::services::par::store::{ParStore, ParStoreError, PushedAuthorizationRequest};

/// Valkey-backed store (Redis protocol).
///
/// - create: `SET <prefix>:<request_uri> <json> NX EX <ttl>`
/// - consume: `GETDEL`, so concurrent consumers cannot both read the value.
/// - expiry: delegated to the backend TTL; `expires_at_utc` is still checked
///   on read since `EX` has whole-second granularity.
pub struct ValkeyParStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl<C: CacheClient> std::fmt::Debug for ValkeyParStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyParStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    expires_at_utc: DateTime<Utc>,
    parameters: String,
}

impl<C: CacheClient> ValkeyParStore<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn key(&self, request_uri: &str) -> String {
        format!("{}:{}", self.prefix, request_uri)
    }
}

#[async_trait]
impl<C: CacheClient> ParStore for ValkeyParStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn store(
        &self,
        request: &PushedAuthorizationRequest,
        now: DateTime<Utc>,
    ) -> Result<(), ParStoreError> {
        let value = serde_json::to_string(&StoredValue {
            expires_at_utc: request.expires_at_utc,
            parameters: request.parameters.clone(),
        })
        .map_err(|e| ParStoreError::Malformed(e.to_string()))?;

        // Rounded up so the key never disappears before `expires_at_utc`.
        let ttl = ttl_until(request.expires_at_utc, now);
        let inserted = self
            .cache
            .set_if_absent_with_ttl(&self.key(&request.request_uri), &value, ttl)
            .await?;
        if !inserted {
            return Err(ParStoreError::Duplicate);
        }
        Ok(())
    }

    async fn consume(
        &self,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParStoreError> {
        let Some(raw) = self.cache.get_del(&self.key(request_uri)).await? else {
            return Ok(None);
        };
        let stored: StoredValue =
            serde_json::from_str(&raw).map_err(|e| ParStoreError::Malformed(e.to_string()))?;

        if stored.expires_at_utc <= now {
            return Ok(None);
        }
        Ok(Some(PushedAuthorizationRequest {
            request_uri: request_uri.to_string(),
            expires_at_utc: stored.expires_at_utc,
            parameters: stored.parameters,
        }))
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<u64, ParStoreError> {
        // Backend TTL does the sweeping.
        Ok(0)
    }
}
