use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::cache::{CacheClient, ttl_until};
use crate::services::message::store::{
    AuthorizationMessage, AuthorizationMessageStore, MessageStoreError,
};

/// Valkey-backed store: `SET <prefix>:<id> <json> NX EX <ttl>` and plain `GET`.
/// The backend TTL removes entries; `expires_at_utc` is still checked on read.
pub struct ValkeyMessageStore<C: CacheClient> {
    cache: Arc<C>,
    prefix: String,
}

impl<C: CacheClient> std::fmt::Debug for ValkeyMessageStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyMessageStore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    expires_at_utc: DateTime<Utc>,
    parameters: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pushed_request_uri: Option<String>,
}

impl<C: CacheClient> ValkeyMessageStore<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    fn key(&self, id: &str) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[async_trait]
impl<C: CacheClient> AuthorizationMessageStore for ValkeyMessageStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn write(
        &self,
        message: &AuthorizationMessage,
        now: DateTime<Utc>,
    ) -> Result<(), MessageStoreError> {
        let value = serde_json::to_string(&StoredValue {
            expires_at_utc: message.expires_at_utc,
            parameters: message.parameters.clone(),
            pushed_request_uri: message.pushed_request_uri.clone(),
        })
        .map_err(|e| MessageStoreError::Malformed(e.to_string()))?;

        let ttl = ttl_until(message.expires_at_utc, now);
        if !self
            .cache
            .set_if_absent_with_ttl(&self.key(&message.id), &value, ttl)
            .await?
        {
            return Err(MessageStoreError::Duplicate);
        }
        Ok(())
    }

    async fn read(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationMessage>, MessageStoreError> {
        let Some(raw) = self.cache.get(&self.key(id)).await? else {
            return Ok(None);
        };
        let stored: StoredValue =
            serde_json::from_str(&raw).map_err(|e| MessageStoreError::Malformed(e.to_string()))?;

        if stored.expires_at_utc <= now {
            return Ok(None);
        }
        Ok(Some(AuthorizationMessage {
            id: id.to_string(),
            expires_at_utc: stored.expires_at_utc,
            parameters: stored.parameters,
            pushed_request_uri: stored.pushed_request_uri,
        }))
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<u64, MessageStoreError> {
        Ok(0)
    }
}
