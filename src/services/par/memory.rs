use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::services::par::store::{ParStore, ParStoreError, PushedAuthorizationRequest};

/// Process-local store. Read and delete happen under one lock acquisition,
/// with no await point between them.
#[derive(Debug, Default)]
pub struct InMemoryParStore {
    entries: Mutex<HashMap<String, PushedAuthorizationRequest>>,
}

impl InMemoryParStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl ParStore for InMemoryParStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn store(
        &self,
        request: &PushedAuthorizationRequest,
        _now: DateTime<Utc>,
    ) -> Result<(), ParStoreError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&request.request_uri) {
            return Err(ParStoreError::Duplicate);
        }
        entries.insert(request.request_uri.clone(), request.clone());
        Ok(())
    }

    async fn consume(
        &self,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParStoreError> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(request_uri)
            .filter(|r| r.expires_at_utc > now))
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, ParStoreError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, r| r.expires_at_utc > now);
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn record(uri: &str, expires_at_utc: DateTime<Utc>) -> PushedAuthorizationRequest {
        PushedAuthorizationRequest {
            request_uri: uri.to_string(),
            expires_at_utc,
            parameters: "[]".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_handle_is_rejected() {
        let store = InMemoryParStore::new();
        let exp = Utc::now() + ChronoDuration::seconds(60);

        store.store(&record("u", exp), Utc::now()).await.unwrap();
        assert!(matches!(
            store.store(&record("u", exp), Utc::now()).await,
            Err(ParStoreError::Duplicate)
        ));
    }

    #[tokio::test]
    async fn expired_entry_is_removed_but_not_returned() {
        let store = InMemoryParStore::new();
        let now = Utc::now();

        store.store(&record("u", now), now).await.unwrap();
        assert_eq!(store.consume("u", now).await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn sweep_keeps_live_entries() {
        let store = InMemoryParStore::new();
        let now = Utc::now();

        store.store(&record("old", now - ChronoDuration::seconds(1)), now).await.unwrap();
        store.store(&record("new", now + ChronoDuration::seconds(60)), now).await.unwrap();

        assert_eq!(store.sweep(now).await.unwrap(), 1);
        assert!(store.consume("new", now).await.unwrap().is_some());
    }
}
