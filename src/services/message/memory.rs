use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::services::message::store::{
    AuthorizationMessage, AuthorizationMessageStore, MessageStoreError,
};

/// Process-local store; entries are dropped by `sweep`.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    entries: Mutex<HashMap<String, AuthorizationMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl AuthorizationMessageStore for InMemoryMessageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn write(
        &self,
        message: &AuthorizationMessage,
        _now: DateTime<Utc>,
    ) -> Result<(), MessageStoreError> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&message.id) {
            return Err(MessageStoreError::Duplicate);
        }
        entries.insert(message.id.clone(), message.clone());
        Ok(())
    }

    async fn read(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationMessage>, MessageStoreError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(id)
            .filter(|m| m.expires_at_utc > now)
            .cloned())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, MessageStoreError> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, m| m.expires_at_utc > now);
        Ok((before - entries.len()) as u64)
    }
}
