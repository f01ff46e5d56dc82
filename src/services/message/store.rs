use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::services::cache::CacheError;

/// A parked authorize request. `parameters` is the serialized
/// `AuthorizationParameters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationMessage {
    pub id: String,
    pub expires_at_utc: DateTime<Utc>,
    pub parameters: String,
    // Handle the parameters were originally pushed under, if any.
    pub pushed_request_uri: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MessageStoreError {
    #[error("message id already exists")]
    Duplicate,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("store call timed out")]
    Timeout,
    #[error("stored value is malformed: {0}")]
    Malformed(String),
}

/// Storage contract for parked messages.
///
/// - `read` never deletes; the entry lives until it expires.
/// - An entry whose `expires_at_utc <= now` is never returned.
/// - `Err(_)` is a backend failure, distinct from "absent".
#[async_trait]
pub trait AuthorizationMessageStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn write(
        &self,
        message: &AuthorizationMessage,
        now: DateTime<Utc>,
    ) -> Result<(), MessageStoreError>;

    async fn read(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AuthorizationMessage>, MessageStoreError>;

    /// Best-effort removal of expired entries. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, MessageStoreError>;
}
