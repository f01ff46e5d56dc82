use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::repos::error::RepoError;
use crate::services::cache::CacheError;

/// A persisted pushed request. `parameters` is the serialized
/// `AuthorizationParameters` (JSON array of `[name, value]` pairs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedAuthorizationRequest {
    pub request_uri: String,
    pub expires_at_utc: DateTime<Utc>,
    pub parameters: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ParStoreError {
    #[error("request_uri already exists")]
    Duplicate,
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Repo(RepoError),
    #[error("store call timed out")]
    Timeout,
    #[error("stored value is malformed: {0}")]
    Malformed(String),
}

impl From<RepoError> for ParStoreError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Conflict => ParStoreError::Duplicate,
            other => ParStoreError::Repo(other),
        }
    }
}

/// Storage contract for pushed requests.
///
/// - `consume` reads and deletes in one atomic step. Of any number of
///   concurrent callers for the same handle at most one gets `Some`.
/// - An entry whose `expires_at_utc <= now` is never returned.
/// - `Err(_)` is a backend failure, distinct from "absent".
#[async_trait]
pub trait ParStore: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// `now` comes from the service clock; backends that set their own
    /// expiry measure the TTL from it.
    async fn store(
        &self,
        request: &PushedAuthorizationRequest,
        now: DateTime<Utc>,
    ) -> Result<(), ParStoreError>;

    async fn consume(
        &self,
        request_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParStoreError>;

    /// Best-effort removal of expired entries. Returns how many were removed.
    async fn sweep(&self, now: DateTime<Utc>) -> Result<u64, ParStoreError>;
}
