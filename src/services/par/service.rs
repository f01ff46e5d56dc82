//! Pushed-request lifecycle: create, consume-and-read, sweep.
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration as ChronoDuration;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

use crate::services::authorize::parameters::AuthorizationParameters;
use crate::services::clock::SharedClock;
use crate::services::par::REQUEST_URI_PREFIX;
use crate::services::par::store::{ParStore, ParStoreError, PushedAuthorizationRequest};

// Handle collisions at 256 bits mean a broken random source; give up quickly.
const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum ParError {
    /// Unknown, expired and already-consumed handles are indistinguishable.
    #[error("pushed authorization request not found")]
    NotFound,
    #[error("pushed authorization request storage unavailable: {0}")]
    StorageUnavailable(String),
    /// The requested lifetime cannot be represented as an expiry instant.
    #[error("pushed authorization request lifetime out of range")]
    InvalidLifetime,
}

impl From<ParStoreError> for ParError {
    fn from(e: ParStoreError) -> Self {
        ParError::StorageUnavailable(e.to_string())
    }
}

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedRequestHandle {
    pub request_uri: String,
    pub expires_in: u64,
}

#[derive(Clone)]
pub struct PushedRequestService {
    store: Arc<dyn ParStore>,
    clock: SharedClock,
    default_ttl: Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for PushedRequestService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushedRequestService")
            .field("backend", &self.store.backend_name())
            .field("default_ttl", &self.default_ttl)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl PushedRequestService {
    pub fn new(
        store: Arc<dyn ParStore>,
        clock: SharedClock,
        default_ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            default_ttl,
            store_timeout,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn create(
        &self,
        parameters: &AuthorizationParameters,
    ) -> Result<PushedRequestHandle, ParError> {
        self.create_with_ttl(parameters, self.default_ttl).await
    }

    /// Persist `parameters` under a fresh handle that expires after `ttl`.
    pub async fn create_with_ttl(
        &self,
        parameters: &AuthorizationParameters,
        ttl: Duration,
    ) -> Result<PushedRequestHandle, ParError> {
        let serialized = parameters
            .to_json()
            .map_err(|e| ParError::StorageUnavailable(e.to_string()))?;
        let ttl_chrono = ChronoDuration::from_std(ttl).map_err(|_| ParError::InvalidLifetime)?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let request_uri = generate_request_uri()?;
            let now = self.clock.now();
            let expires_at_utc = now
                .checked_add_signed(ttl_chrono)
                .ok_or(ParError::InvalidLifetime)?;
            let record = PushedAuthorizationRequest {
                request_uri: request_uri.clone(),
                expires_at_utc,
                parameters: serialized.clone(),
            };

            match self.bounded(self.store.store(&record, now)).await {
                Ok(()) => {
                    debug!(backend = self.store.backend_name(), "pushed authorization request stored");
                    return Ok(PushedRequestHandle {
                        request_uri,
                        expires_in: ttl.as_secs(),
                    });
                }
                Err(ParStoreError::Duplicate) => {
                    warn!("request_uri collision; regenerating");
                }
                Err(e) => {
                    error!(error = %e, backend = self.store.backend_name(), "failed to store pushed authorization request");
                    return Err(e.into());
                }
            }
        }

        Err(ParError::StorageUnavailable(
            "could not allocate a unique request_uri".to_string(),
        ))
    }

    /// Read and delete in one step. A second call for the same handle is `NotFound`.
    pub async fn consume_and_read(
        &self,
        request_uri: &str,
    ) -> Result<AuthorizationParameters, ParError> {
        // Anything that is not one of our handles cannot be in the store.
        if !request_uri.starts_with(REQUEST_URI_PREFIX) {
            return Err(ParError::NotFound);
        }

        let now = self.clock.now();
        let record = self
            .bounded(self.store.consume(request_uri, now))
            .await
            .inspect_err(|e| {
                error!(error = %e, backend = self.store.backend_name(), "failed to consume pushed authorization request");
            })?
            .ok_or(ParError::NotFound)?;

        AuthorizationParameters::from_json(&record.parameters).map_err(|e| {
            // The record is gone either way; nothing usable to hand back.
            error!(error = %e, "stored pushed authorization parameters are malformed");
            ParError::NotFound
        })
    }

    pub async fn sweep(&self) -> Result<u64, ParError> {
        let removed = self.bounded(self.store.sweep(self.clock.now())).await?;
        if removed > 0 {
            debug!(removed, backend = self.store.backend_name(), "expired pushed requests swept");
        }
        Ok(removed)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ParStoreError>>,
    ) -> Result<T, ParStoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| ParStoreError::Timeout)?
    }
}

fn generate_request_uri() -> Result<String, ParError> {
    // 32 bytes of entropy -> URL-safe base64 without padding.
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| ParError::StorageUnavailable(e.to_string()))?;
    Ok(format!("{}{}", REQUEST_URI_PREFIX, URL_SAFE_NO_PAD.encode(bytes)))
}
