//! Parks validated authorize parameters and reads them back by id.
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration as ChronoDuration;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, warn};

use crate::services::authorize::parameters::AuthorizationParameters;
use crate::services::clock::SharedClock;
use crate::services::message::store::{
    AuthorizationMessage, AuthorizationMessageStore, MessageStoreError,
};

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("authorization message storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("authorization message lifetime out of range")]
    InvalidLifetime,
}

impl From<MessageStoreError> for MessageError {
    fn from(e: MessageStoreError) -> Self {
        MessageError::StorageUnavailable(e.to_string())
    }
}

/// What a parked message resumes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumedParameters {
    pub parameters: AuthorizationParameters,
    pub pushed_request_uri: Option<String>,
}

#[derive(Clone)]
pub struct AuthorizationMessageService {
    store: Arc<dyn AuthorizationMessageStore>,
    clock: SharedClock,
    ttl: Duration,
    store_timeout: Duration,
}

impl std::fmt::Debug for AuthorizationMessageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationMessageService")
            .field("backend", &self.store.backend_name())
            .field("ttl", &self.ttl)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl AuthorizationMessageService {
    pub fn new(
        store: Arc<dyn AuthorizationMessageStore>,
        clock: SharedClock,
        ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            store_timeout,
        }
    }

    /// Park `parameters` and return the id the return URL carries.
    pub async fn write(
        &self,
        parameters: &AuthorizationParameters,
        pushed_request_uri: Option<&str>,
    ) -> Result<String, MessageError> {
        let serialized = parameters
            .to_json()
            .map_err(|e| MessageError::StorageUnavailable(e.to_string()))?;
        let ttl = ChronoDuration::from_std(self.ttl).map_err(|_| MessageError::InvalidLifetime)?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let now = self.clock.now();
            let message = AuthorizationMessage {
                id: generate_id()?,
                expires_at_utc: now.checked_add_signed(ttl).ok_or(MessageError::InvalidLifetime)?,
                parameters: serialized.clone(),
                pushed_request_uri: pushed_request_uri.map(str::to_string),
            };

            match self.bounded(self.store.write(&message, now)).await {
                Ok(()) => {
                    debug!(backend = self.store.backend_name(), "authorization message parked");
                    return Ok(message.id);
                }
                Err(MessageStoreError::Duplicate) => warn!("authorization message id collision; regenerating"),
                Err(e) => {
                    error!(error = %e, backend = self.store.backend_name(), "failed to park authorization message");
                    return Err(e.into());
                }
            }
        }

        Err(MessageError::StorageUnavailable(
            "could not allocate a unique message id".to_string(),
        ))
    }

    /// `Ok(None)` for unknown, expired and unreadable messages.
    pub async fn read(&self, id: &str) -> Result<Option<ResumedParameters>, MessageError> {
        let Some(message) = self
            .bounded(self.store.read(id, self.clock.now()))
            .await
            .inspect_err(|e| {
                error!(error = %e, backend = self.store.backend_name(), "failed to read authorization message");
            })?
        else {
            return Ok(None);
        };

        match AuthorizationParameters::from_json(&message.parameters) {
            Ok(parameters) => Ok(Some(ResumedParameters {
                parameters,
                pushed_request_uri: message.pushed_request_uri,
            })),
            Err(e) => {
                error!(error = %e, "stored authorization message is malformed");
                Ok(None)
            }
        }
    }

    pub async fn sweep(&self) -> Result<u64, MessageError> {
        let removed = self.bounded(self.store.sweep(self.clock.now())).await?;
        if removed > 0 {
            debug!(removed, backend = self.store.backend_name(), "expired authorization messages swept");
        }
        Ok(removed)
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, MessageStoreError>>,
    ) -> Result<T, MessageStoreError> {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| MessageStoreError::Timeout)?
    }
}

fn generate_id() -> Result<String, MessageError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| MessageError::StorageUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
