//! Rebuilds a validated authorize request from a return URL.
//!
//! Used by the login/consent pages to find out what they are resuming.
//! Returns `None` for anything that cannot be resumed; the reason is only
//! logged.
use std::sync::Arc;

use crate::services::authorize::parameters::{AuthorizationParameters, names};
use crate::services::authorize::request::AuthorizationRequest;
use crate::services::authorize::return_url::ReturnUrlGuard;
use crate::services::authorize::validator::{AuthorizeContext, AuthorizeRequestValidator};
use crate::services::claims::Principal;
use crate::services::message::{
    AuthorizationMessageService, MESSAGE_ID_PARAMETER, ResumedParameters,
};
use crate::services::par::{ParError, PushedRequestService};

/// Why stored parameters could not be brought back.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("request_uri is invalid or expired")]
    UnknownRequestUri,
    #[error("authzId is invalid or expired")]
    UnknownMessage,
    #[error("authorization request storage unavailable: {0}")]
    StorageUnavailable(String),
}

/// Request-scoped inputs of the assembler.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    // e.g. `https://idp.example.com`
    pub origin: String,
    // Subject of the interactive session, if signed in.
    pub subject: Option<Principal>,
}

#[derive(Clone)]
pub struct AuthorizationRequestAssembler {
    guard: ReturnUrlGuard,
    validator: Arc<dyn AuthorizeRequestValidator>,
    pushed: Option<PushedRequestService>,
    messages: AuthorizationMessageService,
}

impl std::fmt::Debug for AuthorizationRequestAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequestAssembler")
            .field("guard", &self.guard)
            .field("pushed", &self.pushed)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl AuthorizationRequestAssembler {
    pub fn new(
        guard: ReturnUrlGuard,
        validator: Arc<dyn AuthorizeRequestValidator>,
        pushed: Option<PushedRequestService>,
        messages: AuthorizationMessageService,
    ) -> Self {
        Self {
            guard,
            validator,
            pushed,
            messages,
        }
    }

    pub async fn parse(&self, return_url: &str, ctx: &RequestContext) -> Option<AuthorizationRequest> {
        // 1) guard: nothing is parsed from a rejected URL
        if !self.guard.is_valid_return_url(return_url, &ctx.origin) {
            tracing::trace!("No AuthorizationRequest being returned");
            return None;
        }

        // 2) parameters, replaced by the parked or pushed ones when referenced
        let resolved = match self.resolve(AuthorizationParameters::from_url(return_url)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "return URL references nothing resumable");
                return None;
            }
        };

        // 3) validation against the current session
        let validation_ctx = AuthorizeContext {
            subject: ctx.subject.as_ref(),
            pushed_request_uri: resolved.pushed_request_uri.as_deref(),
            pushing: false,
        };
        match self.validator.validate(&resolved.parameters, validation_ctx).await {
            Ok(request) => {
                tracing::trace!("AuthorizationRequest being returned");
                Some(request)
            }
            Err(e) => {
                tracing::debug!(error = %e, "return URL does not hold a valid authorize request");
                None
            }
        }
    }

    /// The parameters an authorize request actually carries:
    /// - `authzId`: the parked message, readable until it expires
    /// - `request_uri`: the pushed request, consumed
    /// - otherwise `outer` itself
    pub async fn resolve(
        &self,
        outer: AuthorizationParameters,
    ) -> Result<ResumedParameters, ResolveError> {
        if let Some(id) = outer.get(MESSAGE_ID_PARAMETER) {
            return match self.messages.read(id).await {
                Ok(Some(resumed)) => Ok(resumed),
                Ok(None) => Err(ResolveError::UnknownMessage),
                Err(e) => Err(ResolveError::StorageUnavailable(e.to_string())),
            };
        }

        if let Some(request_uri) = outer.get(names::REQUEST_URI) {
            let parameters = self.resolve_pushed(request_uri, &outer).await?;
            return Ok(ResumedParameters {
                parameters,
                pushed_request_uri: Some(request_uri.to_string()),
            });
        }

        Ok(ResumedParameters {
            parameters: outer,
            pushed_request_uri: None,
        })
    }

    /// Swap `outer` (which references `request_uri`) for the pushed parameters.
    /// The handle is consumed whatever the outcome.
    pub async fn resolve_pushed(
        &self,
        request_uri: &str,
        outer: &AuthorizationParameters,
    ) -> Result<AuthorizationParameters, ResolveError> {
        let Some(pushed) = &self.pushed else {
            tracing::debug!("request_uri present but pushed authorization is not configured");
            return Err(ResolveError::UnknownRequestUri);
        };

        let stored = match pushed.consume_and_read(request_uri).await {
            Ok(p) => p,
            Err(ParError::NotFound) => {
                tracing::debug!("pushed authorization request not found or expired");
                return Err(ResolveError::UnknownRequestUri);
            }
            Err(e) => {
                tracing::error!(error = %e, "pushed authorization request lookup failed");
                return Err(ResolveError::StorageUnavailable(e.to_string()));
            }
        };

        // The handle was issued to one client; nobody else may redeem it.
        if let Some(outer_client) = outer.get(names::CLIENT_ID)
            && stored.get(names::CLIENT_ID) != Some(outer_client)
        {
            tracing::warn!(
                client_id = %outer_client,
                "request_uri presented by a client it was not pushed for"
            );
            return Err(ResolveError::UnknownRequestUri);
        }

        Ok(stored)
    }
}
