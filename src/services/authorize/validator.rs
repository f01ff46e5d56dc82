//! Authorize request validation.
//!
//! Only the authorization code flow is accepted. Errors raised before the
//! redirect URI is known to belong to the client must not be sent to it:
//! those come back as `AuthorizeValidationError::Local`.
use async_trait::async_trait;
use std::sync::Arc;

use crate::services::authorize::client::{Client, ClientStore};
use crate::services::authorize::parameters::{AuthorizationParameters, names};
use crate::services::authorize::request::AuthorizationRequest;
use crate::services::authorize::scope::ScopeParser;
use crate::services::claims::Principal;

const SINGLE_VALUED: &[&str] = &[
    names::CLIENT_ID,
    names::REDIRECT_URI,
    names::RESPONSE_TYPE,
    names::RESPONSE_MODE,
    names::SCOPE,
    names::STATE,
    names::NONCE,
    names::CODE_CHALLENGE,
    names::CODE_CHALLENGE_METHOD,
    names::PROMPT,
    names::MAX_AGE,
    names::LOGIN_HINT,
    names::UI_LOCALES,
    names::ACR_VALUES,
    names::REQUEST_URI,
    names::REQUEST,
];

const PROMPT_MODES: &[&str] = &["none", "login", "consent", "select_account", "create"];
const RESPONSE_MODES: &[&str] = &["query", "fragment", "form_post"];

// RFC 7636 §4.2
const CODE_CHALLENGE_MIN_LEN: usize = 43;
const CODE_CHALLENGE_MAX_LEN: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),
    #[error("invalid_scope: {0}")]
    InvalidScope(String),
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),
    #[error("login_required")]
    LoginRequired,
    #[error("client store unavailable: {0}")]
    StorageUnavailable(String),
}

impl AuthorizeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::InvalidScope(_) => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::LoginRequired => "login_required",
            Self::StorageUnavailable(_) => "temporarily_unavailable",
        }
    }
}

/// What the validator needs to know besides the parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizeContext<'a> {
    pub subject: Option<&'a Principal>,
    // The parameters were read from this pushed request handle.
    pub pushed_request_uri: Option<&'a str>,
    // The parameters are being pushed (PAR endpoint), not used yet.
    pub pushing: bool,
}

/// A request that failed after the client and redirect URI were verified.
/// The error may be returned to `redirect_uri`.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RedirectableError {
    pub error: AuthorizeError,
    pub redirect_uri: String,
    pub state: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeValidationError {
    #[error(transparent)]
    Local(AuthorizeError),
    #[error(transparent)]
    Redirect(RedirectableError),
}

impl AuthorizeValidationError {
    pub fn error(&self) -> &AuthorizeError {
        match self {
            Self::Local(e) => e,
            Self::Redirect(r) => &r.error,
        }
    }
}

impl From<AuthorizeError> for AuthorizeValidationError {
    fn from(e: AuthorizeError) -> Self {
        Self::Local(e)
    }
}

#[async_trait]
pub trait AuthorizeRequestValidator: Send + Sync {
    async fn validate(
        &self,
        parameters: &AuthorizationParameters,
        ctx: AuthorizeContext<'_>,
    ) -> Result<AuthorizationRequest, AuthorizeValidationError>;
}

#[derive(Clone)]
pub struct BasicAuthorizeRequestValidator {
    clients: Arc<dyn ClientStore>,
    scope_parser: ScopeParser,
}

impl std::fmt::Debug for BasicAuthorizeRequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthorizeRequestValidator")
            .field("scope_parser", &self.scope_parser)
            .finish_non_exhaustive()
    }
}

fn optional(parameters: &AuthorizationParameters, name: &str) -> Option<String> {
    parameters
        .get(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl BasicAuthorizeRequestValidator {
    pub fn new(clients: Arc<dyn ClientStore>, scope_parser: ScopeParser) -> Self {
        Self {
            clients,
            scope_parser,
        }
    }

    async fn load_client(&self, parameters: &AuthorizationParameters) -> Result<Client, AuthorizeError> {
        let client_id = optional(parameters, names::CLIENT_ID)
            .ok_or_else(|| AuthorizeError::InvalidRequest("client_id is missing".into()))?;

        self.clients
            .find_enabled_client_by_id(&client_id)
            .await
            .map_err(|e| AuthorizeError::StorageUnavailable(e.to_string()))?
            .ok_or_else(|| AuthorizeError::UnauthorizedClient(format!("unknown client {client_id}")))
    }

    /// Checks that run once the redirect URI is trusted.
    fn validate_protocol(
        &self,
        client: &Client,
        parameters: &AuthorizationParameters,
        ctx: AuthorizeContext<'_>,
        redirect_uri: String,
    ) -> Result<AuthorizationRequest, AuthorizeError> {
        // 1) response_type / response_mode
        let response_type = optional(parameters, names::RESPONSE_TYPE)
            .ok_or_else(|| AuthorizeError::InvalidRequest("response_type is missing".into()))?;
        if !client.allowed_response_types.iter().any(|t| *t == response_type) {
            return Err(AuthorizeError::UnsupportedResponseType(response_type));
        }
        let response_mode = optional(parameters, names::RESPONSE_MODE);
        if let Some(mode) = &response_mode
            && !RESPONSE_MODES.contains(&mode.as_str())
        {
            return Err(AuthorizeError::InvalidRequest(format!(
                "unsupported response_mode {mode}"
            )));
        }

        // 2) scope
        let scope = optional(parameters, names::SCOPE)
            .ok_or_else(|| AuthorizeError::InvalidScope("scope is missing".into()))?;
        let scopes = self
            .scope_parser
            .parse(&scope)
            .map_err(|e| AuthorizeError::InvalidScope(e.to_string()))?;
        if let Some(denied) = scopes
            .iter()
            .find(|s| !client.allowed_scopes.iter().any(|a| *a == s.parsed_name))
        {
            return Err(AuthorizeError::InvalidScope(format!(
                "scope {} is not allowed for client {}",
                denied.raw_value, client.client_id
            )));
        }

        // 3) PKCE
        let code_challenge = optional(parameters, names::CODE_CHALLENGE);
        let mut code_challenge_method = optional(parameters, names::CODE_CHALLENGE_METHOD);
        match &code_challenge {
            None if client.require_pkce => {
                return Err(AuthorizeError::InvalidRequest(
                    "code_challenge is required".into(),
                ));
            }
            None => {}
            Some(challenge) => {
                if !(CODE_CHALLENGE_MIN_LEN..=CODE_CHALLENGE_MAX_LEN).contains(&challenge.len()) {
                    return Err(AuthorizeError::InvalidRequest(
                        "code_challenge has an invalid length".into(),
                    ));
                }
                let method = code_challenge_method.get_or_insert_with(|| "plain".to_string());
                match method.as_str() {
                    "S256" => {}
                    "plain" if client.allow_plain_text_pkce => {}
                    "plain" => {
                        return Err(AuthorizeError::InvalidRequest(
                            "plain code_challenge_method is not allowed".into(),
                        ));
                    }
                    other => {
                        return Err(AuthorizeError::InvalidRequest(format!(
                            "unsupported code_challenge_method {other}"
                        )));
                    }
                }
            }
        }

        // 4) prompt / max_age
        let prompt_modes: Vec<String> = optional(parameters, names::PROMPT)
            .map(|p| p.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        if let Some(unknown) = prompt_modes.iter().find(|p| !PROMPT_MODES.contains(&p.as_str())) {
            return Err(AuthorizeError::InvalidRequest(format!(
                "unsupported prompt mode {unknown}"
            )));
        }
        if prompt_modes.len() > 1 && prompt_modes.iter().any(|p| p == "none") {
            return Err(AuthorizeError::InvalidRequest(
                "prompt=none cannot be combined with other modes".into(),
            ));
        }
        let max_age = match optional(parameters, names::MAX_AGE) {
            Some(v) => Some(
                v.parse::<u64>()
                    .map_err(|_| AuthorizeError::InvalidRequest("invalid max_age".into()))?,
            ),
            None => None,
        };

        // 5) PAR requirement
        if client.require_pushed_authorization && ctx.pushed_request_uri.is_none() && !ctx.pushing
        {
            return Err(AuthorizeError::InvalidRequest(
                "pushed authorization is required for this client".into(),
            ));
        }

        // 6) session
        if prompt_modes.iter().any(|p| p == "none") && ctx.subject.is_none() {
            return Err(AuthorizeError::LoginRequired);
        }

        Ok(AuthorizationRequest {
            client_id: client.client_id.clone(),
            redirect_uri,
            response_type,
            response_mode,
            scopes,
            state: parameters.get(names::STATE).map(str::to_string),
            nonce: optional(parameters, names::NONCE),
            code_challenge,
            code_challenge_method,
            prompt_modes,
            max_age,
            login_hint: optional(parameters, names::LOGIN_HINT),
            ui_locales: optional(parameters, names::UI_LOCALES),
            acr_values: optional(parameters, names::ACR_VALUES)
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            subject: ctx.subject.cloned(),
            pushed_request_uri: ctx.pushed_request_uri.map(str::to_string),
            raw: parameters.clone(),
        })
    }
}

#[async_trait]
impl AuthorizeRequestValidator for BasicAuthorizeRequestValidator {
    async fn validate(
        &self,
        parameters: &AuthorizationParameters,
        ctx: AuthorizeContext<'_>,
    ) -> Result<AuthorizationRequest, AuthorizeValidationError> {
        // 1) shape
        if let Some(name) = SINGLE_VALUED.iter().find(|n| parameters.count(n) > 1) {
            return Err(AuthorizeError::InvalidRequest(format!("{name} is repeated")).into());
        }
        if parameters.contains(names::REQUEST) {
            return Err(AuthorizeError::InvalidRequest("request objects are not supported".into()).into());
        }
        if parameters.contains(names::REQUEST_URI) {
            // Handles are resolved before validation; one left here is nested or foreign.
            return Err(AuthorizeError::InvalidRequest("unexpected request_uri".into()).into());
        }

        // 2) client + redirect_uri: failures here are never redirected.
        let client = self.load_client(parameters).await?;
        let redirect_uri = optional(parameters, names::REDIRECT_URI)
            .ok_or_else(|| AuthorizeError::InvalidRequest("redirect_uri is missing".into()))?;
        if !client.redirect_uris.iter().any(|u| *u == redirect_uri) {
            tracing::warn!(client_id = %client.client_id, redirect_uri = %redirect_uri, "redirect_uri not registered");
            return Err(AuthorizeError::InvalidRequest("redirect_uri is not registered".into()).into());
        }

        // 3) everything else may go back to the client.
        self.validate_protocol(&client, parameters, ctx, redirect_uri.clone())
            .map_err(|error| {
                AuthorizeValidationError::Redirect(RedirectableError {
                    error,
                    redirect_uri,
                    state: parameters.get(names::STATE).map(str::to_string),
                })
            })
    }
}
