/*
 * Responsibility
 * - GET /authorization-context の request/response DTO
 * - login/consent page が「何を再開するのか」を知るための表示用の形
 */
use serde::{Deserialize, Serialize};

use crate::services::authorize::AuthorizationRequest;

#[derive(Debug, Deserialize)]
pub struct AuthorizationContextQuery {
    #[serde(rename = "returnUrl")]
    pub return_url: String,
}

#[derive(Debug, Serialize)]
pub struct AuthorizationContextResponse {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prompt: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locales: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub acr_values: Vec<String>,
    pub pushed: bool,
}

impl From<AuthorizationRequest> for AuthorizationContextResponse {
    fn from(req: AuthorizationRequest) -> Self {
        Self {
            scopes: req.scope_values().map(str::to_string).collect(),
            pushed: req.pushed_request_uri.is_some(),
            client_id: req.client_id,
            redirect_uri: req.redirect_uri,
            response_type: req.response_type,
            state: req.state,
            prompt: req.prompt_modes,
            login_hint: req.login_hint,
            ui_locales: req.ui_locales,
            acr_values: req.acr_values,
        }
    }
}
