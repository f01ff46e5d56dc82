use crate::services::authorize::parameters::AuthorizationParameters;
use crate::services::authorize::scope::ParsedScope;
use crate::services::claims::Principal;

/// A validated authorize request. Never persisted: always rebuilt from raw
/// parameters by `AuthorizeRequestValidator`.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub response_mode: Option<String>,
    pub scopes: Vec<ParsedScope>,
    pub state: Option<String>,
    pub nonce: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
    pub prompt_modes: Vec<String>,
    pub max_age: Option<u64>,
    pub login_hint: Option<String>,
    pub ui_locales: Option<String>,
    pub acr_values: Vec<String>,
    // Subject of the interactive session, if there is one.
    pub subject: Option<Principal>,
    // Handle the parameters were read from, when resumed through PAR.
    pub pushed_request_uri: Option<String>,
    pub raw: AuthorizationParameters,
}

impl AuthorizationRequest {
    pub fn scope_values(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(|s| s.raw_value.as_str())
    }

    pub fn has_scope(&self, parsed_name: &str) -> bool {
        self.scopes.iter().any(|s| s.parsed_name == parsed_name)
    }
}
