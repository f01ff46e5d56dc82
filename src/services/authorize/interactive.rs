//! Redirects to the login and consent pages.
//!
//! The page receives a return URL that resumes the authorize flow at
//! `connect/authorize/callback`. The validated parameters are parked in the
//! message store; the return URL carries only their id.
use crate::services::authorize::request::AuthorizationRequest;
use crate::services::authorize::return_url::{AUTHORIZE_CALLBACK_PATH, is_local_url};
use crate::services::message::{AuthorizationMessageService, MESSAGE_ID_PARAMETER, MessageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractivePage {
    Login,
    Consent,
}

#[derive(Debug, Clone)]
pub struct InteractivePageRedirect {
    login_url: String,
    consent_url: String,
    return_url_parameter: String,
    // e.g. `https://idp.example.com`
    server_origin: String,
    messages: AuthorizationMessageService,
}

impl InteractivePageRedirect {
    pub fn new(
        login_url: impl Into<String>,
        consent_url: impl Into<String>,
        return_url_parameter: impl Into<String>,
        server_origin: impl Into<String>,
        messages: AuthorizationMessageService,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            consent_url: consent_url.into(),
            return_url_parameter: return_url_parameter.into(),
            server_origin: server_origin.into().trim_end_matches('/').to_string(),
            messages,
        }
    }

    /// Which page a validated request has to visit next.
    pub fn page_for(&self, request: &AuthorizationRequest) -> InteractivePage {
        let wants_login = request.prompt_modes.iter().any(|p| p == "login" || p == "select_account");
        if request.subject.is_none() || wants_login {
            InteractivePage::Login
        } else {
            InteractivePage::Consent
        }
    }

    pub async fn build(
        &self,
        page: InteractivePage,
        request: &AuthorizationRequest,
    ) -> Result<String, MessageError> {
        let page_url = match page {
            InteractivePage::Login => &self.login_url,
            InteractivePage::Consent => &self.consent_url,
        };

        let id = self
            .messages
            .write(&request.raw, request.pushed_request_uri.as_deref())
            .await?;
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(MESSAGE_ID_PARAMETER, &id)
            .finish();

        let mut return_url = format!("/{AUTHORIZE_CALLBACK_PATH}?{query}");
        if !is_local_url(page_url) {
            // The page lives elsewhere; it needs an absolute way back.
            return_url = format!("{}{}", self.server_origin, return_url);
        }

        let separator = if page_url.contains('?') { '&' } else { '?' };
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.return_url_parameter, &return_url)
            .finish();
        Ok(format!("{page_url}{separator}{query}"))
    }
}
