//! Shared router context. Clone is cheap (everything inside is `Arc` or small).
use std::{sync::Arc, time::Duration};

use crate::services::auth::dpop::{DpopPolicy, DpopValidator};
use crate::services::auth::replay::ReplayStore;
use crate::services::auth::{SenderConstraint, TokenValidator};
use crate::services::authorize::{
    AuthorizationRequestAssembler, AuthorizeRequestValidator, BasicAuthorizeRequestValidator,
    ClientStore, InteractivePageRedirect, ReturnUrlGuard, ScopeParser,
};
use crate::services::clock::SharedClock;
use crate::services::message::{AuthorizationMessageService, AuthorizationMessageStore};
use crate::services::par::{ParStore, PushedRequestService};
use crate::services::profile::ProfileService;
use crate::services::userinfo::{UserInfoRequestValidator, UserInfoResponseGenerator};

#[derive(Clone)]
pub struct AppState {
    // Origin clients address this server by; used for DPoP `htu` and return URLs.
    pub public_origin: String,
    pub token_validator: Arc<dyn TokenValidator>,
    pub sender: SenderConstraint,
    pub userinfo_validator: UserInfoRequestValidator,
    pub userinfo_response: UserInfoResponseGenerator,
    pub authorize_validator: Arc<dyn AuthorizeRequestValidator>,
    pub pushed: PushedRequestService,
    pub messages: AuthorizationMessageService,
    pub assembler: AuthorizationRequestAssembler,
    pub interactive: InteractivePageRedirect,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("public_origin", &self.public_origin)
            .field("pushed", &self.pushed)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

/// Plain settings, usually taken from `Config`.
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub public_origin: String,
    pub allow_origin_in_return_url: bool,
    pub login_url: String,
    pub consent_url: String,
    pub return_url_parameter: String,
    pub dpop_policy: DpopPolicy,
    pub par_ttl: Duration,
    pub message_ttl: Duration,
    pub store_timeout: Duration,
}

/// Backends and external capabilities.
pub struct StateDeps {
    pub token_validator: Arc<dyn TokenValidator>,
    pub profile: Arc<dyn ProfileService>,
    pub clients: Arc<dyn ClientStore>,
    pub replay_store: Arc<dyn ReplayStore>,
    pub par_store: Arc<dyn ParStore>,
    pub message_store: Arc<dyn AuthorizationMessageStore>,
    pub clock: SharedClock,
}

impl AppState {
    pub fn build(settings: StateSettings, deps: StateDeps) -> Self {
        let scope_parser = ScopeParser::default();

        let dpop = DpopValidator::new(
            settings.dpop_policy,
            deps.replay_store,
            deps.clock.clone(),
            settings.store_timeout,
        );
        let pushed = PushedRequestService::new(
            deps.par_store,
            deps.clock.clone(),
            settings.par_ttl,
            settings.store_timeout,
        );
        let messages = AuthorizationMessageService::new(
            deps.message_store,
            deps.clock,
            settings.message_ttl,
            settings.store_timeout,
        );
        let authorize_validator: Arc<dyn AuthorizeRequestValidator> = Arc::new(
            BasicAuthorizeRequestValidator::new(deps.clients, scope_parser.clone()),
        );

        Self {
            sender: SenderConstraint::new(Arc::new(dpop)),
            userinfo_validator: UserInfoRequestValidator::new(
                deps.token_validator.clone(),
                deps.profile.clone(),
            ),
            userinfo_response: UserInfoResponseGenerator::new(deps.profile, scope_parser),
            assembler: AuthorizationRequestAssembler::new(
                ReturnUrlGuard::new(settings.allow_origin_in_return_url),
                authorize_validator.clone(),
                Some(pushed.clone()),
                messages.clone(),
            ),
            interactive: InteractivePageRedirect::new(
                settings.login_url,
                settings.consent_url,
                settings.return_url_parameter,
                settings.public_origin.clone(),
                messages.clone(),
            ),
            token_validator: deps.token_validator,
            authorize_validator,
            pushed,
            messages,
            public_origin: settings.public_origin,
        }
    }
}
