#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::Router;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use jsonwebtoken::DecodingKey;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use oidc_core::app::build_router;
use oidc_core::services::auth::JwtAccessTokenValidator;
use oidc_core::services::auth::dpop::thumbprint::compute_ath;
use oidc_core::services::auth::dpop::{DpopPolicy, DpopValidator};
use oidc_core::services::auth::replay::InMemoryReplayCache;
use oidc_core::services::authorize::InMemoryClientStore;
use oidc_core::services::clock::{ManualClock, SharedClock};
use oidc_core::services::message::InMemoryMessageStore;
use oidc_core::services::par::{
    InMemoryParStore, ParStore, ParStoreError, PushedAuthorizationRequest, PushedRequestService,
};
use oidc_core::services::profile::{
    DirectoryProfileService, InMemoryUserDirectory, TransactionClaimProfileService,
};
use oidc_core::state::{AppState, StateDeps, StateSettings};

pub const ISSUER: &str = "https://idp.example.com";
pub const AUDIENCE: &str = "resource-api";
pub const ORIGIN: &str = "https://idp.example.com";
pub const CLIENT_ID: &str = "web";
pub const REDIRECT_URI: &str = "https://app.example/cb";
// RFC 7636 appendix B
pub const CODE_CHALLENGE: &str = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
pub const T0: i64 = 1_700_000_000;

pub const CLIENTS_JSON: &str = r#"[
    {
        "client_id": "web",
        "redirect_uris": ["https://app.example/cb"],
        "allowed_scopes": ["openid", "profile", "email", "transaction"]
    },
    {
        "client_id": "par-only",
        "redirect_uris": ["https://par.example/cb"],
        "allowed_scopes": ["openid"],
        "require_pushed_authorization": true
    }
]"#;

pub const USERS_JSON: &str = r#"[
    {
        "subject_id": "alice",
        "claims": {
            "name": "Alice Example",
            "email": "alice@example.com",
            "email_verified": true,
            "phone_number": "+1 555 0100"
        }
    },
    { "subject_id": "bob", "active": false, "claims": { "name": "Bob" } }
]"#;

pub fn manual_clock() -> ManualClock {
    ManualClock::new(DateTime::<Utc>::from_timestamp(T0, 0).unwrap())
}

/// Compact JWS signed with Ed25519 (`alg: EdDSA`).
pub fn sign_compact(key: &SigningKey, header: &Value, claims: &Value) -> String {
    let h = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header).unwrap());
    let c = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    let signing_input = format!("{h}.{c}");
    let signature = key.sign(signing_input.as_bytes());
    format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

/// Client-side proof key.
pub struct ProofKey {
    signing: SigningKey,
}

impl ProofKey {
    pub fn new(seed: u8) -> Self {
        Self {
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn x(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.signing.verifying_key().to_bytes())
    }

    pub fn public_jwk(&self) -> Value {
        json!({ "kty": "OKP", "crv": "Ed25519", "x": self.x() })
    }

    /// RFC 7638 thumbprint of the public key.
    pub fn jkt(&self) -> String {
        let canonical = format!(r#"{{"crv":"Ed25519","kty":"OKP","x":"{}"}}"#, self.x());
        URL_SAFE_NO_PAD.encode(Sha256::digest(canonical.as_bytes()))
    }

    pub fn proof(&self, claims: Value) -> String {
        self.proof_with_header(
            json!({ "typ": "dpop+jwt", "alg": "EdDSA", "jwk": self.public_jwk() }),
            claims,
        )
    }

    pub fn proof_with_header(&self, header: Value, claims: Value) -> String {
        sign_compact(&self.signing, &header, &claims)
    }

    /// A well-formed proof for `htm htu` issued at `iat`, bound to `access_token` if given.
    pub fn proof_for(
        &self,
        htm: &str,
        htu: &str,
        iat: i64,
        jti: &str,
        access_token: Option<&str>,
    ) -> String {
        let mut claims = json!({ "htm": htm, "htu": htu, "iat": iat, "jti": jti });
        if let Some(token) = access_token {
            claims["ath"] = json!(compute_ath(token));
        }
        self.proof(claims)
    }
}

/// Authorization-server side: signs access tokens, hands out the matching validator.
pub struct TokenIssuer {
    signing: SigningKey,
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self {
            signing: SigningKey::from_bytes(&[42; 32]),
        }
    }

    pub fn validator(&self) -> JwtAccessTokenValidator {
        let x = URL_SAFE_NO_PAD.encode(self.signing.verifying_key().to_bytes());
        let key = DecodingKey::from_ed_components(&x).unwrap();
        JwtAccessTokenValidator::from_decoding_key(key, ISSUER, AUDIENCE, 0, vec!["at+jwt".into()])
    }

    pub fn sign(&self, claims: Value) -> String {
        sign_compact(
            &self.signing,
            &json!({ "typ": "at+jwt", "alg": "EdDSA" }),
            &claims,
        )
    }

    /// Access token for `sub` valid for ten minutes of wall-clock time.
    pub fn access_token(&self, sub: &str, scope: &str, cnf_jkt: Option<&str>) -> String {
        let now = Utc::now().timestamp();
        let mut claims = json!({
            "iss": ISSUER,
            "aud": AUDIENCE,
            "sub": sub,
            "client_id": CLIENT_ID,
            "scope": scope,
            "iat": now,
            "exp": now + 600,
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(jkt) = cnf_jkt {
            claims["cnf"] = json!({ "jkt": jkt });
        }
        self.sign(claims)
    }
}

pub fn replay_cache(clock: &ManualClock, capacity: usize) -> Arc<InMemoryReplayCache> {
    Arc::new(InMemoryReplayCache::new(capacity, Arc::new(clock.clone())))
}

pub fn dpop_validator(clock: &ManualClock) -> (DpopValidator, Arc<InMemoryReplayCache>) {
    let cache = replay_cache(clock, 1024);
    let validator = DpopValidator::new(
        DpopPolicy::default(),
        cache.clone(),
        Arc::new(clock.clone()),
        Duration::from_secs(1),
    );
    (validator, cache)
}

pub fn pushed_service(clock: &ManualClock) -> (PushedRequestService, Arc<InMemoryParStore>) {
    let store = Arc::new(InMemoryParStore::new());
    let shared: SharedClock = Arc::new(clock.clone());
    let service = PushedRequestService::new(
        store.clone(),
        shared,
        Duration::from_secs(60),
        Duration::from_secs(1),
    );
    (service, store)
}

/// A full application over in-memory backends and a manual clock.
pub struct TestApp {
    pub state: AppState,
    pub clock: ManualClock,
    pub issuer: TokenIssuer,
    pub directory: Arc<InMemoryUserDirectory>,
    pub replay: Arc<InMemoryReplayCache>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_par_store(Arc::new(InMemoryParStore::new()))
    }

    pub fn with_par_store(par_store: Arc<dyn ParStore>) -> Self {
        let clock = manual_clock();
        let issuer = TokenIssuer::new();
        let directory = Arc::new(InMemoryUserDirectory::from_json_str(USERS_JSON).unwrap());
        let replay = replay_cache(&clock, 1024);

        let settings = StateSettings {
            public_origin: ORIGIN.to_string(),
            allow_origin_in_return_url: false,
            login_url: "/account/login".into(),
            consent_url: "/consent".into(),
            return_url_parameter: "returnUrl".into(),
            dpop_policy: DpopPolicy::default(),
            par_ttl: Duration::from_secs(60),
            message_ttl: Duration::from_secs(600),
            store_timeout: Duration::from_millis(200),
        };
        let deps = StateDeps {
            token_validator: Arc::new(issuer.validator()),
            profile: Arc::new(TransactionClaimProfileService::new(
                DirectoryProfileService::new(directory.clone()),
            )),
            clients: Arc::new(InMemoryClientStore::from_json_str(CLIENTS_JSON).unwrap()),
            replay_store: replay.clone(),
            par_store,
            message_store: Arc::new(InMemoryMessageStore::new()),
            clock: Arc::new(clock.clone()),
        };

        Self {
            state: AppState::build(settings, deps),
            clock,
            issuer,
            directory,
            replay,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn now(&self) -> i64 {
        use oidc_core::services::clock::Clock;
        self.clock.now().timestamp()
    }
}

/// PAR backend that never answers in time.
pub struct StalledStore;

#[async_trait]
impl ParStore for StalledStore {
    fn backend_name(&self) -> &'static str {
        "stalled"
    }

    async fn store(
        &self,
        _request: &PushedAuthorizationRequest,
        _now: DateTime<Utc>,
    ) -> Result<(), ParStoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(())
    }

    async fn consume(
        &self,
        _request_uri: &str,
        _now: DateTime<Utc>,
    ) -> Result<Option<PushedAuthorizationRequest>, ParStoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(None)
    }

    async fn sweep(&self, _now: DateTime<Utc>) -> Result<u64, ParStoreError> {
        Ok(0)
    }
}

/// Query string of a complete, valid authorize request for the `web` client.
pub fn authorize_query(extra: &[(&str, &str)]) -> String {
    let mut s = url::form_urlencoded::Serializer::new(String::new());
    s.append_pair("client_id", CLIENT_ID)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", "openid profile")
        .append_pair("state", "xyz")
        .append_pair("code_challenge", CODE_CHALLENGE)
        .append_pair("code_challenge_method", "S256");
    for (k, v) in extra {
        s.append_pair(k, v);
    }
    s.finish()
}
