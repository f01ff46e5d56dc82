//! DPoP proof validation (RFC 9449).
//!
//! `DpopValidator::validate` runs the checks in a fixed order:
//! structure → signature → htm/htu → iat window → replay → token binding.
//! The replay check runs only after the signature is verified, so unverified
//! input never creates a replay-cache entry.
//!
//! This module does not know about Axum extractors; the scheme-selection layer
//! (`services::auth::sender`) decides when a proof is required.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind, jwk::Jwk};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::services::auth::dpop::thumbprint::{compute_ath, compute_jwk_thumbprint};
use crate::services::auth::dpop::types::{BoundAccessToken, VerifiedDpop};
use crate::services::auth::replay::{ReplayError, ReplayStore};
use crate::services::clock::SharedClock;

/// Signature algorithms accepted for proofs. Symmetric algorithms are never
/// acceptable: the verifier would hold the same secret as the client.
pub const ALLOWED_PROOF_ALGS: &[Algorithm] = &[
    Algorithm::EdDSA,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
];

const MAX_JTI_LEN: usize = 512;

/// JWK members that only exist on private keys.
const PRIVATE_JWK_MEMBERS: &[&str] = &["d", "p", "q", "dp", "dq", "qi", "oth", "k"];

/// Freshness knobs.
///
/// The window is tunable; `replay_ttl_seconds` is derived from it so a replay
/// entry always outlives the period in which the same proof would still pass
/// the `iat` check.
#[derive(Debug, Clone, Copy)]
pub struct DpopPolicy {
    // Allowed iat drift into the future (clock skew), seconds.
    pub iat_leeway_seconds: i64,
    // Maximum acceptable age of the proof (now - iat), seconds.
    pub max_age_seconds: i64,
    // If true, the proof must carry a `nonce` claim.
    pub require_nonce: bool,
}

impl Default for DpopPolicy {
    fn default() -> Self {
        Self {
            iat_leeway_seconds: 5,
            max_age_seconds: 60,
            require_nonce: false,
        }
    }
}

impl DpopPolicy {
    /// A proof issued at `now + leeway` passes until `now + max_age + 2 * leeway`.
    pub fn replay_ttl_seconds(&self) -> u64 {
        let ttl = self
            .max_age_seconds
            .saturating_add(self.iat_leeway_seconds.saturating_mul(2));
        ttl.max(1) as u64
    }
}

/// Coarse classification of a proof failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DpopErrorKind {
    InvalidProof,
    BadSignature,
    MethodUrlMismatch,
    ClockSkew,
    ReplayDetected,
    TokenNotBound,
    StorageUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum DpopError {
    #[error("missing DPoP header")]
    MissingProof,
    #[error("more than one DPoP header")]
    MultipleProofs,
    #[error("invalid DPoP proof jwt: {0}")]
    InvalidJwt(&'static str),
    #[error("invalid DPoP typ")]
    InvalidTyp,
    #[error("unsupported DPoP alg: {0:?}")]
    UnsupportedAlg(Algorithm),
    #[error("missing jwk in DPoP header")]
    MissingJwk,
    #[error("DPoP jwk carries private key material")]
    PrivateKeyInJwk,
    #[error("unsupported jwk for DPoP")]
    UnsupportedJwk,
    #[error("invalid DPoP proof signature")]
    BadSignature,
    #[error("missing required claim: {0}")]
    MissingClaim(&'static str),
    #[error("jti too long")]
    JtiTooLong,
    #[error("htm mismatch")]
    MethodMismatch,
    #[error("htu mismatch")]
    UriMismatch,
    #[error("iat outside freshness window")]
    ClockSkew,
    #[error("nonce required")]
    NonceRequired,
    #[error("DPoP proof replayed")]
    ReplayDetected,
    #[error("ath mismatch")]
    AthMismatch,
    #[error("proof key does not match cnf.jkt")]
    TokenNotBound,
    #[error("replay store unavailable: {0}")]
    ReplayStore(#[from] ReplayError),
}

impl DpopError {
    pub fn kind(&self) -> DpopErrorKind {
        match self {
            DpopError::BadSignature => DpopErrorKind::BadSignature,
            DpopError::MethodMismatch | DpopError::UriMismatch => DpopErrorKind::MethodUrlMismatch,
            DpopError::ClockSkew => DpopErrorKind::ClockSkew,
            DpopError::ReplayDetected => DpopErrorKind::ReplayDetected,
            DpopError::AthMismatch | DpopError::TokenNotBound | DpopError::MissingClaim("ath") => {
                DpopErrorKind::TokenNotBound
            }
            DpopError::ReplayStore(_) => DpopErrorKind::StorageUnavailable,
            _ => DpopErrorKind::InvalidProof,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DpopClaims {
    // HTTP method
    htm: Option<String>,
    // HTTP URI
    htu: Option<String>,
    // issued-at (seconds since epoch)
    iat: Option<i64>,
    // unique identifier
    jti: Option<String>,
    // Access token hash (base64url(SHA-256(access_token)))
    ath: Option<String>,
    // Server-provided nonce
    nonce: Option<String>,
}

pub struct DpopValidator {
    policy: DpopPolicy,
    replay_store: Arc<dyn ReplayStore>,
    clock: SharedClock,
    store_timeout: Duration,
}

impl std::fmt::Debug for DpopValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DpopValidator")
            .field("policy", &self.policy)
            .field("store_timeout", &self.store_timeout)
            .finish()
    }
}

impl DpopValidator {
    pub fn new(
        policy: DpopPolicy,
        replay_store: Arc<dyn ReplayStore>,
        clock: SharedClock,
        store_timeout: Duration,
    ) -> Self {
        Self {
            policy,
            replay_store,
            clock,
            store_timeout,
        }
    }

    pub fn policy(&self) -> DpopPolicy {
        self.policy
    }

    /// Validate a DPoP proof for the request `http_method http_url`.
    ///
    /// - `http_url`: the absolute request URL as the server sees it; query and
    ///   fragment are ignored on both sides.
    /// - `bound`: the access token presented with the proof, if any. When
    ///   present, `ath` is required and the proof key must match `cnf.jkt`.
    pub async fn validate(
        &self,
        proof: &str,
        http_method: &str,
        http_url: &str,
        bound: Option<BoundAccessToken<'_>>,
    ) -> Result<VerifiedDpop, DpopError> {
        // 1) Structure: header, typ, alg, embedded public key.
        let header = jsonwebtoken::decode_header(proof).map_err(|e| {
            debug!(error = ?e, "invalid DPoP header");
            DpopError::InvalidJwt("header")
        })?;

        match header.typ.as_deref() {
            Some(typ) if typ.eq_ignore_ascii_case("dpop+jwt") => {}
            _ => return Err(DpopError::InvalidTyp),
        }

        if !ALLOWED_PROOF_ALGS.contains(&header.alg) {
            return Err(DpopError::UnsupportedAlg(header.alg));
        }

        reject_private_jwk(proof)?;

        let jwk: Jwk = header.jwk.ok_or(DpopError::MissingJwk)?;
        let decoding_key = DecodingKey::from_jwk(&jwk).map_err(|e| {
            debug!(error = ?e, "invalid DPoP jwk");
            DpopError::UnsupportedJwk
        })?;

        // 2) Signature, using the key that travels with the proof.
        let mut validation = Validation::new(header.alg);
        // A proof is not an access token: no exp/aud/iss, freshness comes from iat.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<DpopClaims>(proof, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => DpopError::BadSignature,
                ErrorKind::InvalidAlgorithm => DpopError::UnsupportedJwk,
                _ => {
                    debug!(error = ?e, "undecodable DPoP proof");
                    DpopError::InvalidJwt("payload")
                }
            }
        })?;
        let claims = token_data.claims;

        let htm = claims.htm.ok_or(DpopError::MissingClaim("htm"))?;
        let htu = claims.htu.ok_or(DpopError::MissingClaim("htu"))?;
        let iat = claims.iat.ok_or(DpopError::MissingClaim("iat"))?;
        let jti = claims.jti.ok_or(DpopError::MissingClaim("jti"))?;
        if jti.is_empty() {
            return Err(DpopError::MissingClaim("jti"));
        }
        if jti.len() > MAX_JTI_LEN {
            return Err(DpopError::JtiTooLong);
        }

        // 3) htm / htu
        if !htm.eq_ignore_ascii_case(http_method) {
            return Err(DpopError::MethodMismatch);
        }
        let expected_htu = normalize_htu(http_url).ok_or(DpopError::UriMismatch)?;
        let actual_htu = normalize_htu(&htu).ok_or(DpopError::UriMismatch)?;
        if actual_htu != expected_htu {
            debug!(htu = %actual_htu, expected = %expected_htu, "DPoP htu mismatch");
            return Err(DpopError::UriMismatch);
        }

        // 4) iat window
        let now = self.clock.now().timestamp();
        let leeway = self.policy.iat_leeway_seconds;
        // iat is attacker-controlled: compare against bounds, never subtract it.
        let newest = now.saturating_add(leeway);
        let oldest = now.saturating_sub(self.policy.max_age_seconds.saturating_add(leeway));
        if iat > newest || iat < oldest {
            return Err(DpopError::ClockSkew);
        }

        if self.policy.require_nonce && claims.nonce.is_none() {
            return Err(DpopError::NonceRequired);
        }

        // 5) replay
        let replay_key = replay_key(&jti, &htm, &actual_htu);
        let ttl = self.policy.replay_ttl_seconds();
        let first_time = tokio::time::timeout(
            self.store_timeout,
            self.replay_store.check_and_store(&replay_key, ttl),
        )
        .await
        .map_err(|_| ReplayError::Timeout)??;

        if !first_time {
            warn!(jti = %jti, htm = %htm, htu = %actual_htu, "DPoP replay detected");
            return Err(DpopError::ReplayDetected);
        }

        // 6) token binding
        let jkt = compute_jwk_thumbprint(&jwk)?;
        if let Some(bound) = bound {
            let ath = claims.ath.as_deref().ok_or(DpopError::MissingClaim("ath"))?;
            if ath != compute_ath(bound.token) {
                return Err(DpopError::AthMismatch);
            }
            match bound.cnf_jkt {
                Some(expected) if expected == jkt => {}
                _ => return Err(DpopError::TokenNotBound),
            }
        }

        Ok(VerifiedDpop {
            jti,
            iat,
            htm,
            htu: actual_htu,
            jkt,
            nonce: claims.nonce,
        })
    }
}

/// `jsonwebtoken::jwk::Jwk` drops unknown members, so private parameters
/// have to be looked for in the raw header.
fn reject_private_jwk(proof: &str) -> Result<(), DpopError> {
    let header_b64 = proof.split('.').next().ok_or(DpopError::InvalidJwt("header"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| DpopError::InvalidJwt("header"))?;
    let header: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| DpopError::InvalidJwt("header"))?;

    if let Some(jwk) = header.get("jwk").and_then(|j| j.as_object())
        && PRIVATE_JWK_MEMBERS.iter().any(|m| jwk.contains_key(*m))
    {
        return Err(DpopError::PrivateKeyInJwk);
    }
    Ok(())
}

/// Identity of a proof for replay purposes: (jti, method, url).
fn replay_key(jti: &str, htm: &str, normalized_htu: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(jti.as_bytes());
    hasher.update(b"\n");
    hasher.update(htm.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized_htu.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Normalization used only for equality comparison.
/// - lower scheme/host
/// - drop default ports
/// - drop query and fragment
pub fn normalize_htu(htu: &str) -> Option<String> {
    let url = url::Url::parse(htu).ok()?;
    let scheme = url.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    // `Url::port` is already `None` for the scheme's default port.
    let mut out = format!("{}://{}", scheme, host);
    if let Some(port) = url.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(url.path());
    Some(out)
}

/// Build the absolute URL the client is expected to have signed.
///
/// Prefers the configured public origin (deterministic behind proxies); falls
/// back to forwarded headers.
pub fn expected_htu(
    headers: &axum::http::HeaderMap,
    uri: &axum::http::Uri,
    public_origin: Option<&str>,
) -> String {
    if let Some(base) = public_origin {
        if let Ok(mut url) = url::Url::parse(base) {
            url.set_path(uri.path());
            url.set_query(None);
            return url.to_string();
        }
        warn!(public_origin = %base, "PUBLIC_ORIGIN is not a valid URL; using forwarded headers");
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(axum::http::header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{}://{}{}", scheme, host, uri.path())
}
