//! Access-token validation.
//!
//! `TokenValidator` is the seam the UserInfo pipeline and the resource
//! middleware depend on. `JwtAccessTokenValidator` is the EdDSA JWT
//! implementation used by the binary.
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::fmt;

use crate::services::claims::{Claims, claim_types};

/// Error codes for protected-resource responses (RFC 6750 §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedResourceError {
    InvalidRequest,
    InvalidToken,
    InsufficientScope,
}

impl ProtectedResourceError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidToken => "invalid_token",
            Self::InsufficientScope => "insufficient_scope",
        }
    }
}

impl fmt::Display for ProtectedResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected token. `code` is what the caller sees, `reason` is for logs only.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {reason}")]
pub struct TokenValidationError {
    pub code: ProtectedResourceError,
    pub reason: String,
}

impl TokenValidationError {
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self {
            code: ProtectedResourceError::InvalidToken,
            reason: reason.into(),
        }
    }
}

/// Outcome of a successful access-token validation.
#[derive(Debug, Clone)]
pub struct TokenValidationResult {
    // Every claim in the token, protocol claims included.
    pub claims: Claims,
    pub client_id: Option<String>,
    pub scopes: Vec<String>,
    // `cnf.jkt`; its presence makes the token sender-constrained.
    pub cnf_jkt: Option<String>,
    pub has_confirmation: bool,
    pub jti: Option<String>,
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Validate `token`; when `expected_scope` is set the token must grant it.
    async fn validate_access_token(
        &self,
        token: &str,
        expected_scope: Option<&str>,
    ) -> Result<TokenValidationResult, TokenValidationError>;
}

fn aud_is_present_and_valid(aud: Option<&serde_json::Value>) -> bool {
    match aud {
        Some(serde_json::Value::String(s)) => !s.trim().is_empty(),
        Some(serde_json::Value::Array(arr)) => arr.iter().any(|v| match v {
            serde_json::Value::String(s) => !s.trim().is_empty(),
            _ => false,
        }),
        _ => false,
    }
}

fn scopes_of(payload: &serde_json::Map<String, serde_json::Value>) -> Vec<String> {
    match payload.get(claim_types::SCOPE) {
        // Space-delimited string (RFC 9068) ...
        Some(serde_json::Value::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        // ... or a JSON array, as some issuers emit.
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// EdDSA (Ed25519) JWT access-token validator.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct JwtAccessTokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    // Accepted JOSE `typ` values (case-insensitive). Empty accepts any.
    allowed_types: Vec<String>,
}

impl fmt::Debug for JwtAccessTokenValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtAccessTokenValidator")
            .field("validation", &self.validation)
            .field("allowed_types", &self.allowed_types)
            .finish()
    }
}

impl JwtAccessTokenValidator {
    pub fn new(
        access_public_key_pem: &str,
        issuer: &str,
        audience: &str,
        leeway_seconds: u64,
        allowed_types: Vec<String>,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        let decoding_key = DecodingKey::from_ed_pem(access_public_key_pem.as_bytes())?;
        Ok(Self::from_decoding_key(
            decoding_key,
            issuer,
            audience,
            leeway_seconds,
            allowed_types,
        ))
    }

    pub fn from_decoding_key(
        decoding_key: DecodingKey,
        issuer: &str,
        audience: &str,
        leeway_seconds: u64,
        allowed_types: Vec<String>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = leeway_seconds;
        validation.validate_nbf = true;

        Self {
            decoding_key,
            validation,
            allowed_types,
        }
    }

    /// Verify signature + `iss`/`aud`/`exp`/`nbf`, then the strict claim checks
    /// `jsonwebtoken` does not do: non-empty `iss`/`aud`, meaningful `exp`, `typ`.
    fn verify_strict(
        &self,
        token: &str,
    ) -> Result<serde_json::Map<String, serde_json::Value>, TokenValidationError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| TokenValidationError::invalid_token(format!("header: {e}")))?;

        if !self.allowed_types.is_empty() {
            let typ_ok = header
                .typ
                .as_deref()
                .is_some_and(|t| self.allowed_types.iter().any(|a| a.eq_ignore_ascii_case(t)));
            if !typ_ok {
                return Err(TokenValidationError::invalid_token(format!(
                    "unexpected typ {:?}",
                    header.typ
                )));
            }
        }

        let data = jsonwebtoken::decode::<serde_json::Map<String, serde_json::Value>>(
            token,
            &self.decoding_key,
            &self.validation,
        )
        .map_err(|e| TokenValidationError::invalid_token(format!("jwt verification failed: {e}")))?;
        let payload = data.claims;

        let iss = payload.get("iss").and_then(|v| v.as_str()).unwrap_or("");
        if iss.trim().is_empty() {
            return Err(TokenValidationError::invalid_token("empty 'iss' claim"));
        }
        match payload.get("exp").and_then(|v| v.as_u64()) {
            Some(exp) if exp > 0 => {}
            _ => return Err(TokenValidationError::invalid_token("empty 'exp' claim")),
        }
        if !aud_is_present_and_valid(payload.get("aud")) {
            return Err(TokenValidationError::invalid_token(
                "missing or invalid 'aud' claim",
            ));
        }
        if let Some(sub) = payload.get(claim_types::SUBJECT)
            && sub.as_str().is_none_or(|s| s.trim().is_empty())
        {
            return Err(TokenValidationError::invalid_token("empty 'sub' claim"));
        }

        Ok(payload)
    }
}

#[async_trait]
impl TokenValidator for JwtAccessTokenValidator {
    async fn validate_access_token(
        &self,
        token: &str,
        expected_scope: Option<&str>,
    ) -> Result<TokenValidationResult, TokenValidationError> {
        let payload = self.verify_strict(token)?;

        let scopes = scopes_of(&payload);
        if let Some(expected) = expected_scope
            && !scopes.iter().any(|s| s == expected)
        {
            // Surfaced as invalid_token: callers must not learn which check failed.
            return Err(TokenValidationError::invalid_token(format!(
                "missing required scope '{expected}'"
            )));
        }

        let cnf = payload.get(claim_types::CONFIRMATION);
        let cnf_jkt = cnf
            .and_then(|c| c.get("jkt"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(TokenValidationResult {
            claims: Claims::from_json_object(&payload),
            client_id: payload
                .get(claim_types::CLIENT_ID)
                .and_then(|v| v.as_str())
                .map(str::to_string),
            scopes,
            cnf_jkt,
            has_confirmation: cnf.is_some_and(|c| !c.is_null()),
            jti: payload.get("jti").and_then(|v| v.as_str()).map(str::to_string),
        })
    }
}
