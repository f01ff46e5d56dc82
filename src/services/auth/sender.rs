//! Authorization scheme selection (Bearer vs DPoP) and sender-constraint checks.
//!
//! Rules:
//! - `Authorization: Bearer <token>`: the token must not carry `cnf`.
//! - `Authorization: DPoP <token>` + exactly one `DPoP` header: the token must
//!   carry `cnf.jkt` and the proof must be bound to it (`ath` + thumbprint).
use axum::http::{HeaderMap, header};
use std::sync::Arc;

use crate::services::auth::access_jwt::{TokenValidationError, TokenValidationResult};
use crate::services::auth::dpop::core::ALLOWED_PROOF_ALGS;
use crate::services::auth::dpop::{
    BoundAccessToken, DpopError, DpopErrorKind, DpopValidator, VerifiedDpop,
};

pub const DPOP_HEADER: &str = "dpop";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Dpop,
}

impl AuthScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "Bearer",
            Self::Dpop => "DPoP",
        }
    }
}

/// Credentials as they arrived on the wire, before any validation.
#[derive(Clone)]
pub struct PresentedToken {
    pub scheme: AuthScheme,
    pub token: String,
    pub proof: Option<String>,
}

impl std::fmt::Debug for PresentedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Tokens and proofs are credentials
        f.debug_struct("PresentedToken")
            .field("scheme", &self.scheme)
            .field("has_proof", &self.proof.is_some())
            .finish_non_exhaustive()
    }
}

impl PresentedToken {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, SenderError> {
        let mut auth_values = headers.get_all(header::AUTHORIZATION).iter();
        let auth = match (auth_values.next(), auth_values.next()) {
            (None, _) => return Err(SenderError::MissingToken),
            (Some(v), None) => v.to_str().map_err(|_| SenderError::MalformedAuthorization)?,
            (Some(_), Some(_)) => return Err(SenderError::MalformedAuthorization),
        };

        let (scheme, token) = auth
            .trim()
            .split_once(' ')
            .ok_or(SenderError::MalformedAuthorization)?;
        let token = token.trim();
        if token.is_empty() || token.contains(char::is_whitespace) {
            return Err(SenderError::MalformedAuthorization);
        }

        let scheme = if scheme.eq_ignore_ascii_case("bearer") {
            AuthScheme::Bearer
        } else if scheme.eq_ignore_ascii_case("dpop") {
            AuthScheme::Dpop
        } else {
            return Err(SenderError::MalformedAuthorization);
        };

        let mut proofs = headers.get_all(DPOP_HEADER).iter();
        let proof = match (proofs.next(), proofs.next()) {
            (None, _) => None,
            (Some(v), None) => Some(
                v.to_str()
                    .map_err(|_| DpopError::InvalidJwt("header"))?
                    .to_string(),
            ),
            (Some(_), Some(_)) => return Err(DpopError::MultipleProofs.into()),
        };

        if scheme == AuthScheme::Dpop && proof.is_none() {
            return Err(DpopError::MissingProof.into());
        }

        Ok(Self {
            scheme,
            token: token.to_string(),
            proof,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SenderError {
    #[error("no access token presented")]
    MissingToken,
    #[error("malformed Authorization header")]
    MalformedAuthorization,
    #[error(transparent)]
    Token(#[from] TokenValidationError),
    #[error("sender-constrained token presented with the Bearer scheme")]
    ConfirmationOnBearer,
    #[error("token has no cnf.jkt")]
    TokenNotBound,
    #[error(transparent)]
    Proof(#[from] DpopError),
}

impl SenderError {
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::Proof(e) if e.kind() == DpopErrorKind::StorageUnavailable)
    }

    /// `WWW-Authenticate` values for a 401 carrying this error.
    pub fn challenges(&self) -> Vec<String> {
        match self {
            Self::MissingToken => challenges(None, None),
            Self::MalformedAuthorization => {
                challenges(Some("invalid_request"), Some("invalid_request"))
            }
            Self::Token(e) => challenges(Some(e.code.as_str()), Some(e.code.as_str())),
            Self::ConfirmationOnBearer | Self::TokenNotBound => {
                challenges(Some("invalid_token"), None)
            }
            Self::Proof(e) => match e.kind() {
                DpopErrorKind::TokenNotBound => challenges(Some("invalid_token"), None),
                _ => challenges(Some("invalid_dpop_proof"), None),
            },
        }
    }

    /// Coarse code for the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedAuthorization => "invalid_request",
            Self::Proof(e) if e.kind() != DpopErrorKind::TokenNotBound => "invalid_dpop_proof",
            _ => "invalid_token",
        }
    }
}

/// Build the challenge pair: DPoP (with accepted algs) first, then Bearer.
pub fn challenges(dpop_error: Option<&str>, bearer_error: Option<&str>) -> Vec<String> {
    let algs = ALLOWED_PROOF_ALGS
        .iter()
        .map(|a| format!("{a:?}"))
        .collect::<Vec<_>>()
        .join(" ");

    let dpop = match dpop_error {
        Some(e) => format!("DPoP error=\"{e}\", algs=\"{algs}\""),
        None => format!("DPoP algs=\"{algs}\""),
    };
    let bearer = match bearer_error {
        Some(e) => format!("Bearer error=\"{e}\""),
        None => "Bearer".to_string(),
    };
    vec![dpop, bearer]
}

/// Enforces the scheme rules against an already validated access token.
#[derive(Clone, Debug)]
pub struct SenderConstraint {
    dpop: Arc<DpopValidator>,
}

impl SenderConstraint {
    pub fn new(dpop: Arc<DpopValidator>) -> Self {
        Self { dpop }
    }

    /// - `http_url`: absolute request URL (see `dpop::core::expected_htu`).
    ///
    /// Returns the verified proof for the DPoP scheme, `None` for Bearer.
    pub async fn enforce(
        &self,
        presented: &PresentedToken,
        token: &TokenValidationResult,
        http_method: &str,
        http_url: &str,
    ) -> Result<Option<VerifiedDpop>, SenderError> {
        match presented.scheme {
            AuthScheme::Bearer => {
                if token.has_confirmation {
                    tracing::warn!(
                        client_id = ?token.client_id,
                        "token with cnf presented on the Bearer scheme"
                    );
                    return Err(SenderError::ConfirmationOnBearer);
                }
                Ok(None)
            }
            AuthScheme::Dpop => {
                let cnf_jkt = token.cnf_jkt.as_deref().ok_or_else(|| {
                    tracing::warn!(
                        client_id = ?token.client_id,
                        "DPoP scheme used with a token lacking cnf.jkt"
                    );
                    SenderError::TokenNotBound
                })?;
                let proof = presented.proof.as_deref().ok_or(DpopError::MissingProof)?;

                let verified = self
                    .dpop
                    .validate(
                        proof,
                        http_method,
                        http_url,
                        Some(BoundAccessToken {
                            token: &presented.token,
                            cnf_jkt: Some(cnf_jkt),
                        }),
                    )
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(error = %e, kind = ?e.kind(), "DPoP proof rejected");
                    })?;

                Ok(Some(verified))
            }
        }
    }
}
