//! Validates the access token presented to the UserInfo endpoint.
//!
//! 1) token is valid and grants `openid`
//! 2) exactly one `sub`
//! 3) protocol claims are stripped from the working principal
//! 4) subject is still active
use std::sync::Arc;

use crate::services::auth::access_jwt::{
    ProtectedResourceError, TokenValidationError, TokenValidationResult, TokenValidator,
};
use crate::services::claims::{Principal, claim_types};
use crate::services::profile::{ProfileCaller, ProfileError, ProfileService};

pub const OPENID_SCOPE: &str = "openid";

#[derive(Debug, thiserror::Error)]
pub enum UserInfoError {
    #[error(transparent)]
    Token(#[from] TokenValidationError),
    #[error("token does not carry exactly one sub claim")]
    MissingSubject,
    #[error("subject is not active: {subject}")]
    InactiveSubject { subject: String },
    #[error("profile returned sub {returned} for subject {expected}")]
    SubjectMismatch { expected: String, returned: String },
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl UserInfoError {
    /// Caller-visible error code. Every token problem collapses to the
    /// validator's code or `invalid_token`.
    pub fn code(&self) -> ProtectedResourceError {
        match self {
            Self::Token(e) => e.code,
            _ => ProtectedResourceError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserInfoRequestValidationResult {
    // Token claims minus the protocol claims.
    pub subject: Principal,
    pub token_validation_result: TokenValidationResult,
}

impl UserInfoRequestValidationResult {
    pub fn subject_id(&self) -> &str {
        // Present by construction: validation rejects tokens without exactly one sub.
        self.subject.subject_id().unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct UserInfoRequestValidator {
    token_validator: Arc<dyn TokenValidator>,
    profile: Arc<dyn ProfileService>,
}

impl std::fmt::Debug for UserInfoRequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInfoRequestValidator").finish_non_exhaustive()
    }
}

impl UserInfoRequestValidator {
    pub fn new(token_validator: Arc<dyn TokenValidator>, profile: Arc<dyn ProfileService>) -> Self {
        Self {
            token_validator,
            profile,
        }
    }

    pub async fn validate_request(
        &self,
        access_token: &str,
    ) -> Result<UserInfoRequestValidationResult, UserInfoError> {
        let token_result = self
            .token_validator
            .validate_access_token(access_token, Some(OPENID_SCOPE))
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "userinfo token rejected"))?;

        if token_result.claims.single(claim_types::SUBJECT).is_none() {
            tracing::error!(
                client_id = ?token_result.client_id,
                sub_count = token_result.claims.values(claim_types::SUBJECT).count(),
                "token does not contain exactly one sub claim"
            );
            return Err(UserInfoError::MissingSubject);
        }

        let subject = Principal::new("UserInfo", token_result.claims.without_protocol_claims());
        let subject_id = subject
            .subject_id()
            .ok_or(UserInfoError::MissingSubject)?
            .to_string();

        let active = self
            .profile
            .is_active(&subject_id, ProfileCaller::UserInfoRequestValidation)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "is_active lookup failed"))?;
        if !active {
            tracing::error!(sub = %subject_id, "user is not active");
            return Err(UserInfoError::InactiveSubject {
                subject: subject_id,
            });
        }

        Ok(UserInfoRequestValidationResult {
            subject,
            token_validation_result: token_result,
        })
    }
}
