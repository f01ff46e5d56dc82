//! HTTP-facing error type.
//!
//! Layer errors convert into `AppError`; the response body is always
//! `{"error": {"code", "message"}}`. 401s also carry `WWW-Authenticate`.
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::auth::SenderError;
use crate::services::auth::sender::challenges;
use crate::services::authorize::{AuthorizeError, AuthorizeValidationError, ResolveError};
use crate::services::message::MessageError;
use crate::services::par::ParError;
use crate::services::userinfo::UserInfoError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("unauthorized: {code}")]
    Unauthorized {
        code: &'static str,
        challenges: Vec<String>,
    },
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn unauthorized(code: &'static str, challenges: Vec<String>) -> Self {
        Self::Unauthorized { code, challenges }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut www_authenticate = Vec::new();
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{resource} not found."),
            ),
            AppError::Unauthorized { code, challenges } => {
                www_authenticate = challenges;
                // Detail stays in the logs.
                (StatusCode::UNAUTHORIZED, code, "unauthorized".into())
            }
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "temporarily_unavailable",
                "service temporarily unavailable".into(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                "internal server error".into(),
            ),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        for challenge in www_authenticate {
            if let Ok(v) = HeaderValue::from_str(&challenge) {
                headers.append(header::WWW_AUTHENTICATE, v);
            }
        }
        if status == StatusCode::UNAUTHORIZED {
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        }
        response
    }
}

impl From<SenderError> for AppError {
    fn from(e: SenderError) -> Self {
        if e.is_storage_unavailable() {
            return AppError::ServiceUnavailable;
        }
        AppError::unauthorized(e.code(), e.challenges())
    }
}

impl From<UserInfoError> for AppError {
    fn from(e: UserInfoError) -> Self {
        match e {
            UserInfoError::Profile(_) => AppError::ServiceUnavailable,
            UserInfoError::SubjectMismatch { .. } => AppError::Internal,
            other => {
                let code = other.code().as_str();
                AppError::unauthorized(code, challenges(Some(code), Some(code)))
            }
        }
    }
}

impl From<ParError> for AppError {
    fn from(e: ParError) -> Self {
        match e {
            ParError::NotFound => AppError::not_found("pushed authorization request"),
            ParError::StorageUnavailable(_) => AppError::ServiceUnavailable,
            ParError::InvalidLifetime => AppError::Internal,
        }
    }
}

impl From<MessageError> for AppError {
    fn from(e: MessageError) -> Self {
        match e {
            MessageError::StorageUnavailable(_) => AppError::ServiceUnavailable,
            MessageError::InvalidLifetime => AppError::Internal,
        }
    }
}

impl From<ResolveError> for AppError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::StorageUnavailable(_) => AppError::ServiceUnavailable,
            other => AppError::bad_request("invalid_request", other.to_string()),
        }
    }
}

impl From<AuthorizeError> for AppError {
    fn from(e: AuthorizeError) -> Self {
        match e {
            AuthorizeError::StorageUnavailable(_) => AppError::ServiceUnavailable,
            other => AppError::bad_request(other.code(), other.to_string()),
        }
    }
}

impl From<AuthorizeValidationError> for AppError {
    fn from(e: AuthorizeValidationError) -> Self {
        match e {
            AuthorizeValidationError::Local(e) => e.into(),
            AuthorizeValidationError::Redirect(r) => r.error.into(),
        }
    }
}
