/*
 * Responsibility
 * - GET /connect/authorize と /connect/authorize/callback
 * - authzId があれば parking 済みの parameters、request_uri があれば PAR から取り出して差し替える
 * - store 障害は 503、見つからない / 期限切れは 400
 * - client / redirect_uri 未確認の失敗は 400、それ以降の失敗は redirect_uri に error を返す
 * - 成功時は parameters を parking して login/consent page へ redirect (return URL で callback に戻る)
 */
use axum::{
    extract::{RawQuery, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::services::authorize::{
    AuthorizationParameters, AuthorizeContext, AuthorizeValidationError, RedirectableError,
};
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, AppError> {
    let outer = AuthorizationParameters::from_query(query.as_deref().unwrap_or_default());
    let resolved = state.assembler.resolve(outer).await.inspect_err(|e| {
        tracing::warn!(error = %e, "authorize parameters could not be resolved");
    })?;

    let ctx = AuthorizeContext {
        subject: None,
        pushed_request_uri: resolved.pushed_request_uri.as_deref(),
        pushing: false,
    };
    let request = match state.authorize_validator.validate(&resolved.parameters, ctx).await {
        Ok(request) => request,
        Err(AuthorizeValidationError::Redirect(err)) => {
            tracing::info!(error = %err, "authorize request rejected; returning error to client");
            return error_redirect(&err);
        }
        Err(err @ AuthorizeValidationError::Local(_)) => {
            tracing::warn!(error = %err, "authorize request rejected");
            return Err(err.into());
        }
    };

    let page = state.interactive.page_for(&request);
    let location = state.interactive.build(page, &request).await?;
    tracing::debug!(?page, client_id = %request.client_id, "redirecting to interactive page");

    found(&location)
}

/// RFC 6749 §4.1.2.1 error response on the client's redirect URI.
fn error_redirect(err: &RedirectableError) -> Result<Response, AppError> {
    let mut url = url::Url::parse(&err.redirect_uri).map_err(|_| {
        tracing::error!(redirect_uri = %err.redirect_uri, "registered redirect_uri is not a URL");
        AppError::Internal
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("error", err.error.code());
        if let Some(state) = &err.state {
            pairs.append_pair("state", state);
        }
    }
    found(url.as_str())
}

fn found(location: &str) -> Result<Response, AppError> {
    let value = HeaderValue::from_str(location).map_err(|_| AppError::Internal)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, value)]).into_response())
}
