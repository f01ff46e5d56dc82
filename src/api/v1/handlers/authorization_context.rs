/*
 * Responsibility
 * - GET /authorization-context?returnUrl=...
 * - login/consent page から呼ばれ、return URL を検証済みの authorize request に戻す
 * - 再開できない理由 (guard 拒否 / message・PAR 期限切れ / 検証失敗) は区別せず 404
 */
use axum::{
    Json,
    extract::{Query, State},
};

use crate::api::v1::dto::authorization_context::{
    AuthorizationContextQuery, AuthorizationContextResponse,
};
use crate::error::AppError;
use crate::services::authorize::RequestContext;
use crate::state::AppState;

pub async fn authorization_context(
    State(state): State<AppState>,
    Query(query): Query<AuthorizationContextQuery>,
) -> Result<Json<AuthorizationContextResponse>, AppError> {
    // No interactive session lives in this service; pages resolve the user themselves.
    let ctx = RequestContext {
        origin: state.public_origin.clone(),
        subject: None,
    };

    let request = state
        .assembler
        .parse(&query.return_url, &ctx)
        .await
        .ok_or(AppError::not_found("authorization request"))?;

    Ok(Json(request.into()))
}
