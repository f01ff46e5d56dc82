/*
 * Responsibility
 * - GET|POST /connect/userinfo
 * - credentials 抽出 → token/sub/active の検証 → sender constraint (DPoP) → claims
 */
use axum::{
    Json,
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
};

use crate::error::AppError;
use crate::services::auth::PresentedToken;
use crate::services::auth::dpop::core::expected_htu;
use crate::state::AppState;

pub async fn userinfo(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
) -> Result<Json<serde_json::Map<String, serde_json::Value>>, AppError> {
    let presented = PresentedToken::from_headers(&headers)
        .inspect_err(|err| tracing::warn!(error = %err, "userinfo credentials rejected"))?;

    let validated = state
        .userinfo_validator
        .validate_request(&presented.token)
        .await?;

    let htu = expected_htu(&headers, &original_uri, Some(&state.public_origin));
    state
        .sender
        .enforce(
            &presented,
            &validated.token_validation_result,
            method.as_str(),
            &htu,
        )
        .await?;

    let claims = state.userinfo_response.process(&validated).await?;
    tracing::debug!(
        sub = %validated.subject_id(),
        claim_count = claims.len(),
        "userinfo response issued"
    );

    Ok(Json(claims))
}
