/*
 * Responsibility
 * - POST /connect/par (application/x-www-form-urlencoded)
 * - body の順序・重複を保ったまま parameters にし、authorize と同じ検証を通してから保存
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::api::connect::dto::ParResponse;
use crate::error::AppError;
use crate::services::authorize::parameters::names;
use crate::services::authorize::{AuthorizationParameters, AuthorizeContext};
use crate::state::AppState;

pub async fn push_authorization_request(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ParResponse>), AppError> {
    let parameters = AuthorizationParameters::from_query(&body);

    // RFC 9126 §2.1: a pushed request cannot itself reference a pushed request.
    if parameters.contains(names::REQUEST_URI) {
        tracing::warn!("request_uri submitted to the PAR endpoint");
        return Err(AppError::bad_request(
            "invalid_request",
            "request_uri is not allowed in a pushed authorization request",
        ));
    }

    let ctx = AuthorizeContext {
        pushing: true,
        ..Default::default()
    };
    let request = state
        .authorize_validator
        .validate(&parameters, ctx)
        .await
        .inspect_err(|err| tracing::warn!(error = %err, "pushed authorization request rejected"))?;

    let handle = state.pushed.create(&parameters).await?;
    tracing::info!(
        client_id = %request.client_id,
        expires_in = handle.expires_in,
        "authorization request pushed"
    );

    Ok((StatusCode::CREATED, Json(handle.into())))
}
