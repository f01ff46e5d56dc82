//! access token (JWT + DPoP) 検証 → AuthCtx を extensions に入れる
//!
//! 1) `Authorization` scheme の選択 (Bearer / DPoP) と `DPoP` header の抽出
//! 2) JWT 署名検証 + iss/aud/exp/nbf/typ
//! 3) sender constraint: cnf 付き token は DPoP scheme 必須、DPoP proof は
//!    htm/htu/iat/jti/ath と cnf.jkt の一致、jti は replay cache で一度きり
//!
//! 失敗時の詳細は log のみ。caller には `invalid_token` 系の challenge を返す。

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::auth::{PresentedToken, SenderError};
use crate::services::auth::dpop::core::expected_htu;
use crate::services::claims::claim_types;
use crate::state::AppState;

/// `/api/v1/*` の保護対象 route に認証を掛ける。
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため `from_fn_with_state` で渡す
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    OriginalUri(original_uri): OriginalUri,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = PresentedToken::from_headers(req.headers())
        .inspect_err(|err| tracing::warn!(error = %err, "credentials rejected"))?;

    let token = state
        .token_validator
        .validate_access_token(&presented.token, None)
        .await
        .map_err(|err| {
            tracing::warn!(error = %err, "access token verification failed");
            SenderError::from(err)
        })?;

    // nest 後の URI は prefix が削られているので OriginalUri を使う
    let htu = expected_htu(req.headers(), &original_uri, Some(&state.public_origin));
    let verified_dpop = state
        .sender
        .enforce(&presented, &token, req.method().as_str(), &htu)
        .await?;

    let subject = token
        .claims
        .single(claim_types::SUBJECT)
        .map(str::to_string);
    let auth_ctx = AuthCtx {
        subject,
        client_id: token.client_id.clone(),
        scopes: token.scopes.clone(),
        jti: token.jti.clone(),
        dpop_jkt: verified_dpop.map(|v| v.jkt),
        claims: token.claims.without_protocol_claims(),
    };

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(auth_ctx);

    Ok(next.run(req).await)
}
