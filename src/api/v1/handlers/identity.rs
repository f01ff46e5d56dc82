/*
 * Responsibility
 * - GET /identity: sender-constrained な protected resource の最小例
 * - 検証は middleware 済み。ここでは AuthCtx をそのまま返すだけ
 */
use axum::Json;

use crate::api::v1::dto::identity::IdentityResponse;
use crate::api::v1::extractors::AuthCtxExtractor;

pub async fn identity(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<IdentityResponse> {
    let token_type = if ctx.dpop_jkt.is_some() { "DPoP" } else { "Bearer" };

    Json(IdentityResponse {
        sub: ctx.subject,
        client_id: ctx.client_id,
        scopes: ctx.scopes,
        token_type,
        jkt: ctx.dpop_jkt,
        claims: ctx.claims.to_json_object(),
    })
}
