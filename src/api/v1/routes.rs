/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - 保護対象 (/identity) だけに access middleware を route_layer 相当で掛ける
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{
    authorization_context::authorization_context, health::health, identity::identity,
};
use crate::middleware;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new().route("/identity", get(identity));
    let protected = middleware::auth::access::apply(protected, state.clone());

    Router::new()
        .route("/health", get(health))
        .route("/authorization-context", get(authorization_context))
        .merge(protected)
        .with_state(state)
}
