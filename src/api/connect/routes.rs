/*
 * Responsibility
 * - protocol endpoints (/connect/...) の URL 構造
 * - 認証は各 handler 内で行う (userinfo は scope / active の検証が middleware と異なる)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::connect::handlers::{
    authorize::authorize, par::push_authorization_request, userinfo::userinfo,
};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/userinfo", get(userinfo).post(userinfo))
        .route("/par", post(push_authorization_request))
        .route("/authorize", get(authorize))
        .route("/authorize/callback", get(authorize))
        .with_state(state)
}
