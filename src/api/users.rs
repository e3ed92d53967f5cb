use axum::{Json, Router, routing::get};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AnyRole, Auth};
use crate::db::UserRole;
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct UsersState {
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new().route("/me", get(me)).with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MeResponse {
    user_id: String,
    role: UserRole,
}

/// Identity straight from the access token claims; the store is not consulted.
async fn me(auth: Auth<AnyRole>) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: auth.identity.user_id,
        role: auth.identity.role,
    })
}
