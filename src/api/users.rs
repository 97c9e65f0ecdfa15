use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::user::UserResponse;
use crate::services::users::{find_by_id, find_by_username};
use crate::utils::error::{AppError, AppResult};

#[derive(Deserialize)]
struct LookupQuery {
    username: String,
}

async fn lookup_user(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> AppResult<Json<UserResponse>> {
    let user = find_by_username(&state.db, &query.username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> AppResult<Json<UserResponse>> {
    let user = find_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(lookup_user))
        .route("/:user_id", get(get_user))
        .with_state(state)
}
