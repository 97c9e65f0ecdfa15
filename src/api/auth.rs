use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::services::auth::{AuthResponse, LoginRequest, RegisterRequest, login_user, register_user};
use crate::utils::error::AppResult;

async fn health_check() -> &'static str {
    "OK"
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = register_user(&state.db, payload, &state.jwt_service).await?;
    Ok(Json(response))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let response = login_user(&state.db, payload, &state.jwt_service).await?;
    Ok(Json(response))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/login", post(login))
        .with_state(state)
}
