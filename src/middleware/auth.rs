use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::api::AppState;
use crate::services::users::find_by_id;
use crate::utils::error::AppError;

pub const AUTH_USER_ID_HEADER: &str = "x-user-id";

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let token = auth_header
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Auth("Missing or invalid authorization header".to_string()))?;

    let user_id = state.jwt_service.extract_user_id(token)?;

    if find_by_id(&state.db, &user_id).await?.is_none() {
        return Err(AppError::Auth("User no longer exists".to_string()));
    }

    request.headers_mut().insert(
        AUTH_USER_ID_HEADER,
        user_id
            .parse()
            .map_err(|_| AppError::Internal("Failed to set user id header".to_string()))?,
    );

    Ok(next.run(request).await)
}
