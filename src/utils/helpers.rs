use axum::http::HeaderMap;

use crate::utils::error::{AppError, AppResult};

/// The caller's user id, as set by the auth middleware.
pub fn extract_user_id(headers: &HeaderMap) -> AppResult<String> {
    headers
        .get(crate::middleware::auth::AUTH_USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Auth("Missing authenticated user".to_string()))
}
