use axum::{
    extract::{
        Query, State,
        ws::{WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, header},
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::services::users::find_by_id;
use crate::utils::error::{AppError, AppResult};
use crate::websocket::connection::WatchContext;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let token = query.token.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.to_string())
    });

    let user_id = authenticate_socket(&state, token).await?;

    let state_clone = state.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state_clone, user_id)))
}

/// Same rules as the HTTP auth middleware: valid token, user still exists.
async fn authenticate_socket(state: &AppState, token: Option<String>) -> AppResult<String> {
    let token = token.ok_or_else(|| AppError::Auth("Missing token".to_string()))?;
    let user_id = state.jwt_service.extract_user_id(&token)?;

    if find_by_id(&state.db, &user_id).await?.is_none() {
        return Err(AppError::Auth("User no longer exists".to_string()));
    }

    Ok(user_id)
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let ctx = WatchContext {
        store: state.store.clone(),
        assembler: state.assembler.clone(),
        poll_interval: state.poll_interval,
    };

    state
        .ws_manager
        .handle_connection(socket, user_id, ctx)
        .await;
}
