use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::AppState;
use crate::models::chat::{ChatCreation, ChatSummary};
use crate::models::message::{Message, SendMessageRequest};
use crate::services::message_channel::{list_messages, mark_read, send_message};
use crate::utils::error::AppResult;
use crate::utils::helpers::extract_user_id;

#[derive(Deserialize)]
struct CreateChatRequest {
    participant_ids: Vec<String>,
    animal_id: Option<String>,
}

#[derive(Deserialize)]
struct MessagesQuery {
    after_id: Option<i64>,
}

async fn list_chats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Json<Vec<ChatSummary>>> {
    let user_id = extract_user_id(&headers)?;
    let chats = state.assembler.list_chats_with_details(&user_id).await?;
    Ok(Json(chats))
}

async fn create_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateChatRequest>,
) -> AppResult<Json<ChatCreation>> {
    let user_id = extract_user_id(&headers)?;

    // The caller always initiates and is always a member.
    let mut participant_ids = req.participant_ids;
    participant_ids.retain(|id| id.trim() != user_id);
    participant_ids.insert(0, user_id);

    let creation = state
        .creator
        .create_or_reuse_chat(req.animal_id.as_deref(), &participant_ids)
        .await?;
    Ok(Json(creation))
}

async fn get_messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let user_id = extract_user_id(&headers)?;
    let messages = list_messages(state.store.as_ref(), chat_id, &user_id, query.after_id).await?;
    Ok(Json(messages))
}

async fn post_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<Message>> {
    let user_id = extract_user_id(&headers)?;
    let message = send_message(state.store.as_ref(), chat_id, &user_id, &req.text).await?;
    Ok(Json(message))
}

async fn read_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    let user_id = extract_user_id(&headers)?;
    let success = mark_read(state.store.as_ref(), chat_id, &user_id).await?;
    Ok(Json(serde_json::json!({ "success": success })))
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(list_chats).post(create_chat))
        .route("/:chat_id/messages", get(get_messages).post(post_message))
        .route("/:chat_id/read", post(read_chat))
        .with_state(state)
}
