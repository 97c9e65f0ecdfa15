use chrono::Utc;

use crate::models::chat::Chat;
use crate::models::message::Message;
use crate::store::ChatStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::bump_after;
use crate::utils::validation::{validate_message_text, validate_user_id};

async fn require_chat(store: &dyn ChatStore, chat_id: i64) -> AppResult<Chat> {
    store
        .get_chat(chat_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat {} not found", chat_id)))
}

async fn require_participant(store: &dyn ChatStore, chat_id: i64, user_id: &str) -> AppResult<()> {
    if store.is_participant(chat_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::NotParticipant {
            chat_id,
            user_id: user_id.to_string(),
        })
    }
}

/// Appends a message and moves the chat to the top of its members' lists.
///
/// The insert and the `updated_at` bump are two separate writes; if the
/// second one fails the message stands and only list order is stale.
///
/// The new `updated_at` is derived from the value read before the insert.
/// Two members sending at once can therefore leave the earlier of the two
/// bumps in place; the last write wins and only sort order is affected.
pub async fn send_message(
    store: &dyn ChatStore,
    chat_id: i64,
    user_id: &str,
    text: &str,
) -> AppResult<Message> {
    validate_user_id(user_id)?;
    validate_message_text(text)?;

    let chat = require_chat(store, chat_id).await?;
    require_participant(store, chat_id, user_id).await?;

    let message = store.insert_message(chat_id, user_id, text).await?;

    let updated_at = bump_after(&chat.updated_at, Utc::now());
    store.touch_chat(chat_id, &updated_at).await?;

    tracing::debug!(chat_id, message_id = message.id, "message sent");
    Ok(message)
}

/// Marks every unread message in the chat that `user_id` did not write as
/// read. Nothing to mark still counts as success; only members may mark.
pub async fn mark_read(store: &dyn ChatStore, chat_id: i64, user_id: &str) -> AppResult<bool> {
    validate_user_id(user_id)?;
    require_chat(store, chat_id).await?;
    require_participant(store, chat_id, user_id).await?;

    let updated = store.mark_read(chat_id, user_id).await?;
    tracing::debug!(chat_id, updated, "messages marked read");
    Ok(true)
}

/// Chat detail: messages oldest first, optionally only those after `after_id`.
pub async fn list_messages(
    store: &dyn ChatStore,
    chat_id: i64,
    viewer_id: &str,
    after_id: Option<i64>,
) -> AppResult<Vec<Message>> {
    validate_user_id(viewer_id)?;
    require_chat(store, chat_id).await?;
    require_participant(store, chat_id, viewer_id).await?;

    store.messages_for_chat(chat_id, after_id).await
}
