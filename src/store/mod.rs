//! Table-level access to the chat store.
//!
//! The services only talk to [`ChatStore`], so the SQLite backend can be
//! replaced by any store offering filtered reads, row writes and a
//! change-notification feed.

pub mod sqlite;

use async_trait::async_trait;

use crate::models::chat::{Chat, ChatParticipant};
use crate::models::message::Message;
use crate::models::user::UserProfile;
use crate::realtime::feed::{ChangeFilter, ChangeSubscription};
use crate::utils::error::AppResult;

pub use sqlite::SqliteStore;

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Distinct chat ids the user is a member of, ascending.
    async fn chat_ids_for_user(&self, user_id: &str) -> AppResult<Vec<i64>>;

    /// Chats whose id is in `ids`, most recently updated first.
    async fn chats_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Chat>>;

    async fn get_chat(&self, chat_id: i64) -> AppResult<Option<Chat>>;

    async fn participants_of(&self, chat_id: i64) -> AppResult<Vec<ChatParticipant>>;

    async fn users_by_ids(
        &self,
        ids: &[String],
        excluding: Option<&str>,
    ) -> AppResult<Vec<UserProfile>>;

    async fn latest_message(&self, chat_id: i64) -> AppResult<Option<Message>>;

    /// Messages in send order, optionally only those with `id > after_id`.
    async fn messages_for_chat(
        &self,
        chat_id: i64,
        after_id: Option<i64>,
    ) -> AppResult<Vec<Message>>;

    async fn is_participant(&self, chat_id: i64, user_id: &str) -> AppResult<bool>;

    async fn insert_chat(&self, animal_id: Option<&str>) -> AppResult<Chat>;

    async fn delete_chat(&self, chat_id: i64) -> AppResult<()>;

    async fn insert_participant(&self, chat_id: i64, user_id: &str)
    -> AppResult<ChatParticipant>;

    async fn insert_message(&self, chat_id: i64, user_id: &str, text: &str)
    -> AppResult<Message>;

    async fn touch_chat(&self, chat_id: i64, updated_at: &str) -> AppResult<()>;

    /// Flags unread messages not sent by `reader_id` as read. Returns the
    /// number of rows changed.
    async fn mark_read(&self, chat_id: i64, reader_id: &str) -> AppResult<u64>;

    fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription;
}
