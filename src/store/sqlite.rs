use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::sync::Arc;

use super::ChatStore;
use crate::database::DbPool;
use crate::models::chat::{Chat, ChatParticipant};
use crate::models::message::Message;
use crate::models::user::UserProfile;
use crate::realtime::feed::{
    ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, ChangeSubscription, Table,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::time::now_timestamp;

#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
    feed: Arc<ChangeFeed>,
}

impl SqliteStore {
    pub fn new(pool: DbPool, feed: Arc<ChangeFeed>) -> Self {
        Self { pool, feed }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    fn publish(&self, table: Table, kind: ChangeKind, row_id: i64) {
        self.feed.publish(ChangeEvent {
            table,
            kind,
            row_id,
        });
    }
}

#[async_trait]
impl ChatStore for SqliteStore {
    async fn chat_ids_for_user(&self, user_id: &str) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT DISTINCT chat_id FROM chat_participants WHERE user_id = ? ORDER BY chat_id ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(ids)
    }

    async fn chats_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Chat>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM chats WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY updated_at DESC, id DESC");

        let chats = builder
            .build_query_as::<Chat>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(chats)
    }

    async fn get_chat(&self, chat_id: i64) -> AppResult<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(chat)
    }

    async fn participants_of(&self, chat_id: i64) -> AppResult<Vec<ChatParticipant>> {
        let participants = sqlx::query_as::<_, ChatParticipant>(
            "SELECT * FROM chat_participants WHERE chat_id = ? ORDER BY joined_at ASC, user_id ASC",
        )
        .bind(chat_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(participants)
    }

    async fn users_by_ids(
        &self,
        ids: &[String],
        excluding: Option<&str>,
    ) -> AppResult<Vec<UserProfile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT id, username, full_name FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        if let Some(excluded) = excluding {
            builder.push(" AND id != ");
            builder.push_bind(excluded.to_string());
        }
        builder.push(" ORDER BY username ASC");

        let users = builder
            .build_query_as::<UserProfile>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(users)
    }

    async fn latest_message(&self, chat_id: i64) -> AppResult<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY sent_at DESC, id DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(message)
    }

    async fn messages_for_chat(
        &self,
        chat_id: i64,
        after_id: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE chat_id = ? AND id > ? ORDER BY sent_at ASC, id ASC",
        )
        .bind(chat_id)
        .bind(after_id.unwrap_or(0))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(messages)
    }

    async fn is_participant(&self, chat_id: i64, user_id: &str) -> AppResult<bool> {
        let count = sqlx::query(
            "SELECT COUNT(*) as count FROM chat_participants WHERE chat_id = ? AND user_id = ?",
        )
        .bind(chat_id)
        .bind(user_id)
        .fetch_one(self.pool.as_ref())
        .await?
        .get::<i64, _>("count");

        Ok(count > 0)
    }

    async fn insert_chat(&self, animal_id: Option<&str>) -> AppResult<Chat> {
        let now = now_timestamp();

        let id = sqlx::query("INSERT INTO chats (animal_id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(animal_id)
            .bind(&now)
            .bind(&now)
            .execute(self.pool.as_ref())
            .await?
            .last_insert_rowid();

        self.publish(Table::Chats, ChangeKind::Insert, id);

        Ok(Chat {
            id,
            animal_id: animal_id.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn delete_chat(&self, chat_id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(chat_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() > 0 {
            self.publish(Table::Chats, ChangeKind::Delete, chat_id);
        }

        Ok(())
    }

    async fn insert_participant(
        &self,
        chat_id: i64,
        user_id: &str,
    ) -> AppResult<ChatParticipant> {
        let participant = ChatParticipant {
            chat_id,
            user_id: user_id.to_string(),
            joined_at: now_timestamp(),
        };

        sqlx::query("INSERT INTO chat_participants (chat_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(participant.chat_id)
            .bind(&participant.user_id)
            .bind(&participant.joined_at)
            .execute(self.pool.as_ref())
            .await?;

        self.publish(Table::ChatParticipants, ChangeKind::Insert, chat_id);

        Ok(participant)
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        user_id: &str,
        text: &str,
    ) -> AppResult<Message> {
        let sent_at = now_timestamp();

        let id = sqlx::query(
            "INSERT INTO messages (chat_id, user_id, text, sent_at, is_read) VALUES (?, ?, ?, ?, 0)",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(text)
        .bind(&sent_at)
        .execute(self.pool.as_ref())
        .await?
        .last_insert_rowid();

        self.publish(Table::Messages, ChangeKind::Insert, chat_id);

        Ok(Message {
            id,
            chat_id,
            user_id: user_id.to_string(),
            text: text.to_string(),
            sent_at,
            is_read: false,
        })
    }

    async fn touch_chat(&self, chat_id: i64, updated_at: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE chats SET updated_at = ? WHERE id = ?")
            .bind(updated_at)
            .bind(chat_id)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Chat {} not found", chat_id)));
        }

        self.publish(Table::Chats, ChangeKind::Update, chat_id);
        Ok(())
    }

    async fn mark_read(&self, chat_id: i64, reader_id: &str) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = 1 WHERE chat_id = ? AND user_id != ? AND is_read = 0",
        )
        .bind(chat_id)
        .bind(reader_id)
        .execute(self.pool.as_ref())
        .await?;

        let updated = result.rows_affected();
        if updated > 0 {
            self.publish(Table::Messages, ChangeKind::Update, chat_id);
        }

        Ok(updated)
    }

    fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        self.feed.subscribe(filter)
    }
}
