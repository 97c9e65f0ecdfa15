//! Shared fixtures for the inline test modules.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::database::{DbPool, create_memory_pool};
use crate::models::chat::{Chat, ChatParticipant};
use crate::models::message::Message;
use crate::models::user::{User, UserProfile};
use crate::realtime::feed::{ChangeFeed, ChangeFilter, ChangeSubscription};
use crate::services::users::insert_user;
use crate::store::{ChatStore, SqliteStore};
use crate::utils::error::{AppError, AppResult};

pub struct TestEnv {
    pub pool: DbPool,
    pub store: SqliteStore,
}

impl TestEnv {
    pub async fn new() -> Self {
        let pool = create_memory_pool().await.expect("memory pool");
        let feed = Arc::new(ChangeFeed::new(64));
        let store = SqliteStore::new(pool.clone(), feed);
        Self { pool, store }
    }
}

pub async fn seed_user(env: &TestEnv, username: &str) -> User {
    let user = User::new(
        username.to_string(),
        format!("{} tester", username),
        "not-a-real-hash".to_string(),
    );
    insert_user(&env.pool, &user).await.expect("seed user");
    user
}

pub async fn seed_user_with_id(env: &TestEnv, id: &str, username: &str) -> User {
    let mut user = User::new(
        username.to_string(),
        format!("{} tester", username),
        "not-a-real-hash".to_string(),
    );
    user.id = id.to_string();
    insert_user(&env.pool, &user).await.expect("seed user");
    user
}

pub async fn count_rows(env: &TestEnv, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(env.pool.as_ref())
        .await
        .expect("count rows")
}

fn injected(what: &str) -> AppError {
    AppError::Database(sqlx::Error::Protocol(format!("injected failure: {}", what)))
}

/// Delegating store that records every call and fails on request.
pub struct InstrumentedStore {
    inner: SqliteStore,
    calls: Mutex<Vec<&'static str>>,
    fail_participant_for: Mutex<Option<String>>,
    fail_latest_for_chat: Mutex<Option<i64>>,
    fail_delete: AtomicBool,
}

impl InstrumentedStore {
    pub fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_participant_for: Mutex::new(None),
            fail_latest_for_chat: Mutex::new(None),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn fail_participant_insert_for(&self, user_id: &str) {
        *self.fail_participant_for.lock().unwrap() = Some(user_id.to_string());
    }

    pub fn fail_latest_message_for(&self, chat_id: i64) {
        *self.fail_latest_for_chat.lock().unwrap() = Some(chat_id);
    }

    pub fn fail_deletes(&self) {
        self.fail_delete.store(true, Ordering::SeqCst);
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }
}

#[async_trait]
impl ChatStore for InstrumentedStore {
    async fn chat_ids_for_user(&self, user_id: &str) -> AppResult<Vec<i64>> {
        self.record("chat_ids_for_user");
        self.inner.chat_ids_for_user(user_id).await
    }

    async fn chats_by_ids(&self, ids: &[i64]) -> AppResult<Vec<Chat>> {
        self.record("chats_by_ids");
        self.inner.chats_by_ids(ids).await
    }

    async fn get_chat(&self, chat_id: i64) -> AppResult<Option<Chat>> {
        self.record("get_chat");
        self.inner.get_chat(chat_id).await
    }

    async fn participants_of(&self, chat_id: i64) -> AppResult<Vec<ChatParticipant>> {
        self.record("participants_of");
        self.inner.participants_of(chat_id).await
    }

    async fn users_by_ids(
        &self,
        ids: &[String],
        excluding: Option<&str>,
    ) -> AppResult<Vec<UserProfile>> {
        self.record("users_by_ids");
        self.inner.users_by_ids(ids, excluding).await
    }

    async fn latest_message(&self, chat_id: i64) -> AppResult<Option<Message>> {
        self.record("latest_message");
        let fail = *self.fail_latest_for_chat.lock().unwrap() == Some(chat_id);
        if fail {
            return Err(injected("latest_message"));
        }
        self.inner.latest_message(chat_id).await
    }

    async fn messages_for_chat(
        &self,
        chat_id: i64,
        after_id: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        self.record("messages_for_chat");
        self.inner.messages_for_chat(chat_id, after_id).await
    }

    async fn is_participant(&self, chat_id: i64, user_id: &str) -> AppResult<bool> {
        self.record("is_participant");
        self.inner.is_participant(chat_id, user_id).await
    }

    async fn insert_chat(&self, animal_id: Option<&str>) -> AppResult<Chat> {
        self.record("insert_chat");
        self.inner.insert_chat(animal_id).await
    }

    async fn delete_chat(&self, chat_id: i64) -> AppResult<()> {
        self.record("delete_chat");
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(injected("delete_chat"));
        }
        self.inner.delete_chat(chat_id).await
    }

    async fn insert_participant(
        &self,
        chat_id: i64,
        user_id: &str,
    ) -> AppResult<ChatParticipant> {
        self.record("insert_participant");
        let fail = self.fail_participant_for.lock().unwrap().as_deref() == Some(user_id);
        if fail {
            return Err(injected("insert_participant"));
        }
        self.inner.insert_participant(chat_id, user_id).await
    }

    async fn insert_message(
        &self,
        chat_id: i64,
        user_id: &str,
        text: &str,
    ) -> AppResult<Message> {
        self.record("insert_message");
        self.inner.insert_message(chat_id, user_id, text).await
    }

    async fn touch_chat(&self, chat_id: i64, updated_at: &str) -> AppResult<()> {
        self.record("touch_chat");
        self.inner.touch_chat(chat_id, updated_at).await
    }

    async fn mark_read(&self, chat_id: i64, reader_id: &str) -> AppResult<u64> {
        self.record("mark_read");
        self.inner.mark_read(chat_id, reader_id).await
    }

    fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        self.inner.subscribe(filter)
    }
}
