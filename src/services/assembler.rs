//! Builds the denormalized chat list shown to one user.
//!
//! [`FanOutAssembler`] walks the normalized tables one chat at a time;
//! [`JoinedAssembler`] asks the database for the same view in two joins.
//! Callers hold an `Arc<dyn ChatAssembler>` and do not care which one runs.

use async_trait::async_trait;
use futures_util::future::{join_all, try_join_all};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;

use crate::database::DbPool;
use crate::models::chat::{Chat, ChatSummary};
use crate::models::user::UserProfile;
use crate::services::participants::{list_chat_ids_for_user, participant_ids};
use crate::store::ChatStore;
use crate::utils::error::AppResult;
use crate::utils::validation::validate_user_id;

#[async_trait]
pub trait ChatAssembler: Send + Sync {
    /// Chats of `user_id`, most recently updated first. Read-only.
    async fn list_chats_with_details(&self, user_id: &str) -> AppResult<Vec<ChatSummary>>;
}

/// What a per-chat failure does to the whole list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssemblyFailurePolicy {
    /// Any failure fails the call; no partial lists.
    #[default]
    Abort,
    /// Log the failing chat and leave it out.
    SkipChat,
}

impl AssemblyFailurePolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "abort" => Some(AssemblyFailurePolicy::Abort),
            "skip" => Some(AssemblyFailurePolicy::SkipChat),
            _ => None,
        }
    }
}

pub struct FanOutAssembler {
    store: Arc<dyn ChatStore>,
    policy: AssemblyFailurePolicy,
}

impl FanOutAssembler {
    pub fn new(store: Arc<dyn ChatStore>, policy: AssemblyFailurePolicy) -> Self {
        Self { store, policy }
    }
}

async fn summarize(store: &dyn ChatStore, chat: Chat, viewer_id: &str) -> AppResult<ChatSummary> {
    let (member_ids, latest) =
        futures_util::try_join!(participant_ids(store, chat.id), store.latest_message(chat.id))?;

    let others: Vec<String> = member_ids
        .into_iter()
        .filter(|id| id != viewer_id)
        .collect();
    let other_participants = store.users_by_ids(&others, Some(viewer_id)).await?;

    Ok(ChatSummary {
        chat_id: chat.id,
        animal_id: chat.animal_id,
        other_participants,
        last_message_text: latest.map(|m| m.text),
        updated_at: chat.updated_at,
    })
}

#[async_trait]
impl ChatAssembler for FanOutAssembler {
    async fn list_chats_with_details(&self, user_id: &str) -> AppResult<Vec<ChatSummary>> {
        let store = self.store.as_ref();

        let chat_ids = list_chat_ids_for_user(store, user_id).await?;
        if chat_ids.is_empty() {
            return Ok(Vec::new());
        }

        let chats = store.chats_by_ids(&chat_ids).await?;

        match self.policy {
            AssemblyFailurePolicy::Abort => {
                try_join_all(chats.into_iter().map(|chat| summarize(store, chat, user_id))).await
            }
            AssemblyFailurePolicy::SkipChat => {
                let results = join_all(chats.into_iter().map(|chat| async move {
                    let chat_id = chat.id;
                    (chat_id, summarize(store, chat, user_id).await)
                }))
                .await;

                Ok(results
                    .into_iter()
                    .filter_map(|(chat_id, result)| match result {
                        Ok(summary) => Some(summary),
                        Err(e) => {
                            tracing::warn!(chat_id, "skipping chat in list: {}", e);
                            None
                        }
                    })
                    .collect())
            }
        }
    }
}

pub struct JoinedAssembler {
    pool: DbPool,
}

impl JoinedAssembler {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ChatRow {
    chat_id: i64,
    animal_id: Option<String>,
    updated_at: String,
    last_message_text: Option<String>,
}

#[derive(FromRow)]
struct MemberRow {
    chat_id: i64,
    id: String,
    username: String,
    full_name: String,
}

#[async_trait]
impl ChatAssembler for JoinedAssembler {
    async fn list_chats_with_details(&self, user_id: &str) -> AppResult<Vec<ChatSummary>> {
        validate_user_id(user_id)?;

        let chats = sqlx::query_as::<_, ChatRow>(
            "SELECT c.id AS chat_id, c.animal_id, c.updated_at,
                    (SELECT m.text FROM messages m
                     WHERE m.chat_id = c.id
                     ORDER BY m.sent_at DESC, m.id DESC LIMIT 1) AS last_message_text
             FROM chats c
             WHERE c.id IN (SELECT chat_id FROM chat_participants WHERE user_id = ?)
             ORDER BY c.updated_at DESC, c.id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        if chats.is_empty() {
            return Ok(Vec::new());
        }

        let members = sqlx::query_as::<_, MemberRow>(
            "SELECT p.chat_id, u.id, u.username, u.full_name
             FROM chat_participants p
             JOIN users u ON u.id = p.user_id
             WHERE p.chat_id IN (SELECT chat_id FROM chat_participants WHERE user_id = ?)
               AND p.user_id != ?
             ORDER BY u.username ASC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut others: HashMap<i64, Vec<UserProfile>> = HashMap::new();
        for row in members {
            others.entry(row.chat_id).or_default().push(UserProfile {
                id: row.id,
                username: row.username,
                full_name: row.full_name,
            });
        }

        Ok(chats
            .into_iter()
            .map(|row| ChatSummary {
                other_participants: others.remove(&row.chat_id).unwrap_or_default(),
                chat_id: row.chat_id,
                animal_id: row.animal_id,
                last_message_text: row.last_message_text,
                updated_at: row.updated_at,
            })
            .collect())
    }
}
