use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::user::UserProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Chat {
    pub id: i64,
    pub animal_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChatParticipant {
    pub chat_id: i64,
    pub user_id: String,
    pub joined_at: String,
}

/// Denormalized row of a user's chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: i64,
    pub animal_id: Option<String>,
    pub other_participants: Vec<UserProfile>,
    pub last_message_text: Option<String>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCreation {
    pub chat_id: i64,
    pub reused: bool,
}
