use serde::{Deserialize, Serialize};

use crate::models::chat::ChatSummary;
use crate::models::message::Message;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    WatchChats,
    WatchChat {
        chat_id: i64,
        #[serde(default)]
        after_id: Option<i64>,
    },
    UnwatchChat {
        chat_id: i64,
    },
    Heartbeat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        user_id: String,
        poll_interval_secs: u64,
    },
    ChatList {
        chats: Vec<ChatSummary>,
    },
    NewMessages {
        chat_id: i64,
        messages: Vec<Message>,
    },
    Error {
        message: String,
    },
    Pong,
}
