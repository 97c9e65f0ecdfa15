use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Chats,
    ChatParticipants,
    Messages,
    Users,
}

impl Table {
    pub fn as_str(&self) -> &str {
        match self {
            Table::Chats => "chats",
            Table::ChatParticipants => "chat_participants",
            Table::Messages => "messages",
            Table::Users => "users",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change. `row_id` is the chat id for chat-scoped tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub row_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub kind: ChangeKind,
}

impl ChangeFilter {
    pub fn new(table: Table, kind: ChangeKind) -> Self {
        Self { table, kind }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table == event.table && self.kind == event.kind
    }
}

pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: ChangeEvent) {
        tracing::trace!(
            table = event.table.as_str(),
            kind = ?event.kind,
            row_id = event.row_id,
            "change published"
        );
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1000)
    }
}

pub struct ChangeSubscription {
    rx: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl ChangeSubscription {
    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// Waits for the next matching event. Returns `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "change subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
