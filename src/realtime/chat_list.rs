use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::chat::ChatSummary;
use crate::realtime::feed::{ChangeFilter, ChangeKind, Table};
use crate::services::assembler::ChatAssembler;
use crate::store::ChatStore;
use crate::utils::error::AppResult;

pub type ChatListUpdate = AppResult<Vec<ChatSummary>>;

/// Sends the user's full chat list now and again after every chat UPDATE
/// event. Each event recomputes the whole list. The task ends when the sink
/// is dropped or the feed closes.
pub fn spawn_chat_list_watcher(
    assembler: Arc<dyn ChatAssembler>,
    store: Arc<dyn ChatStore>,
    user_id: String,
    sink: mpsc::Sender<ChatListUpdate>,
) -> JoinHandle<()> {
    // Subscribe before the first read so no update slips between the two.
    let mut changes = store.subscribe(ChangeFilter::new(Table::Chats, ChangeKind::Update));

    tokio::spawn(async move {
        let initial = assembler.list_chats_with_details(&user_id).await;
        if sink.send(initial).await.is_err() {
            return;
        }

        loop {
            let event = tokio::select! {
                event = changes.next() => event,
                _ = sink.closed() => break,
            };

            let Some(event) = event else {
                tracing::debug!(user_id = %user_id, "change feed closed");
                break;
            };

            tracing::trace!(user_id = %user_id, chat_id = event.row_id, "refreshing chat list");
            let list = assembler.list_chats_with_details(&user_id).await;
            if let Err(e) = &list {
                tracing::warn!(user_id = %user_id, "chat list refresh failed: {}", e);
            }
            if sink.send(list).await.is_err() {
                break;
            }
        }
    })
}
