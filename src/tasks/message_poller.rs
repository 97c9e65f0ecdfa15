use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::models::message::Message;
use crate::services::message_channel::list_messages;
use crate::store::ChatStore;
use crate::utils::error::AppError;

/// Polls one chat for new messages every `interval` and forwards each
/// non-empty batch. This is plain polling: a message shows up at most one
/// interval after it was stored.
///
/// Losing access to the chat (removed membership, deleted chat) stops the
/// poller; other failures are logged and the next tick tries again.
pub fn spawn_message_poller(
    store: Arc<dyn ChatStore>,
    chat_id: i64,
    viewer_id: String,
    interval: Duration,
    after_id: Option<i64>,
    sink: mpsc::Sender<Vec<Message>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_seen = after_id;

        loop {
            tokio::select! {
                _ = ticker.tick() => {},
                _ = sink.closed() => break,
            }

            match list_messages(store.as_ref(), chat_id, &viewer_id, last_seen).await {
                Ok(batch) if batch.is_empty() => {}
                Ok(batch) => {
                    last_seen = batch.iter().map(|m| m.id).max().or(last_seen);
                    if sink.send(batch).await.is_err() {
                        break;
                    }
                }
                Err(e @ (AppError::NotParticipant { .. } | AppError::NotFound(_))) => {
                    tracing::info!(chat_id, "stopping message poller: {}", e);
                    break;
                }
                Err(e) => {
                    tracing::warn!(chat_id, "message poll failed: {}", e);
                }
            }
        }

        tracing::debug!(chat_id, viewer_id = %viewer_id, "message poller finished");
    })
}
