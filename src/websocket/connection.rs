use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::{ClientMessage, ServerMessage};
use crate::realtime::chat_list::spawn_chat_list_watcher;
use crate::services::assembler::ChatAssembler;
use crate::store::ChatStore;
use crate::tasks::message_poller::spawn_message_poller;

pub type Connections = Arc<RwLock<HashMap<String, String>>>;

/// Everything a socket needs to serve its watches.
#[derive(Clone)]
pub struct WatchContext {
    pub store: Arc<dyn ChatStore>,
    pub assembler: Arc<dyn ChatAssembler>,
    pub poll_interval: Duration,
}

/// A producer (chat list watcher or message poller) and the task relaying
/// its output to the socket.
struct Watch {
    producer: JoinHandle<()>,
    forwarder: JoinHandle<()>,
}

impl Watch {
    fn abort(&self) {
        self.forwarder.abort();
        self.producer.abort();
    }
}

/// Watches owned by one socket.
#[derive(Default)]
struct Watches {
    chat_list: Option<Watch>,
    chats: HashMap<i64, Watch>,
}

impl Drop for Watches {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl Watches {
    fn abort_all(&mut self) {
        if let Some(watch) = self.chat_list.take() {
            watch.abort();
        }
        for (_, watch) in self.chats.drain() {
            watch.abort();
        }
    }
}

pub struct ConnectionManager {
    connections: Connections,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn handle_connection(&self, socket: WebSocket, user_id: String, ctx: WatchContext) {
        let (mut sender, mut receiver) = socket.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(64);

        let connection_id = Uuid::new_v4().to_string();
        {
            let mut conns = self.connections.write().await;
            conns.insert(connection_id.clone(), user_id.clone());
        }
        tracing::debug!(connection_id = %connection_id, user_id = %user_id, "socket connected");

        let mut send_task = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if let Ok(json) = serde_json::to_string(&msg)
                    && sender.send(WsMessage::Text(json)).await.is_err()
                {
                    break;
                }
            }
        });

        let _ = out_tx
            .send(ServerMessage::Connected {
                user_id: user_id.clone(),
                poll_interval_secs: ctx.poll_interval.as_secs(),
            })
            .await;

        let recv_user = user_id.clone();
        let mut recv_task = tokio::spawn(async move {
            // Dropping `watches` aborts every forwarder, even if this task is aborted.
            let mut watches = Watches::default();

            while let Some(Ok(msg)) = receiver.next().await {
                let WsMessage::Text(text) = msg else {
                    continue;
                };

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        handle_client_message(client_msg, &recv_user, &ctx, &out_tx, &mut watches)
                            .await
                    }
                    Err(e) => {
                        let _ = out_tx
                            .send(ServerMessage::Error {
                                message: format!("Unrecognized frame: {}", e),
                            })
                            .await;
                    }
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        let mut conns = self.connections.write().await;
        conns.remove(&connection_id);
        tracing::debug!(connection_id = %connection_id, user_id = %user_id, "socket closed");
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

async fn handle_client_message(
    msg: ClientMessage,
    user_id: &str,
    ctx: &WatchContext,
    out_tx: &mpsc::Sender<ServerMessage>,
    watches: &mut Watches,
) {
    match msg {
        ClientMessage::WatchChats => {
            if let Some(previous) = watches.chat_list.take() {
                previous.abort();
            }

            let (tx, mut rx) = mpsc::channel(8);
            let producer = spawn_chat_list_watcher(
                ctx.assembler.clone(),
                ctx.store.clone(),
                user_id.to_string(),
                tx,
            );

            let out = out_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(update) = rx.recv().await {
                    let frame = match update {
                        Ok(chats) => ServerMessage::ChatList { chats },
                        Err(e) => ServerMessage::Error {
                            message: e.to_string(),
                        },
                    };
                    if out.send(frame).await.is_err() {
                        break;
                    }
                }
            });
            watches.chat_list = Some(Watch {
                producer,
                forwarder,
            });
        }
        ClientMessage::WatchChat { chat_id, after_id } => {
            if let Some(previous) = watches.chats.remove(&chat_id) {
                previous.abort();
            }

            let (tx, mut rx) = mpsc::channel(8);
            let producer = spawn_message_poller(
                ctx.store.clone(),
                chat_id,
                user_id.to_string(),
                ctx.poll_interval,
                after_id,
                tx,
            );

            let out = out_tx.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(messages) = rx.recv().await {
                    if out
                        .send(ServerMessage::NewMessages { chat_id, messages })
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
            watches.chats.insert(
                chat_id,
                Watch {
                    producer,
                    forwarder,
                },
            );
        }
        ClientMessage::UnwatchChat { chat_id } => {
            if let Some(watch) = watches.chats.remove(&chat_id) {
                watch.abort();
            }
        }
        ClientMessage::Heartbeat => {
            let _ = out_tx.send(ServerMessage::Pong).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assembler::{AssemblyFailurePolicy, FanOutAssembler};
    use crate::services::chat_creation::ChatCreator;
    use crate::services::message_channel::send_message;
    use crate::test_support::{TestEnv, seed_user};
    use tokio::task::AbortHandle;
    use tokio::time::timeout;

    struct Fixture {
        _env: TestEnv,
        ctx: WatchContext,
        alice: String,
        bob: String,
        chat_id: i64,
    }

    async fn fixture() -> Fixture {
        let env = TestEnv::new().await;
        let alice = seed_user(&env, "alice").await.id;
        let bob = seed_user(&env, "bob").await.id;
        let store: Arc<dyn ChatStore> = Arc::new(env.store.clone());
        let chat_id = ChatCreator::new(store.clone())
            .create_or_reuse_chat(None, &[alice.clone(), bob.clone()])
            .await
            .unwrap()
            .chat_id;

        let ctx = WatchContext {
            assembler: Arc::new(FanOutAssembler::new(
                store.clone(),
                AssemblyFailurePolicy::Abort,
            )),
            store,
            poll_interval: Duration::from_millis(20),
        };

        Fixture {
            _env: env,
            ctx,
            alice,
            bob,
            chat_id,
        }
    }

    async fn next_frame(rx: &mut mpsc::Receiver<ServerMessage>) -> ServerMessage {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    async fn wait_finished(handle: &AbortHandle) {
        timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_watch_chats_streams_lists_and_replaces_watcher() {
        let fx = fixture().await;
        let (out_tx, mut out_rx) = mpsc::channel(32);
        let mut watches = Watches::default();

        handle_client_message(
            ClientMessage::WatchChats,
            &fx.alice,
            &fx.ctx,
            &out_tx,
            &mut watches,
        )
        .await;
        match next_frame(&mut out_rx).await {
            ServerMessage::ChatList { chats } => {
                assert_eq!(chats.len(), 1);
                assert_eq!(chats[0].last_message_text, None);
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        send_message(fx.ctx.store.as_ref(), fx.chat_id, &fx.bob, "woof")
            .await
            .unwrap();
        match next_frame(&mut out_rx).await {
            ServerMessage::ChatList { chats } => {
                assert_eq!(chats[0].last_message_text.as_deref(), Some("woof"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        let old_producer = watches.chat_list.as_ref().unwrap().producer.abort_handle();
        let old_forwarder = watches.chat_list.as_ref().unwrap().forwarder.abort_handle();

        handle_client_message(
            ClientMessage::WatchChats,
            &fx.alice,
            &fx.ctx,
            &out_tx,
            &mut watches,
        )
        .await;
        wait_finished(&old_producer).await;
        wait_finished(&old_forwarder).await;
        assert!(matches!(
            next_frame(&mut out_rx).await,
            ServerMessage::ChatList { .. }
        ));
        assert!(!watches.chat_list.as_ref().unwrap().producer.is_finished());
    }

    #[tokio::test]
    async fn test_watch_chat_polls_until_unwatched() {
        let fx = fixture().await;
        let (out_tx, mut out_rx) = mpsc::channel(32);
        let mut watches = Watches::default();

        handle_client_message(
            ClientMessage::WatchChat {
                chat_id: fx.chat_id,
                after_id: None,
            },
            &fx.bob,
            &fx.ctx,
            &out_tx,
            &mut watches,
        )
        .await;

        send_message(fx.ctx.store.as_ref(), fx.chat_id, &fx.alice, "hi")
            .await
            .unwrap();
        match next_frame(&mut out_rx).await {
            ServerMessage::NewMessages { chat_id, messages } => {
                assert_eq!(chat_id, fx.chat_id);
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "hi");
            }
            other => panic!("unexpected frame: {:?}", other),
        }

        let watch = watches.chats.get(&fx.chat_id).unwrap();
        let producer = watch.producer.abort_handle();
        let forwarder = watch.forwarder.abort_handle();

        handle_client_message(
            ClientMessage::UnwatchChat {
                chat_id: fx.chat_id,
            },
            &fx.bob,
            &fx.ctx,
            &out_tx,
            &mut watches,
        )
        .await;

        assert!(watches.chats.is_empty());
        wait_finished(&producer).await;
        wait_finished(&forwarder).await;

        send_message(fx.ctx.store.as_ref(), fx.chat_id, &fx.alice, "anyone?")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_heartbeat_answers_pong() {
        let fx = fixture().await;
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let mut watches = Watches::default();

        handle_client_message(
            ClientMessage::Heartbeat,
            &fx.alice,
            &fx.ctx,
            &out_tx,
            &mut watches,
        )
        .await;
        assert!(matches!(next_frame(&mut out_rx).await, ServerMessage::Pong));
    }
}
