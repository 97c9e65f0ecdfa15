use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::chat::ChatCreation;
use crate::services::participants::{list_chat_ids_for_user, participant_ids};
use crate::store::ChatStore;
use crate::utils::error::{AppError, AppResult};

/// Opens chats, reusing an existing one when the exact member set (and
/// animal context) already has a chat.
///
/// Creation runs under a process-wide lock so two identical requests cannot
/// both miss the dedup scan and insert twice. Separate processes sharing a
/// database can still race.
pub struct ChatCreator {
    store: Arc<dyn ChatStore>,
    lock: Mutex<()>,
}

/// Trims, drops blanks and duplicates, keeps first-seen order.
pub fn normalize_participants(participant_ids: &[String]) -> AppResult<Vec<String>> {
    let ids: Vec<String> = participant_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .unique()
        .map(str::to_string)
        .collect();

    if ids.len() < 2 {
        return Err(AppError::Validation(
            "A chat needs at least two distinct participants".to_string(),
        ));
    }

    Ok(ids)
}

impl ChatCreator {
    pub fn new(store: Arc<dyn ChatStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn create_or_reuse_chat(
        &self,
        animal_id: Option<&str>,
        participant_ids: &[String],
    ) -> AppResult<ChatCreation> {
        let requested = normalize_participants(participant_ids)?;
        let _guard = self.lock.lock().await;

        if let Some(chat_id) = self.find_existing(animal_id, &requested).await? {
            tracing::debug!(chat_id, "reusing existing chat");
            return Ok(ChatCreation {
                chat_id,
                reused: true,
            });
        }

        let chat = self.store.insert_chat(animal_id).await?;

        for user_id in &requested {
            if let Err(err) = self.store.insert_participant(chat.id, user_id).await {
                return Err(self.roll_back(chat.id, err).await);
            }
        }

        tracing::info!(
            chat_id = chat.id,
            participants = requested.len(),
            "created chat"
        );

        Ok(ChatCreation {
            chat_id: chat.id,
            reused: false,
        })
    }

    /// First candidate in membership order whose member set equals `requested`.
    async fn find_existing(
        &self,
        animal_id: Option<&str>,
        requested: &[String],
    ) -> AppResult<Option<i64>> {
        let store = self.store.as_ref();
        let initiator = &requested[0];

        let candidates = list_chat_ids_for_user(store, initiator).await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let contexts: HashMap<i64, Option<String>> = store
            .chats_by_ids(&candidates)
            .await?
            .into_iter()
            .map(|chat| (chat.id, chat.animal_id))
            .collect();

        let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();

        for chat_id in candidates {
            let same_context = contexts
                .get(&chat_id)
                .is_some_and(|context| context.as_deref() == animal_id);
            if !same_context {
                continue;
            }

            let members = participant_ids(store, chat_id).await?;
            let members: HashSet<&str> = members.iter().map(String::as_str).collect();
            if members == wanted {
                return Ok(Some(chat_id));
            }
        }

        Ok(None)
    }

    async fn roll_back(&self, chat_id: i64, cause: AppError) -> AppError {
        tracing::warn!(chat_id, "participant insert failed, deleting chat: {}", cause);

        let rolled_back = match self.store.delete_chat(chat_id).await {
            Ok(()) => true,
            Err(cleanup) => {
                tracing::error!(
                    chat_id,
                    "compensating delete failed, chat row left behind: {} (after: {})",
                    cleanup,
                    cause
                );
                false
            }
        };

        AppError::ChatCreation {
            message: cause.to_string(),
            rolled_back,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        InstrumentedStore, TestEnv, count_rows, seed_user, seed_user_with_id,
    };

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_reversed_pair_reuses_chat() {
        let env = TestEnv::new().await;
        seed_user_with_id(&env, "a1", "alice").await;
        seed_user_with_id(&env, "b1", "bob").await;
        let creator = ChatCreator::new(Arc::new(env.store.clone()));

        let first = creator
            .create_or_reuse_chat(None, &ids(&["a1", "b1"]))
            .await
            .unwrap();
        let second = creator
            .create_or_reuse_chat(None, &ids(&["b1", "a1"]))
            .await
            .unwrap();

        assert!(!first.reused);
        assert!(second.reused);
        assert_eq!(first.chat_id, second.chat_id);
        assert_eq!(count_rows(&env, "chats").await, 1);
        assert_eq!(count_rows(&env, "chat_participants").await, 2);
    }

    #[tokio::test]
    async fn test_superset_chat_not_reused() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let b = seed_user(&env, "bob").await;
        let c = seed_user(&env, "carol").await;
        let creator = ChatCreator::new(Arc::new(env.store.clone()));

        let group = creator
            .create_or_reuse_chat(None, &[a.id.clone(), b.id.clone(), c.id.clone()])
            .await
            .unwrap();
        let pair = creator
            .create_or_reuse_chat(None, &[a.id.clone(), b.id.clone()])
            .await
            .unwrap();

        assert_ne!(group.chat_id, pair.chat_id);
        assert!(!pair.reused);
    }

    #[tokio::test]
    async fn test_animal_context_separates_chats() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let b = seed_user(&env, "bob").await;
        let creator = ChatCreator::new(Arc::new(env.store.clone()));
        let pair = vec![a.id.clone(), b.id.clone()];

        let rex = creator.create_or_reuse_chat(Some("rex"), &pair).await.unwrap();
        let tom = creator.create_or_reuse_chat(Some("tom"), &pair).await.unwrap();
        let rex_again = creator.create_or_reuse_chat(Some("rex"), &pair).await.unwrap();

        assert_ne!(rex.chat_id, tom.chat_id);
        assert_eq!(rex.chat_id, rex_again.chat_id);
    }

    #[tokio::test]
    async fn test_needs_two_distinct_participants() {
        let env = TestEnv::new().await;
        let creator = ChatCreator::new(Arc::new(env.store.clone()));

        let result = creator
            .create_or_reuse_chat(None, &ids(&["a1", " a1 ", ""]))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(count_rows(&env, "chats").await, 0);
    }

    #[tokio::test]
    async fn test_failed_participant_insert_rolls_back() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let b = seed_user(&env, "bob").await;
        let store = Arc::new(InstrumentedStore::new(env.store.clone()));
        store.fail_participant_insert_for(&b.id);
        let creator = ChatCreator::new(store.clone());

        let result = creator
            .create_or_reuse_chat(None, &[a.id.clone(), b.id.clone()])
            .await;

        match result {
            Err(AppError::ChatCreation {
                message,
                rolled_back,
            }) => {
                assert!(rolled_back);
                assert!(message.contains("injected failure"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(store.count("delete_chat"), 1);
        assert_eq!(count_rows(&env, "chats").await, 0);
        assert_eq!(count_rows(&env, "chat_participants").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_user_rolls_back() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let creator = ChatCreator::new(Arc::new(env.store.clone()));

        let result = creator
            .create_or_reuse_chat(None, &[a.id.clone(), "ghost".to_string()])
            .await;

        assert!(matches!(
            result,
            Err(AppError::ChatCreation {
                rolled_back: true,
                ..
            })
        ));
        assert_eq!(count_rows(&env, "chats").await, 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_is_reported() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let b = seed_user(&env, "bob").await;
        let store = Arc::new(InstrumentedStore::new(env.store.clone()));
        store.fail_participant_insert_for(&b.id);
        store.fail_deletes();
        let creator = ChatCreator::new(store);

        let result = creator
            .create_or_reuse_chat(None, &[a.id.clone(), b.id.clone()])
            .await;

        assert!(matches!(
            result,
            Err(AppError::ChatCreation {
                rolled_back: false,
                ..
            })
        ));
        assert_eq!(count_rows(&env, "chats").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_identical_requests_create_one_chat() {
        let env = TestEnv::new().await;
        let a = seed_user(&env, "alice").await;
        let b = seed_user(&env, "bob").await;
        let creator = Arc::new(ChatCreator::new(Arc::new(env.store.clone())));

        let forward = vec![a.id.clone(), b.id.clone()];
        let backward = vec![b.id.clone(), a.id.clone()];
        let (left, right) = tokio::join!(
            creator.create_or_reuse_chat(None, &forward),
            creator.create_or_reuse_chat(None, &backward)
        );

        assert_eq!(left.unwrap().chat_id, right.unwrap().chat_id);
        assert_eq!(count_rows(&env, "chats").await, 1);
    }
}
