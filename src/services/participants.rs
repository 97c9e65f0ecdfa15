use crate::store::ChatStore;
use crate::utils::error::AppResult;
use crate::utils::validation::validate_user_id;

/// Chat ids `user_id` belongs to, distinct and in store order. A user with no
/// memberships gets an empty list. Distinctness comes from the
/// [`ChatStore::chat_ids_for_user`] contract.
pub async fn list_chat_ids_for_user(store: &dyn ChatStore, user_id: &str) -> AppResult<Vec<i64>> {
    validate_user_id(user_id)?;

    store.chat_ids_for_user(user_id).await
}

/// Participant user ids of one chat.
pub async fn participant_ids(store: &dyn ChatStore, chat_id: i64) -> AppResult<Vec<String>> {
    let participants = store.participants_of(chat_id).await?;
    Ok(participants.into_iter().map(|p| p.user_id).collect())
}
