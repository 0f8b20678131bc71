use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::Error;
use crate::models::NewConversation;
use crate::store::{ConversationStore, StoreError};

/// Assigns a pet owner to exactly one admin conversation. The fast path
/// returns an existing conversation unchanged; creation goes through the
/// store's conditional insert so two racing callers cannot both create
/// one.
pub struct ConversationRouter {
    store: Arc<dyn ConversationStore>,
}

impl ConversationRouter {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub async fn start_conversation(&self, pet_owner_id: i32) -> Result<(i32, i32), Error> {
        let admin_id = self
            .store
            .most_recent_admin()
            .await
            .map_err(|e| Error::from_store(e, "admin"))?
            .ok_or(Error::NoAdminAvailable)?;

        if let Some(existing) = self
            .store
            .latest_between(pet_owner_id, admin_id)
            .await
            .map_err(|e| Error::from_store(e, "conversation"))?
        {
            return Ok((existing.id, admin_id));
        }

        let conversation = self
            .store
            .create_if_absent(NewConversation {
                pet_owner_id,
                admin_id,
                unique_key: Uuid::new_v4().to_string(),
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound => Error::NotFound("conversation"),
                StoreError::Unavailable(source) => Error::Transient(source),
            })?;

        info!(
            "Routed pet owner {} to conversation {} with admin {}",
            pet_owner_id, conversation.id, admin_id
        );

        Ok((conversation.id, admin_id))
    }
}
