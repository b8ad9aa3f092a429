//! In-memory conversation storage.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use a2a_relay_core::{
    Conversation, ConversationInfo, ConversationStore, StoreError, record::validate_id,
};
use async_trait::async_trait;

/// In-memory storage implementation.
///
/// Useful for tests and throwaway deployments.
/// Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create(&self, id: &str, working_dir: &str) -> Result<Conversation, StoreError> {
        validate_id(id)?;
        let mut conversations = self
            .conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if conversations.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        let conversation = Conversation::new(id, working_dir);
        conversations.insert(id.to_string(), conversation.clone());
        Ok(conversation)
    }

    async fn load(&self, id: &str) -> Result<Conversation, StoreError> {
        validate_id(id)?;
        self.conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError> {
        validate_id(&conversation.id)?;
        conversation.touch();
        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if validate_id(id).is_err() {
            return Ok(());
        }
        self.conversations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ConversationInfo>, StoreError> {
        let mut result: Vec<ConversationInfo> = self
            .conversations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Conversation::info)
            .collect();

        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }
}
