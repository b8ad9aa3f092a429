//! JSON file conversation storage.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use a2a_relay_core::{
    Conversation, ConversationInfo, ConversationStore, StoreError, record::validate_id,
};
use async_trait::async_trait;

/// Location of conversation files below a base directory.
pub const CONVERSATIONS_DIR: [&str; 2] = ["data", "conversations"];

const EXTENSION: &str = ".json";
const TMP_EXTENSION: &str = ".json.tmp";

/// Stores one pretty-printed JSON file per conversation.
///
/// Saves write a temporary sibling file and rename it into place, so a
/// crash never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { root: root.into() };
        store.prepare().await?;
        Ok(store)
    }

    /// Open the store at the conventional location below `base_dir`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub async fn under(base_dir: &Path) -> Result<Self, StoreError> {
        Self::open(base_dir.join(CONVERSATIONS_DIR[0]).join(CONVERSATIONS_DIR[1])).await
    }

    /// Directory holding the conversation files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}{EXTENSION}"))
    }

    async fn prepare(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StoreError::io("creating conversation directory", &self.root, source))
    }

    async fn write(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let path = self.path_for(&conversation.id);
        let tmp = self.root.join(format!(".{}{TMP_EXTENSION}", conversation.id));
        let bytes = serde_json::to_vec_pretty(conversation).map_err(|e| {
            StoreError::io("serializing conversation", &path, std::io::Error::other(e))
        })?;

        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| StoreError::io("writing conversation file", &tmp, source))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|source| StoreError::io("replacing conversation file", &path, source))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn create(&self, id: &str, working_dir: &str) -> Result<Conversation, StoreError> {
        validate_id(id)?;
        self.prepare().await?;

        let path = self.path_for(id);
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::io("checking conversation file", &path, source))?;
        if exists {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let mut conversation = Conversation::new(id, working_dir);
        self.save(&mut conversation).await?;
        tracing::info!(conversation_id = id, "Created conversation");
        Ok(conversation)
    }

    async fn load(&self, id: &str) -> Result<Conversation, StoreError> {
        validate_id(id)?;
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(source) => {
                return Err(StoreError::io("reading conversation file", &path, source));
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    async fn save(&self, conversation: &mut Conversation) -> Result<(), StoreError> {
        validate_id(&conversation.id)?;
        conversation.touch();
        self.write(conversation).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if validate_id(id).is_err() {
            return Ok(());
        }
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(conversation_id = id, "Deleted conversation");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::io("deleting conversation file", &path, source)),
        }
    }

    async fn list(&self) -> Result<Vec<ConversationInfo>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|source| StoreError::io("reading conversation directory", &self.root, source))?;

        let mut ids = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|source| {
                StoreError::io("reading conversation directory", &self.root, source)
            })?;
            let Some(entry) = entry else { break };

            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(EXTENSION))
            else {
                continue;
            };
            if validate_id(id).is_ok() && entry.path().is_file() {
                ids.push(id.to_string());
            }
        }
        ids.sort();

        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            match self.load(&id).await {
                Ok(conversation) => conversations.push(conversation.info()),
                Err(e) => {
                    tracing::warn!(conversation_id = %id, error = %e, "Skipping unreadable conversation");
                }
            }
        }
        Ok(conversations)
    }
}
