//! Session manager for conversations with a remote agent.

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use a2a_relay_core::{
    AgentClient, CallRecorder, Conversation, ConversationInfo, ConversationStore, Event,
    ProtocolError, StoreError,
};
use tokio::sync::{Mutex, MutexGuard, RwLock, TryLockError, mpsc};

use crate::relay::{self, RelayOutcome};

/// A cached conversation.
///
/// Each turn holds the lock from before its agent call until the record
/// has been persisted. Once the conversation is deleted the entry is marked
/// and turns on any remaining handle are refused.
#[derive(Debug)]
pub struct CachedConversation {
    record: Mutex<Conversation>,
    deleted: AtomicBool,
}

impl CachedConversation {
    fn new(record: Conversation) -> Self {
        Self {
            record: Mutex::new(record),
            deleted: AtomicBool::new(false),
        }
    }

    /// Lock the record, waiting for an in-flight turn.
    pub async fn lock(&self) -> MutexGuard<'_, Conversation> {
        self.record.lock().await
    }

    /// Lock the record if no turn holds it.
    ///
    /// # Errors
    /// Returns error if the record is currently locked.
    pub fn try_lock(&self) -> Result<MutexGuard<'_, Conversation>, TryLockError> {
        self.record.try_lock()
    }

    /// Whether the conversation has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    /// Lock the record for a turn, refusing deleted conversations.
    async fn lock_for_turn(&self) -> Result<MutexGuard<'_, Conversation>, StoreError> {
        let guard = self.record.lock().await;
        if self.is_deleted() {
            return Err(StoreError::NotFound(guard.id.clone()));
        }
        Ok(guard)
    }
}

pub type SharedConversation = Arc<CachedConversation>;

/// Cached conversations plus the bookkeeping that keeps a deleted
/// conversation from being loaded back in.
#[derive(Default)]
struct Cache {
    entries: HashMap<String, SharedConversation>,
    /// Entries dropped by `clear_cache` that callers may still hold.
    evicted: HashMap<String, Vec<Weak<CachedConversation>>>,
    /// Deletions in progress, per identifier.
    deleting: HashMap<String, usize>,
    /// Bumped whenever a deletion starts.
    deletions: u64,
}

/// Session manager error.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Turn(#[from] TurnError),
}

/// A turn that was recorded but did not fully succeed.
///
/// `output` is whatever the turn produced before failing. When both the
/// agent call and persistence fail, both errors are kept.
#[derive(Debug)]
pub struct TurnError {
    pub output: String,
    pub agent: Option<ProtocolError>,
    pub persist: Option<StoreError>,
}

impl TurnError {
    fn check(
        output: String,
        agent: Option<ProtocolError>,
        persist: Option<StoreError>,
    ) -> Result<String, Self> {
        if agent.is_none() && persist.is_none() {
            Ok(output)
        } else {
            Err(Self {
                output,
                agent,
                persist,
            })
        }
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.agent, &self.persist) {
            (Some(agent), Some(persist)) => write!(
                f,
                "agent call failed: {agent}; saving the conversation also failed: {persist}"
            ),
            (Some(agent), None) => write!(f, "agent call failed: {agent}"),
            (None, Some(persist)) => write!(f, "saving the conversation failed: {persist}"),
            (None, None) => f.write_str("turn failed"),
        }
    }
}

impl std::error::Error for TurnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match (&self.agent, &self.persist) {
            (Some(agent), _) => Some(agent),
            (None, Some(persist)) => Some(persist),
            (None, None) => None,
        }
    }
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Session manager for conversations with a remote agent.
///
/// Owns the in-memory conversation cache. The cache lock is only held for
/// lookup and insertion, never across storage or agent I/O.
pub struct SessionManager<S, C>
where
    S: ConversationStore,
    C: AgentClient,
{
    store: S,
    client: C,
    recorder: Arc<dyn CallRecorder>,
    cache: RwLock<Cache>,
}

impl<S, C> SessionManager<S, C>
where
    S: ConversationStore,
    C: AgentClient,
{
    /// Create a new session manager.
    #[must_use]
    pub fn new(store: S, client: C, recorder: Arc<dyn CallRecorder>) -> Self {
        Self {
            store,
            client,
            recorder,
            cache: RwLock::new(Cache::default()),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Get a conversation, loading it from storage on first access.
    ///
    /// A cached conversation has its last access refreshed in memory,
    /// unless a turn currently holds it. A conversation that is being
    /// deleted is reported as not found.
    ///
    /// # Errors
    /// Returns error if the conversation cannot be loaded.
    pub async fn acquire(&self, id: &str) -> Result<SharedConversation, ManagerError> {
        loop {
            let deletions = {
                let cache = self.cache.read().await;
                if let Some(conversation) = cache.entries.get(id) {
                    if let Ok(mut guard) = conversation.try_lock() {
                        guard.touch();
                    }
                    return Ok(Arc::clone(conversation));
                }
                if cache.deleting.contains_key(id) {
                    return Err(StoreError::NotFound(id.to_string()).into());
                }
                cache.deletions
            };

            let loaded = self.store.load(id).await?;

            let mut cache = self.cache.write().await;
            if let Some(conversation) = cache.entries.get(id) {
                return Ok(Arc::clone(conversation));
            }
            if cache.deletions != deletions {
                tracing::debug!(conversation_id = id, "Deletion raced with load, retrying");
                continue;
            }
            tracing::debug!(conversation_id = id, "Loaded conversation from storage");
            let conversation = Arc::new(CachedConversation::new(loaded));
            cache.entries.insert(id.to_string(), Arc::clone(&conversation));
            return Ok(conversation);
        }
    }

    /// Create and persist a new, empty conversation.
    ///
    /// # Errors
    /// Returns error if the conversation already exists or cannot be stored.
    pub async fn create_session(
        &self,
        id: &str,
        working_dir: &str,
    ) -> Result<SharedConversation, ManagerError> {
        let record = self.store.create(id, working_dir).await?;
        let conversation = Arc::new(CachedConversation::new(record));
        self.cache
            .write()
            .await
            .entries
            .insert(id.to_string(), Arc::clone(&conversation));
        tracing::info!(conversation_id = id, working_dir, "Session created");
        Ok(conversation)
    }

    /// Forget a conversation and delete its durable record.
    ///
    /// Waits for an in-flight turn on the conversation to finish first.
    /// Later turns on a handle to the deleted conversation fail with
    /// `StoreError::NotFound`. Deleting an unknown conversation succeeds.
    ///
    /// # Errors
    /// Returns error if the durable record cannot be removed.
    pub async fn delete_session(&self, id: &str) -> Result<(), ManagerError> {
        let handles: Vec<SharedConversation> = {
            let mut cache = self.cache.write().await;
            cache.deletions += 1;
            *cache.deleting.entry(id.to_string()).or_default() += 1;
            let evicted = cache.evicted.remove(id).unwrap_or_default();
            cache
                .entries
                .remove(id)
                .into_iter()
                .chain(evicted.iter().filter_map(Weak::upgrade))
                .collect()
        };

        let result = self.retire(id, &handles).await;

        {
            let mut cache = self.cache.write().await;
            let remaining = cache.deleting.get_mut(id).map(|count| {
                *count -= 1;
                *count
            });
            if remaining == Some(0) {
                cache.deleting.remove(id);
            }
        }

        result?;
        tracing::info!(conversation_id = id, "Session deleted");
        Ok(())
    }

    async fn retire(&self, id: &str, handles: &[SharedConversation]) -> Result<(), StoreError> {
        for conversation in handles {
            let _turn = conversation.lock().await;
            conversation.deleted.store(true, Ordering::Release);
        }
        self.store.delete(id).await
    }

    /// List stored conversations.
    ///
    /// # Errors
    /// Returns error if the storage cannot be enumerated.
    pub async fn list_conversations(&self) -> Result<Vec<ConversationInfo>, ManagerError> {
        Ok(self.store.list().await?)
    }

    /// Drop every cached conversation.
    ///
    /// Subsequent access reloads from storage. Every completed turn has
    /// already been persisted, so nothing is lost. Handles callers still
    /// hold keep working until their conversation is deleted.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        let Cache {
            entries, evicted, ..
        } = &mut *cache;
        evicted.retain(|_, handles| {
            handles.retain(|handle| handle.strong_count() > 0);
            !handles.is_empty()
        });
        for (id, conversation) in entries.drain() {
            evicted
                .entry(id)
                .or_default()
                .push(Arc::downgrade(&conversation));
        }
    }

    /// Send a prompt and wait for the agent's reply.
    ///
    /// The turn is recorded and persisted even when the agent call fails.
    ///
    /// # Errors
    /// Returns `ManagerError::Turn` carrying the partial reply if the agent
    /// call or persistence failed.
    pub async fn run_prompt(
        &self,
        conversation: &SharedConversation,
        prompt: &str,
    ) -> Result<String, ManagerError> {
        let mut conv = conversation.lock_for_turn().await?;
        let started = Instant::now();
        let result = self.client.send_message(&conv.id, prompt).await;
        let latency = started.elapsed();

        let (reply, agent_error) = match result {
            Ok(reply) => (reply, None),
            Err(e) => {
                tracing::warn!(conversation_id = %conv.id, error = %e, "Agent call failed");
                (String::new(), Some(e))
            }
        };
        self.recorder
            .record_call(latency, char_count(prompt), char_count(&reply));

        conv.record_turn(prompt, &reply);
        let persist_error = self.persist(&mut conv).await;
        TurnError::check(reply, agent_error, persist_error).map_err(ManagerError::from)
    }

    /// Send a prompt as a deferred task, returning the task ID.
    ///
    /// The history records a placeholder for the task's reply.
    ///
    /// # Errors
    /// Returns `ManagerError::Turn` if the agent call or persistence failed.
    pub async fn run_prompt_as_task(
        &self,
        conversation: &SharedConversation,
        prompt: &str,
    ) -> Result<String, ManagerError> {
        let mut conv = conversation.lock_for_turn().await?;
        let started = Instant::now();
        let result = self.client.send_task(&conv.id, prompt).await;
        let latency = started.elapsed();

        let (task_id, agent_error) = match result {
            Ok(task_id) => (task_id, None),
            Err(e) => {
                tracing::warn!(conversation_id = %conv.id, error = %e, "Task creation failed");
                (String::new(), Some(e))
            }
        };
        self.recorder.record_call(latency, char_count(prompt), 0);

        conv.record_turn(prompt, &format!("(task {task_id})"));
        tracing::info!(conversation_id = %conv.id, task_id = %task_id, "Task submitted");
        let persist_error = self.persist(&mut conv).await;
        TurnError::check(task_id, agent_error, persist_error).map_err(ManagerError::from)
    }

    /// Stream a prompt, forwarding every event to `sink`.
    ///
    /// Returns the accumulated reply text. A stream that fails part way
    /// still records and persists the partial reply.
    ///
    /// # Errors
    /// Returns `ManagerError::Turn` carrying the partial reply if the stream
    /// or persistence failed.
    pub async fn run_prompt_stream(
        &self,
        conversation: &SharedConversation,
        prompt: &str,
        sink: mpsc::Sender<Event>,
    ) -> Result<String, ManagerError> {
        let mut conv = conversation.lock_for_turn().await?;
        let started = Instant::now();
        let RelayOutcome {
            text,
            state,
            error,
            events,
        } = relay::relay(&self.client, &mut conv, prompt, sink).await;
        let latency = started.elapsed();
        tracing::info!(conversation_id = %conv.id, ?state, events, "Stream finished");

        self.recorder
            .record_call(latency, char_count(prompt), char_count(&text));

        conv.record_turn(prompt, &text);
        let persist_error = self.persist(&mut conv).await;
        TurnError::check(text, error, persist_error).map_err(ManagerError::from)
    }

    async fn persist(&self, conversation: &mut Conversation) -> Option<StoreError> {
        match self.store.save(conversation).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(conversation_id = %conversation.id, error = %e, "Failed to save conversation");
                Some(e)
            }
        }
    }
}
