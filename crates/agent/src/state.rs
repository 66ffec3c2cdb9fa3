use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hrdesk_core::OrchestrationError;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// A transactional workflow in progress: which definition, which slots are
/// already filled (canonical values), and whether the final confirmation
/// question is outstanding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveWorkflow {
    pub workflow: String,
    pub slots: BTreeMap<String, String>,
    pub awaiting_confirmation: bool,
}

impl ActiveWorkflow {
    pub fn new(workflow: impl Into<String>) -> Self {
        Self { workflow: workflow.into(), slots: BTreeMap::new(), awaiting_confirmation: false }
    }
}

/// Everything remembered about one conversation between turns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    pub conversation_id: String,
    pub workflow: Option<ActiveWorkflow>,
    /// Accepted turns in the current workflow; a rejected slot value does
    /// not advance it.
    pub turns: u32,
    pub last_activity: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            workflow: None,
            turns: 0,
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Per-conversation dialog state. `lease` hands back a guard held for the
/// whole turn so two turns in the same conversation never interleave;
/// different conversations proceed independently.
#[async_trait]
pub trait DialogStateStore: Send + Sync {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationState>, OrchestrationError>;
    async fn put(&self, state: ConversationState) -> Result<(), OrchestrationError>;
    async fn clear(&self, conversation_id: &str) -> Result<(), OrchestrationError>;
    async fn lease(&self, conversation_id: &str) -> OwnedMutexGuard<()>;
}

/// In-process store. Idle expiry is lazy: state older than the idle window
/// is dropped on the next read rather than by a background sweeper, which
/// keeps behavior deterministic under test.
pub struct InMemoryStateStore {
    idle_window: chrono::Duration,
    states: RwLock<HashMap<String, ConversationState>>,
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InMemoryStateStore {
    pub fn new(idle_window: chrono::Duration) -> Self {
        Self {
            idle_window,
            states: RwLock::new(HashMap::new()),
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn is_expired(&self, state: &ConversationState, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(state.last_activity) > self.idle_window
    }

    /// Drops lock entries that are neither leased right now nor backed by
    /// stored state, so finished conversations do not accumulate entries
    /// for the lifetime of the process. An entry whose lease is still held
    /// (strong count above the registry's own reference) is kept.
    async fn prune_idle_locks(&self) {
        let live: Vec<String> = self.states.read().await.keys().cloned().collect();
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|id, lock| Arc::strong_count(lock) > 1 || live.contains(id));
    }
}

#[async_trait]
impl DialogStateStore for InMemoryStateStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<ConversationState>, OrchestrationError> {
        let now = Utc::now();

        let expired = {
            let states = self.states.read().await;
            match states.get(conversation_id) {
                Some(state) if self.is_expired(state, now) => true,
                Some(state) => return Ok(Some(state.clone())),
                None => return Ok(None),
            }
        };

        if expired {
            self.states.write().await.remove(conversation_id);
            self.prune_idle_locks().await;
        }
        Ok(None)
    }

    async fn put(&self, state: ConversationState) -> Result<(), OrchestrationError> {
        self.states.write().await.insert(state.conversation_id.clone(), state);
        Ok(())
    }

    async fn clear(&self, conversation_id: &str) -> Result<(), OrchestrationError> {
        self.states.write().await.remove(conversation_id);
        self.prune_idle_locks().await;
        Ok(())
    }

    async fn lease(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(locks.entry(conversation_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }
}
