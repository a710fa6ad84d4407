//! Conversation manager: active conversation, thread and turn orchestration.
//!
//! The manager is bound to one owner profile. Every mutation goes through it,
//! and every change is published on a `watch` channel so presentation code can
//! re-render without blocking on in-flight turns.

pub mod reconcile;
pub mod session;

pub use session::{Delivery, SessionPhase, SessionState, ThreadMessage};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::category::Category;
use crate::core::clock::MonotonicClock;
use crate::core::config::ResponderConfig;
use crate::core::errors::{ChatError, ChatResult};
use crate::core::ids::{ConversationId, ProfileId};
use crate::core::models::{
    Conversation, ConversationPatch, Message, NewConversation, NewMessage, Role, derive_title,
};
use crate::responder::{ChatReply, ChatRequest, Responder};
use crate::storage::{ChatStore, SortOrder};

use self::reconcile::{mark_unsaved, reconcile};

/// Assistant text shown when the responder cannot be reached.
pub const FALLBACK_REPLY: &str = "I apologize, but I encountered an error. Please make sure the chat edge function is deployed and configured properly.";

/// Timeout and retry policy for responder calls.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CallPolicy {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Extra attempts after a retryable failure.
    pub max_retries: u32,
    /// Backoff before the first retry, doubled after each one.
    pub retry_backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from(&ResponderConfig::default())
    }
}

impl From<&ResponderConfig> for CallPolicy {
    fn from(config: &ResponderConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

/// Result of one `send_message` turn.
#[derive(Clone, Debug)]
pub enum TurnOutcome {
    /// The responder answered.
    Replied {
        /// Stored user message.
        user: Message,
        /// Assistant entry as shown in the thread.
        reply: ThreadMessage,
    },
    /// The responder failed; the fixed fallback text was shown instead.
    Fallback {
        /// Stored user message.
        user: Message,
        /// Fallback entry as shown in the thread.
        reply: ThreadMessage,
        /// Responder failure, for diagnostics.
        error: String,
    },
}

impl TurnOutcome {
    /// The stored user message.
    #[must_use]
    pub const fn user(&self) -> &Message {
        match self {
            Self::Replied { user, .. } | Self::Fallback { user, .. } => user,
        }
    }

    /// The assistant entry appended by the turn.
    #[must_use]
    pub const fn reply(&self) -> &ThreadMessage {
        match self {
            Self::Replied { reply, .. } | Self::Fallback { reply, .. } => reply,
        }
    }

    /// Whether the fallback text was used.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }
}

/// Owner-scoped conversation manager.
pub struct ConversationManager {
    owner: ProfileId,
    store: Arc<dyn ChatStore>,
    responder: Arc<dyn Responder>,
    policy: CallPolicy,
    clock: MonotonicClock,
    state: watch::Sender<SessionState>,
}

impl ConversationManager {
    /// Create a manager for `owner`.
    #[must_use]
    pub fn new(owner: ProfileId, store: Arc<dyn ChatStore>, responder: Arc<dyn Responder>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            owner,
            store,
            responder,
            policy: CallPolicy::default(),
            clock: MonotonicClock::new(),
            state,
        }
    }

    /// Replace the responder call policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Owner profile.
    #[must_use]
    pub const fn owner(&self) -> ProfileId {
        self.owner
    }

    /// Copy of the current session state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver notified after every mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Clear the error banner.
    pub fn dismiss_error(&self) {
        self.state.send_if_modified(|state| state.last_error.take().is_some());
    }

    /// Load the conversation list and select the most recent conversation if
    /// none is active.
    pub async fn open(&self) -> Vec<Conversation> {
        self.state.send_modify(|state| state.phase = SessionPhase::Loading);
        let conversations = self.list_conversations().await;

        let active = self.state.borrow().active_id();
        match (active, conversations.first()) {
            (None, Some(latest)) => {
                self.select_conversation(latest.id).await;
            }
            _ => self.state.send_modify(|state| state.phase = SessionPhase::Displayed),
        }
        info!(
            "Session opened for {} with {} conversations",
            self.owner,
            conversations.len()
        );
        conversations
    }

    /// Conversations of the owner, most recently updated first.
    ///
    /// On store failure the cached list is returned and the error banner set.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        match self
            .store
            .list_conversations(self.owner, SortOrder::Descending)
            .await
        {
            Ok(conversations) => {
                let listed = conversations.clone();
                self.state.send_modify(|state| {
                    let fresh = state
                        .active_id()
                        .and_then(|active| conversations.iter().find(|c| c.id == active));
                    if let Some(fresh) = fresh {
                        state.active = Some(fresh.clone());
                    }
                    state.conversations = conversations;
                });
                listed
            }
            Err(err) => {
                warn!("Failed to list conversations: {err}");
                self.report(format!("Could not load conversations: {err}"));
                self.state.borrow().conversations.clone()
            }
        }
    }

    /// Make `id` the active conversation and load its thread.
    ///
    /// A conversation that no longer exists (or belongs to someone else)
    /// yields an empty thread and no active conversation; it is dropped from
    /// the cached list. Returns the active conversation.
    pub async fn select_conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.state.send_modify(|state| state.phase = SessionPhase::Loading);

        let conversation = match self.store.get_conversation(id).await {
            Ok(found) => found.filter(|c| c.owner_id == self.owner),
            Err(err) => {
                warn!("Failed to load conversation {id}: {err}");
                self.report(format!("Could not load conversation: {err}"));
                self.state
                    .borrow()
                    .conversations
                    .iter()
                    .find(|c| c.id == id)
                    .cloned()
            }
        };

        let Some(conversation) = conversation else {
            debug!("Conversation {id} is gone, clearing thread");
            self.state.send_modify(|state| {
                state.forget_conversation(id);
                state.active = None;
                state.thread.clear();
                state.phase = SessionPhase::Displayed;
            });
            return None;
        };

        let thread = match self.store.list_messages(id, SortOrder::Ascending).await {
            Ok(messages) => messages.into_iter().map(ThreadMessage::from).collect(),
            Err(err) => {
                warn!("Failed to load messages of {id}: {err}");
                self.report(format!("Could not load messages: {err}"));
                Vec::new()
            }
        };

        let active = conversation.clone();
        self.state.send_modify(|state| {
            state.active = Some(conversation);
            state.thread = thread;
            state.phase = SessionPhase::Displayed;
        });
        Some(active)
    }

    /// Create a conversation with the default title and make it active.
    ///
    /// # Errors
    /// Returns a persistence error if the store rejects the insert.
    pub async fn create_conversation(&self, category: Category) -> ChatResult<Conversation> {
        let created = match self
            .store
            .insert_conversation(NewConversation::new(self.owner, category))
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let err = as_persistence(err);
                self.report(err.to_string());
                return Err(err);
            }
        };

        info!("Conversation {} created ({})", created.id, category);
        let active = created.clone();
        self.state.send_modify(|state| {
            state.forget_conversation(created.id);
            state.conversations.insert(0, created.clone());
            state.active = Some(created);
            state.thread.clear();
            state.phase = SessionPhase::Displayed;
        });
        Ok(active)
    }

    /// Run one chat turn in the active conversation.
    ///
    /// Responder failures never escape: they produce a fallback reply and set
    /// the error banner.
    ///
    /// # Errors
    /// Returns a validation error for blank content and a persistence error if
    /// the conversation or the user message cannot be stored.
    pub async fn send_message(&self, content: &str) -> ChatResult<TurnOutcome> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::Validation(
                "message content is empty".to_string(),
            ));
        }

        let active = self.state.borrow().active.clone();
        let conversation = match active {
            Some(active) => active,
            None => self.create_conversation(Category::General).await?,
        };
        let conversation_id = conversation.id;

        let local = ThreadMessage::local(conversation_id, Role::User, content, self.clock.now());
        let local_id = local.id;
        let mut first_message = false;
        self.state.send_modify(|state| {
            first_message = state.thread.is_empty();
            state.thread.push(local);
            state.phase = SessionPhase::Sending;
        });

        let user = match self
            .store
            .insert_message(NewMessage::user(conversation_id, content))
            .await
        {
            Ok(stored) => {
                self.confirm(&stored);
                stored
            }
            Err(err) => {
                let err = as_persistence(err);
                warn!("Failed to store user message: {err}");
                self.state.send_modify(|state| {
                    if let Some(index) = state.thread.iter().position(|m| m.id == local_id) {
                        mark_unsaved(&mut state.thread, index);
                    }
                    state.phase = SessionPhase::Displayed;
                    state.last_error = Some(err.to_string());
                });
                return Err(err);
            }
        };

        if first_message {
            self.retitle(conversation_id, content).await;
        }

        self.state.send_modify(|state| state.pending = true);
        let outcome = match self
            .call_responder(ChatRequest::new(content, conversation_id))
            .await
        {
            Ok(ChatReply { response }) => {
                let reply = self.append_assistant(conversation_id, response, false).await;
                self.touch(conversation_id).await;
                TurnOutcome::Replied { user, reply }
            }
            Err(err) => {
                warn!("Responder failed for {conversation_id}: {err}");
                self.report(format!("Assistant unavailable: {err}"));
                let reply = self
                    .append_assistant(conversation_id, FALLBACK_REPLY.to_string(), true)
                    .await;
                TurnOutcome::Fallback {
                    user,
                    reply,
                    error: err.to_string(),
                }
            }
        };

        self.state.send_modify(|state| {
            state.pending = false;
            state.phase = SessionPhase::Displayed;
        });
        Ok(outcome)
    }

    /// Delete a conversation and its messages.
    ///
    /// If it was active, the most recently updated remaining conversation is
    /// selected, or none.
    ///
    /// # Errors
    /// Returns a persistence error if the store rejects the delete, and a
    /// validation error if the conversation belongs to another profile.
    pub async fn delete_conversation(&self, id: ConversationId) -> ChatResult<()> {
        let foreign = matches!(
            self.store.get_conversation(id).await,
            Ok(Some(found)) if found.owner_id != self.owner
        );
        if foreign {
            return Err(ChatError::Validation(format!(
                "conversation {id} belongs to another profile"
            )));
        }

        if let Err(err) = self.store.delete_conversation(id).await {
            let err = as_persistence(err);
            warn!("Failed to delete conversation {id}: {err}");
            self.report(err.to_string());
            return Err(err);
        }
        info!("Conversation {id} deleted");

        let mut next = None;
        self.state.send_modify(|state| {
            state.forget_conversation(id);
            if state.active_id() == Some(id) {
                state.active = None;
                state.thread.clear();
                next = state.conversations.first().map(|c| c.id);
            }
        });

        if let Some(next) = next {
            self.select_conversation(next).await;
        }
        Ok(())
    }

    async fn call_responder(&self, request: ChatRequest) -> ChatResult<ChatReply> {
        let mut attempt = 0;
        let mut backoff = self.policy.retry_backoff;
        loop {
            let result = tokio::time::timeout(
                self.policy.timeout,
                self.responder.respond(request.clone()),
            )
            .await
            .unwrap_or(Err(ChatError::Timeout(self.policy.timeout)));

            match result {
                Err(err) if err.is_retryable() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    warn!(
                        "Responder attempt {attempt} failed: {err}; retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                other => return other,
            }
        }
    }

    async fn append_assistant(
        &self,
        conversation_id: ConversationId,
        content: String,
        fallback: bool,
    ) -> ThreadMessage {
        let mut local =
            ThreadMessage::local(conversation_id, Role::Assistant, &content, self.clock.now());
        local.fallback = fallback;
        let local_id = local.id;
        self.state.send_modify(|state| state.thread.push(local));

        let index = match self
            .store
            .insert_message(NewMessage::assistant(conversation_id, content))
            .await
        {
            Ok(stored) => self.confirm(&stored),
            Err(err) => {
                warn!("Failed to store assistant message: {err}");
                let mut index = None;
                self.state.send_modify(|state| {
                    index = state.thread.iter().position(|m| m.id == local_id);
                    if let Some(index) = index {
                        mark_unsaved(&mut state.thread, index);
                    }
                    state.last_error = Some(as_persistence(err).to_string());
                });
                index
            }
        };

        let state = self.state.borrow();
        index
            .and_then(|index| state.thread.get(index))
            .cloned()
            .unwrap_or_else(|| {
                ThreadMessage::local(conversation_id, Role::Assistant, "", self.clock.now())
            })
    }

    fn confirm(&self, stored: &Message) -> Option<usize> {
        let mut index = None;
        self.state.send_modify(|state| {
            index = reconcile(&mut state.thread, stored);
        });
        if index.is_none() {
            debug!("No pending entry for message {}", stored.id);
        }
        index
    }

    async fn retitle(&self, conversation_id: ConversationId, content: &str) {
        let title = derive_title(content);
        match self
            .store
            .update_conversation(conversation_id, ConversationPatch::title(title))
            .await
        {
            Ok(updated) => {
                self.state
                    .send_modify(|state| state.upsert_conversation(updated));
                self.list_conversations().await;
            }
            Err(err) => {
                warn!("Failed to set title of {conversation_id}: {err}");
                self.report(as_persistence(err).to_string());
            }
        }
    }

    async fn touch(&self, conversation_id: ConversationId) {
        match self
            .store
            .update_conversation(conversation_id, ConversationPatch::touch())
            .await
        {
            Ok(updated) => self
                .state
                .send_modify(|state| state.upsert_conversation(updated)),
            Err(err) => {
                warn!("Failed to touch {conversation_id}: {err}");
                self.report(as_persistence(err).to_string());
            }
        }
    }

    fn report(&self, message: String) {
        self.state
            .send_modify(|state| state.last_error = Some(message));
    }
}

fn as_persistence(err: ChatError) -> ChatError {
    if err.is_persistence() {
        err
    } else {
        ChatError::Persistence(err.to_string())
    }
}
