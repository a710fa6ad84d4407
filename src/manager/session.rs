//! Observable session state of a conversation manager.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::ids::{ConversationId, MessageId};
use crate::core::models::{Conversation, Message, Role};

/// Lifecycle of the displayed thread.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Conversations or messages are being fetched.
    Loading,
    /// A thread (possibly empty) is on screen.
    Displayed,
    /// A turn is in flight.
    Sending,
}

/// Storage status of a thread entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Shown locally, not yet confirmed by the store.
    Pending,
    /// Confirmed by the store; id and timestamp are the stored ones.
    Confirmed,
    /// The store rejected it; shown but not retried.
    Unsaved,
}

/// One entry of the displayed thread.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ThreadMessage {
    /// Local id until confirmed, then the stored id.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub role: Role,
    /// Text.
    pub content: String,
    /// Local time until confirmed, then the stored time.
    pub created_at: DateTime<Utc>,
    /// Storage status.
    pub delivery: Delivery,
    /// Stand-in reply shown because the responder failed.
    pub fallback: bool,
}

impl ThreadMessage {
    /// Optimistic entry built before the store is called.
    #[must_use]
    pub fn local(
        conversation_id: ConversationId,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            role,
            content: content.into(),
            created_at,
            delivery: Delivery::Pending,
            fallback: false,
        }
    }

    /// Whether the store has confirmed this entry.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.delivery == Delivery::Confirmed
    }
}

impl From<Message> for ThreadMessage {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            created_at: message.created_at,
            delivery: Delivery::Confirmed,
            fallback: false,
        }
    }
}

/// Everything the presentation layer renders.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionState {
    /// Conversations of the owner, most recently updated first.
    pub conversations: Vec<Conversation>,
    /// Active conversation, if any.
    pub active: Option<Conversation>,
    /// Messages of the active conversation in creation order.
    pub thread: Vec<ThreadMessage>,
    /// Current phase.
    pub phase: SessionPhase,
    /// A responder call is outstanding; input should be disabled.
    pub pending: bool,
    /// Non-fatal error banner.
    pub last_error: Option<String>,
}

impl SessionState {
    /// Id of the active conversation.
    #[must_use]
    pub fn active_id(&self) -> Option<ConversationId> {
        self.active.as_ref().map(|conversation| conversation.id)
    }

    /// Insert or refresh a conversation and keep the list ordered by
    /// `updated_at` descending.
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        if self.active_id() == Some(conversation.id) {
            self.active = Some(conversation.clone());
        }
        self.conversations.retain(|c| c.id != conversation.id);
        let position = self
            .conversations
            .iter()
            .position(|c| c.updated_at <= conversation.updated_at)
            .unwrap_or(self.conversations.len());
        self.conversations.insert(position, conversation);
    }

    /// Drop a conversation from the cached list.
    pub fn forget_conversation(&mut self, id: ConversationId) {
        self.conversations.retain(|c| c.id != id);
    }
}
