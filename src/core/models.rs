//! Record types shared by the store, the manager and the presentation layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::category::Category;
use crate::core::ids::{ConversationId, MessageId, ProfileId};

/// Title every conversation carries until its first user message.
pub const DEFAULT_TITLE: &str = "New Conversation";

/// Number of characters kept from the first message when deriving a title.
pub const TITLE_MAX_CHARS: usize = 50;

/// Derive a conversation title from its first user message.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters and appends `...` when the
/// message is longer.
#[must_use]
pub fn derive_title(first_message: &str) -> String {
    let mut chars = first_message.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// User profile, owned by the auth system.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Account email.
    pub email: String,
    /// Display name; a null column reads as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A titled, categorized thread of messages owned by one profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Owning profile.
    #[serde(rename = "user_id")]
    pub owner_id: ProfileId,
    /// Display title.
    pub title: String,
    /// Category tag.
    pub category: Category,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp, never before `created_at`.
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a conversation; the store assigns id and timestamps.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewConversation {
    /// Owning profile.
    #[serde(rename = "user_id")]
    pub owner_id: ProfileId,
    /// Initial title.
    pub title: String,
    /// Category tag.
    pub category: Category,
}

impl NewConversation {
    /// New conversation with the default title.
    #[must_use]
    pub fn new(owner_id: ProfileId, category: Category) -> Self {
        Self {
            owner_id,
            title: DEFAULT_TITLE.to_string(),
            category,
        }
    }
}

/// Partial update of a conversation.
///
/// Every update also moves `updated_at` forward.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConversationPatch {
    /// New title, if any.
    pub title: Option<String>,
    /// New category, if any.
    pub category: Option<Category>,
}

impl ConversationPatch {
    /// Patch that only touches `updated_at`.
    #[must_use]
    pub fn touch() -> Self {
        Self::default()
    }

    /// Patch that renames the conversation.
    #[must_use]
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            category: None,
        }
    }
}

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The signed-in user.
    User,
    /// The responder.
    Assistant,
}

impl Role {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            _ => Err(value.to_string()),
        }
    }
}

/// One message of a conversation.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub role: Role,
    /// Text content, never empty.
    pub content: String,
    /// Creation timestamp; orders messages within a conversation.
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a message; the store assigns id and timestamp.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct NewMessage {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl NewMessage {
    /// Build a user message.
    #[must_use]
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            conversation_id,
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
