//! Store contract for profiles, conversations and messages.

use std::future::Future;
use std::pin::Pin;

use crate::core::errors::ChatResult;
use crate::core::ids::{ConversationId, ProfileId};
use crate::core::models::{
    Conversation, ConversationPatch, Message, NewConversation, NewMessage, Profile,
};

/// Boxed future type for store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Ordering on a timestamp column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortOrder {
    /// Oldest first.
    Ascending,
    /// Newest first.
    Descending,
}

impl SortOrder {
    /// SQL keyword.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }

    /// PostgREST `order=` suffix.
    #[must_use]
    pub const fn as_rest(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// Durable storage for chat records.
///
/// The store is the single source of truth; last write wins at the row level.
/// Ids and timestamps of inserted records are assigned by the store.
pub trait ChatStore: Send + Sync {
    /// Get a profile by ID.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_profile(&self, id: ProfileId) -> StoreFuture<'_, ChatResult<Option<Profile>>>;

    /// List the conversations of an owner ordered by `updated_at`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_conversations(
        &self,
        owner: ProfileId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Conversation>>>;

    /// Get a conversation by ID.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get_conversation(
        &self,
        id: ConversationId,
    ) -> StoreFuture<'_, ChatResult<Option<Conversation>>>;

    /// Insert a conversation and return the stored record.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert_conversation(
        &self,
        conversation: NewConversation,
    ) -> StoreFuture<'_, ChatResult<Conversation>>;

    /// Apply a patch and move `updated_at` forward.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the conversation is missing.
    fn update_conversation(
        &self,
        id: ConversationId,
        patch: ConversationPatch,
    ) -> StoreFuture<'_, ChatResult<Conversation>>;

    /// Delete a conversation and, by cascade, its messages.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_conversation(&self, id: ConversationId) -> StoreFuture<'_, ChatResult<()>>;

    /// List the messages of a conversation ordered by `created_at`.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list_messages(
        &self,
        conversation: ConversationId,
        order: SortOrder,
    ) -> StoreFuture<'_, ChatResult<Vec<Message>>>;

    /// Insert a message and return the stored record.
    ///
    /// # Errors
    /// Returns an error if storage access fails or the conversation is missing.
    fn insert_message(&self, message: NewMessage) -> StoreFuture<'_, ChatResult<Message>>;
}
