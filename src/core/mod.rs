//! Core chat types and identifiers.

pub mod category;
pub mod clock;
pub mod config;
pub mod errors;
pub mod ids;
pub mod models;

pub use category::{Category, CategoryParseError};
pub use clock::MonotonicClock;
pub use config::{
    BackendConfig, ChatConfig, ResponderConfig, ResponderMode, ServerConfig, SessionConfig,
    StorageConfig, StorageKind,
};
pub use errors::{ChatError, ChatResult};
pub use ids::{ConversationId, MessageId, ProfileId};
pub use models::{
    Conversation, ConversationPatch, DEFAULT_TITLE, Message, NewConversation, NewMessage, Profile,
    Role, TITLE_MAX_CHARS, derive_title,
};
