//! Durable storage for profiles, conversations and messages.

pub mod chat_store;
pub mod rest_store;
pub mod sqlite_store;

pub use chat_store::{ChatStore, SortOrder, StoreFuture};
pub use rest_store::RestChatStore;
pub use sqlite_store::SqliteChatStore;
