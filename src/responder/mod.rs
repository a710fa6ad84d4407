//! Reply generation for chat turns.
//!
//! A [`Responder`] turns `(message, conversation_id)` into a reply text. Two
//! implementations ship with the crate:
//! - [`RuleResponder`]: in-process keyword routing with canned replies.
//! - [`HttpResponder`]: client of the chat function exposed by the server.

pub mod http_client;
pub mod rules;

pub use http_client::HttpResponder;
pub use rules::{CannedReply, ReplyHandler, RuleResponder, classify};

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::ChatResult;
use crate::core::ids::ConversationId;

/// Boxed future returned by [`Responder::respond`].
pub type ResponderFuture<'a> = Pin<Box<dyn Future<Output = ChatResult<ChatReply>> + Send + 'a>>;

/// Chat function request body.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message.
    pub message: String,
    /// Conversation the message belongs to. Not used for routing.
    #[serde(default)]
    pub conversation_id: String,
}

impl ChatRequest {
    /// Build a request for a conversation.
    #[must_use]
    pub fn new(message: impl Into<String>, conversation_id: ConversationId) -> Self {
        Self {
            message: message.into(),
            conversation_id: conversation_id.to_string(),
        }
    }
}

/// Chat function response body.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The assistant's reply.
    pub response: String,
}

/// Something that can answer a chat message.
pub trait Responder: Send + Sync {
    /// Produce a reply for one user message.
    ///
    /// # Errors
    /// Returns an error if the reply could not be produced.
    fn respond(&self, request: ChatRequest) -> ResponderFuture<'_>;
}

impl<T: Responder + ?Sized> Responder for Arc<T> {
    fn respond(&self, request: ChatRequest) -> ResponderFuture<'_> {
        (**self).respond(request)
    }
}
