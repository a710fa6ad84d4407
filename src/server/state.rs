//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::core::config::ServerConfig;
use crate::responder::Responder;

/// Shared application state.
pub struct AppState {
    /// Produces the reply of each chat request.
    pub responder: Arc<dyn Responder>,
    /// Bearer token required on the chat function, if any.
    pub api_key: Option<String>,
}

impl AppState {
    /// Create the state for a responder and server settings.
    #[must_use]
    pub fn new(responder: Arc<dyn Responder>, config: &ServerConfig) -> Arc<Self> {
        Arc::new(Self {
            responder,
            api_key: config.api_key.clone(),
        })
    }
}
