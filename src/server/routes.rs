//! HTTP route handlers for the chat function.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::debug;

use crate::responder::{ChatReply, ChatRequest};

use super::error::ApiError;
use super::middleware::{cors, require_bearer};
use super::state::AppState;

/// Route of the chat function.
pub const CHAT_ROUTE: &str = "/functions/v1/chat";

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    let function = Router::new()
        .route(CHAT_ROUTE, post(chat))
        .route_layer(from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/health", get(health_check))
        .merge(function)
        .layer(from_fn(cors))
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "engichat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Handle one chat message.
///
/// The body is decoded by hand so malformed input gets the 500 contract body
/// instead of the extractor's rejection.
async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatReply>, ApiError> {
    let request: ChatRequest =
        serde_json::from_slice(&body).map_err(|err| ApiError::Malformed(err.to_string()))?;
    debug!("Chat request for conversation {}", request.conversation_id);

    let reply = state.responder.respond(request).await?;
    Ok(Json(reply))
}
