//! HTTP error type for the chat function.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::core::errors::ChatError;

/// Reply text sent with every 500 response.
pub const ERROR_REPLY: &str = "I encountered an error processing your request. Please try again.";

/// Errors a chat function request can end in.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong bearer token.
    #[error("unauthorized")]
    Unauthorized,
    /// The body is not a valid chat request.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// The responder failed.
    #[error(transparent)]
    Responder(#[from] ChatError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            Self::Malformed(message) => {
                error!("Error in chat function: {message}");
                internal(&message)
            }
            Self::Responder(err) => {
                error!("Error in chat function: {err}");
                internal(&err.to_string())
            }
        }
    }
}

fn internal(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "response": ERROR_REPLY, "error": message })),
    )
        .into_response()
}
