use crate::context::CausalContext;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for environment variable {0}: {1}")]
    InvalidVar(&'static str, String),
}

/// Errors raised by the core node operations, independent of the HTTP transport.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("key exceeds maximum length")]
    KeyTooLong(CausalContext),
    #[error("value missing from request body")]
    MissingValue(CausalContext),
    #[error("key not found")]
    KeyNotFound,
    #[error("unable to satisfy request")]
    Nack,
    #[error("no replica of the owning shard could be reached")]
    ShardUnreachable,
    #[error("node is not a member of the current view")]
    NotInView,
    #[error("shard {0} does not exist")]
    NoSuchShard(usize),
}

impl NodeError {
    pub fn status(&self) -> StatusCode {
        match self {
            NodeError::KeyTooLong(_) | NodeError::MissingValue(_) | NodeError::Nack => {
                StatusCode::BAD_REQUEST
            }
            NodeError::KeyNotFound => StatusCode::NOT_FOUND,
            NodeError::ShardUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::NotInView => StatusCode::SERVICE_UNAVAILABLE,
            NodeError::NoSuchShard(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        // Client input errors echo the causal context back unchanged
        // instead of dropping it, so retries can reuse it as-is.
        let body = match self {
            NodeError::KeyTooLong(ctx) | NodeError::MissingValue(ctx) => {
                json!({ "error": message, "causal-context": ctx })
            }
            _ => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}
