//! Error types for the FormFill API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use formfill_core::{EngineError, ExtractError, MapperError, SessionError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No fillable form fields found: {0}")]
    NoFields(String),

    #[error("Instruction mapper unavailable: {0}")]
    MapperUnavailable(String),

    #[error("No fields could be mapped from the instructions")]
    MappingEmpty,

    #[error("Document error: {0}")]
    Engine(#[from] EngineError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ExtractError> for ApiError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::Engine(inner) => ApiError::Engine(inner),
        }
    }
}

impl From<MapperError> for ApiError {
    fn from(e: MapperError) -> Self {
        match e {
            MapperError::Unavailable(msg) => ApiError::MapperUnavailable(msg),
            MapperError::Failed(msg) => ApiError::InvalidRequest(format!("Mapping failed: {}", msg)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::SessionNotFound(id) => {
                (StatusCode::NOT_FOUND, format!("Session not found: {}", id))
            }
            ApiError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NoFields(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::MapperUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!(
                    "{}. Set use_llm=false to use keyword matching instead.",
                    msg
                ),
            ),
            ApiError::MappingEmpty => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Could not determine which fields to fill from your instructions. \
                 Try being more specific, e.g. 'Name: John Doe, Email: john@example.com'"
                    .to_string(),
            ),
            // Open failures mean the upload was not a valid document;
            // everything else engine-side is on us.
            ApiError::Engine(EngineError::Open(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("Not a valid PDF document: {}", msg),
            ),
            ApiError::Engine(e) => {
                tracing::error!("Engine error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Document error".to_string())
            }
            ApiError::Session(SessionError::FieldNotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Field not found: {}", id))
            }
            ApiError::Session(SessionError::NoDocument) => (
                StatusCode::BAD_REQUEST,
                "No document loaded in this session".to_string(),
            ),
            // An unreadable document path is bad input, not a server fault.
            ApiError::Session(SessionError::Io(e)) => (
                StatusCode::BAD_REQUEST,
                format!("Failed to read document: {}", e),
            ),
            ApiError::Session(e) => {
                tracing::error!("Session error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error".to_string())
            }
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
