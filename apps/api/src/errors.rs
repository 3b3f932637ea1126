use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::sections::aggregator::OutstandingSection;
use crate::sections::assembler::AssembleError;
use crate::sections::error::{DispatchError, PipelineError, ProviderError, StoreError};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Assembly requested before every required section is complete.
    #[error("Document not ready: {} section(s) outstanding", outstanding.len())]
    NotReady { outstanding: Vec<OutstandingSection> },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::NotReady { outstanding } => {
                let body = Json(json!({
                    "error": {
                        "code": "NOT_READY",
                        "message": self.to_string(),
                        "outstanding": outstanding
                    }
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Queue(msg) => {
                tracing::error!("Queue error: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "QUEUE_ERROR",
                    "Generation work could not be queued".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            StoreError::Conflict { .. } | StoreError::IllegalTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Unavailable(_) | StoreError::Corrupt(_) => {
                AppError::Internal(anyhow::anyhow!(err))
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(e) => e.into(),
            PipelineError::Catalog(e) => AppError::UnprocessableEntity(e.to_string()),
            PipelineError::Source(ProviderError::NotFound(what)) => AppError::NotFound(what),
            PipelineError::Source(ProviderError::Database(e)) => AppError::Database(e),
        }
    }
}

impl From<AssembleError> for AppError {
    fn from(err: AssembleError) -> Self {
        match err {
            AssembleError::NotReady { outstanding } => AppError::NotReady { outstanding },
            AssembleError::Store(e) => e.into(),
            AssembleError::Render(e) => AppError::UnprocessableEntity(e.to_string()),
            AssembleError::Storage(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        AppError::Queue(err.to_string())
    }
}
