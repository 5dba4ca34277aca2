use axum::{
    extract::{rejection::JsonRejection, FromRequest},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::generation::composer::ComposeError;
use crate::generation::generator::StoryError;
use crate::llm_client::GenerationErrorKind;
use crate::templates::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Generation cancelled")]
    Cancelled,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// `axum::Json` whose rejections (bad syntax, wrong types, missing content
/// type) come back as a structured 400 instead of axum's plain-text reply.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<ComposeError> for AppError {
    fn from(e: ComposeError) -> Self {
        AppError::Validation(e.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingField(_)
            | StoreError::ReservedId(_)
            | StoreError::InvalidTemplate(_) => {
                AppError::Validation(e.to_string())
            }
            StoreError::Io(_) | StoreError::Encode(_) => AppError::Internal(e.into()),
        }
    }
}

impl From<StoryError> for AppError {
    fn from(e: StoryError) -> Self {
        match e {
            StoryError::Template(inner) => inner.into(),
            StoryError::Generation { ref source, .. }
                if source.kind == GenerationErrorKind::Credential =>
            {
                AppError::Unauthorized(source.message.clone())
            }
            StoryError::Generation { .. } => AppError::Generation(e.to_string()),
            StoryError::Cancelled => AppError::Cancelled,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Generation(msg) => {
                tracing::error!("Generation failed: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GENERATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::Cancelled => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CANCELLED",
                "Generation cancelled".to_string(),
            ),
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
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
