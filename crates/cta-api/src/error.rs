//! API error handling
//!
//! Maps store-layer outcomes onto HTTP: `StoreError` becomes a server-side
//! failure with a sanitized envelope, soft absence becomes 404, and caller
//! mistakes become 400. Backend-internal error text only ever travels in the
//! `details` field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cta_core::StoreError;
use serde::{Deserialize, Serialize};

/// API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new("NOT_FOUND", format!("{resource} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Store(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::not_found(&msg)),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("INTERNAL_ERROR", "Internal server error").with_details(msg),
            ),
            AppError::Store(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("STORE_ERROR", "Vector store operation failed").with_details(msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(msg) => AppError::BadRequest(msg),
            StoreError::Config(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            StoreError::Backend(msg)
            | StoreError::CollectionCreation(msg)
            | StoreError::Search(msg) => AppError::Store(msg),
            StoreError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
