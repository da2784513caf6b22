//! Error handling module for the synchronization layer.
//!
//! Every failure is resolved into a `SyncError` variant. Hooks fold these into
//! their `{data, loading, error}` state; the gateway maps them to HTTP envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const STREAM_ERROR: &str = "STREAM_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STORE_ERROR: &str = "STORE_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Message surfaced when a one-shot lookup matches nothing.
pub const DOCUMENT_NOT_FOUND: &str = "Document not found";

/// Why a single field could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Field absent from the document
    Missing,
    /// Field present but of an unexpected shape
    WrongType,
}

/// A single remote document that could not be turned into an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub doc_id: String,
    pub field: String,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn missing(doc_id: &str, field: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            field: field.to_string(),
            kind: DecodeErrorKind::Missing,
        }
    }

    pub fn wrong_type(doc_id: &str, field: &str) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            field: field.to_string(),
            kind: DecodeErrorKind::WrongType,
        }
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            DecodeErrorKind::Missing => {
                write!(f, "document {} is missing field '{}'", self.doc_id, self.field)
            }
            DecodeErrorKind::WrongType => write!(
                f,
                "document {} has an invalid value for field '{}'",
                self.doc_id, self.field
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Synchronization layer error type.
#[derive(Debug)]
pub enum SyncError {
    /// Malformed query inputs (e.g. an unrecognized role)
    Config(String),
    /// A single document failed to decode
    Decode(DecodeError),
    /// Remote subscription or fetch failure, surfaced verbatim
    Stream(String),
    /// One-shot lookup matched no document
    NotFound(String),
    /// Local document store failure
    Store(String),
    /// Bad request at the gateway
    BadRequest(String),
}

impl SyncError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Config(_) => StatusCode::BAD_REQUEST,
            SyncError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::Stream(_) => StatusCode::BAD_GATEWAY,
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SyncError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Config(_) => codes::CONFIG_ERROR,
            SyncError::Decode(_) => codes::DECODE_ERROR,
            SyncError::Stream(_) => codes::STREAM_ERROR,
            SyncError::NotFound(_) => codes::NOT_FOUND,
            SyncError::Store(_) => codes::STORE_ERROR,
            SyncError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            SyncError::Config(msg) => msg.clone(),
            SyncError::Decode(err) => err.to_string(),
            SyncError::Stream(msg) => msg.clone(),
            SyncError::NotFound(msg) => msg.clone(),
            SyncError::Store(msg) => msg.clone(),
            SyncError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for SyncError {}

impl From<DecodeError> for SyncError {
    fn from(err: DecodeError) -> Self {
        SyncError::Decode(err)
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        SyncError::Store(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        SyncError::BadRequest(format!("JSON error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &SyncError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
            },
        }
    }
}

impl IntoResponse for SyncError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display_names_document_and_field() {
        let err = DecodeError::missing("a1", "createdAt");
        assert_eq!(err.to_string(), "document a1 is missing field 'createdAt'");

        let err = DecodeError::wrong_type("m7", "senderRole");
        assert!(err.to_string().contains("m7"));
        assert!(err.to_string().contains("senderRole"));
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = SyncError::NotFound(DOCUMENT_NOT_FOUND.to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), codes::NOT_FOUND);
        assert_eq!(err.message(), "Document not found");
    }

    #[test]
    fn test_stream_error_message_is_verbatim() {
        let err = SyncError::Stream("permission-denied".to_string());
        assert_eq!(err.message(), "permission-denied");
        assert_eq!(err.to_string(), "STREAM_ERROR: permission-denied");
    }
}
