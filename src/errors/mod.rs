//! Error handling module for the AITC backend.
//!
//! Provides the error kinds raised at the collection façade boundary, with
//! mapping to HTTP status codes and the JSON error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{RecordError, UnknownCollection, ValidationError};
use crate::storage::StorageError;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const UNKNOWN_COLLECTION: &str = "UNKNOWN_COLLECTION";
    pub const UNSUPPORTED_MEDIA_TYPE: &str = "UNSUPPORTED_MEDIA_TYPE";
    pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
    pub const MALFORMED_JSON: &str = "MALFORMED_JSON";
    pub const INVALID_OBJECT: &str = "INVALID_OBJECT";
    pub const IDENTITY_MISMATCH: &str = "IDENTITY_MISMATCH";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const PRECONDITION_FAILED: &str = "PRECONDITION_FAILED";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Collection name is not `apps` or `devices`
    UnknownCollection(String),
    /// Declared content type is not JSON
    UnsupportedMediaType(String),
    /// Body exceeds the item size limit
    PayloadTooLarge { size: usize, limit: usize },
    /// Body is not valid JSON
    MalformedJson(String),
    /// JSON parsed but is not an acceptable record
    InvalidObject(String),
    /// Derived record id differs from the addressed item id
    IdentityMismatch { expected: String, actual: String },
    /// Item or collection does not exist
    NotFound(String),
    /// Stored item is newer than the request's precondition
    PreconditionFailed { current_modified: i64 },
    /// Malformed query parameter or header
    BadRequest(String),
    /// Storage backend failure
    Storage(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedJson(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidObject(_) => StatusCode::BAD_REQUEST,
            // Forbidden rather than Unauthorized: clients must not be
            // prompted for credentials on a mismatched id.
            AppError::IdentityMismatch { .. } => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::UnknownCollection(_) => codes::UNKNOWN_COLLECTION,
            AppError::UnsupportedMediaType(_) => codes::UNSUPPORTED_MEDIA_TYPE,
            AppError::PayloadTooLarge { .. } => codes::PAYLOAD_TOO_LARGE,
            AppError::MalformedJson(_) => codes::MALFORMED_JSON,
            AppError::InvalidObject(_) => codes::INVALID_OBJECT,
            AppError::IdentityMismatch { .. } => codes::IDENTITY_MISMATCH,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::PreconditionFailed { .. } => codes::PRECONDITION_FAILED,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::UnknownCollection(name) => format!("Unknown collection '{}'", name),
            AppError::UnsupportedMediaType(content_type) => {
                format!("Unsupported Media Type: {}", content_type)
            }
            AppError::PayloadTooLarge { size, limit } => {
                format!("Item of {} bytes exceeds the {} byte limit", size, limit)
            }
            AppError::IdentityMismatch { expected, actual } => format!(
                "Item ID '{}' does not match record id '{}'",
                actual, expected
            ),
            AppError::PreconditionFailed { .. } => {
                "Item was modified after the given time".to_string()
            }
            AppError::Unauthorized(msg)
            | AppError::MalformedJson(msg)
            | AppError::InvalidObject(msg)
            | AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Storage(msg)
            | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => AppError::NotFound("Item not found".to_string()),
            StorageError::PreconditionFailed { current } => AppError::PreconditionFailed {
                current_modified: current,
            },
            StorageError::Backend(msg) => {
                tracing::error!("Storage error: {}", msg);
                AppError::Storage(format!("Storage error: {}", msg))
            }
        }
    }
}

impl From<UnknownCollection> for AppError {
    fn from(err: UnknownCollection) -> Self {
        AppError::UnknownCollection(err.0)
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        AppError::InvalidObject(err.to_string())
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidObject(err.message().to_string())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::PreconditionFailed { current_modified } => {
                Some(serde_json::json!({ "currentModified": current_modified }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(ErrorResponse::new(&self))).into_response()
    }
}
