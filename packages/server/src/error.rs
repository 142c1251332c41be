use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

use crate::auth::AuthError;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `API_KEY_MISSING`,
    /// `API_KEY_INVALID`, `NOT_FOUND`, `UNSUPPORTED_MEDIA_TYPE`, `RATE_LIMITED`,
    /// `PERSISTENCE_FAILURE`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "No file uploaded")]
    pub message: String,
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// No `X-API-Key` header, or an empty one.
    MissingCredential,
    /// The key is not known to the record store.
    UnknownCredential,
    NotFound(String),
    /// Declared content type is outside the accepted set.
    UnsupportedMediaType(String),
    /// Quota exhausted. Carries the tier's message and seconds until the window resets.
    RateLimited {
        message: String,
        retry_after: u64,
    },
    /// Metadata could not be saved; written blobs have been cleaned up.
    Persistence(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::MissingCredential => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "API_KEY_MISSING",
                    message: AuthError::MissingCredential.to_string(),
                },
            ),
            AppError::UnknownCredential => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    code: "API_KEY_INVALID",
                    message: AuthError::UnknownCredential.to_string(),
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::UnsupportedMediaType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                ErrorBody {
                    code: "UNSUPPORTED_MEDIA_TYPE",
                    message: format!(
                        "Invalid file type '{content_type}'. Only JPEG, PNG and PDF files are allowed."
                    ),
                },
            ),
            AppError::RateLimited { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorBody {
                    code: "RATE_LIMITED",
                    message,
                },
            ),
            AppError::Persistence(detail) => {
                tracing::error!("Persistence failure: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "PERSISTENCE_FAILURE",
                        message: "Failed to save files to database".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = if let AppError::RateLimited { retry_after, .. } = &self {
            Some(*retry_after)
        } else {
            None
        };

        let (status, body) = self.status_and_body();
        let mut response = (status, Json(body)).into_response();

        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::SizeLimitExceeded { limit, .. } => {
                AppError::Validation(format!("File exceeds maximum size of {limit} bytes"))
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredential => AppError::MissingCredential,
            AuthError::UnknownCredential => AppError::UnknownCredential,
            AuthError::Lookup(e) => AppError::Internal(format!("API key lookup failed: {e}")),
        }
    }
}
