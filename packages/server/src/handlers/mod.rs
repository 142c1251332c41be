pub mod upload;

use crate::error::AppError;

/// Fallback for unmatched routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Could not find this route".into())
}
