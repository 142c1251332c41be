use axum::extract::{FromRequest, Multipart, Request};

use crate::error::AppError;

/// A `Multipart` wrapper that converts extraction errors into `AppError::Validation`,
/// ensuring clients always receive structured JSON error responses.
pub struct UploadForm(pub Multipart);

impl<S> FromRequest<S> for UploadForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        Ok(UploadForm(multipart))
    }
}
