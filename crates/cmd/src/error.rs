use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use diagnostics::error;
use thiserror::Error;

/// Failures a handler returns before it can render a page
#[derive(Debug, Error)]
pub enum WebError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Upload has no '{0}' field")]
    MissingField(&'static str),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated").into_response()
            }
            WebError::Multipart(e) => (e.status(), e.body_text()).into_response(),
            WebError::MissingField(field) => {
                (StatusCode::BAD_REQUEST, format!("Upload has no '{field}' field")).into_response()
            }
            WebError::Template(e) => {
                let error = format!("{e:?}");
                error!("Template rendering failed: {error}", error);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
