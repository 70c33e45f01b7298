use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failure taxonomy for the authentication flows. Every variant except
/// `Internal` carries a stable machine-readable reason string that goes out
/// on the wire verbatim; `Internal` is logged server-side and surfaces as an
/// opaque 500.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Expired(&'static str),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    AttemptsExceeded(&'static str),

    #[error("{0}")]
    AlreadyUsed(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Conflict(_)
            | Self::Expired(_)
            | Self::AttemptsExceeded(_)
            | Self::AlreadyUsed(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Conflict(reason)
            | Self::NotFound(reason)
            | Self::Expired(reason)
            | Self::Unauthorized(reason)
            | Self::Forbidden(reason)
            | Self::AttemptsExceeded(reason)
            | Self::AlreadyUsed(reason) => reason,
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Internal(ref err) = self {
            error!("Internal error: {err:#}");
        }

        let body = Json(json!({
            "error": self.reason(),
        }));

        (self.status(), body).into_response()
    }
}
